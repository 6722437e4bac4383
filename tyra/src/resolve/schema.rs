//! Class schemas and cross-unit symbols.
//!
//! Schemas are built in one pass over all top-level definitions before
//! any body is resolved, because a definition may be referenced before
//! its own body. Unparseable annotations are skipped here; resolving
//! the definition itself reports them.

use std::collections::HashMap;

use crate::ast::{ClassDef, Expr, ExprKind, Module, Stmt, StmtKind};
use crate::types::Type;

/// Constructor method name in the source model
pub const CONSTRUCTOR: &str = "__init__";

/// Implicit receiver parameter name in the source model
pub const RECEIVER: &str = "self";

/// Field and method types of one user-defined class
#[derive(Debug, Clone, Default)]
pub struct ClassSchema {
    pub fields: HashMap<String, Type>,
    /// Method name to return type
    pub methods: HashMap<String, Type>,
    /// Single-inheritance base, if any
    pub base: Option<String>,
}

/// Cross-unit symbol table supplied by the external import resolver.
/// Fully constructed before any unit's resolution begins.
#[derive(Debug, Clone, Default)]
pub struct ExternSymbols {
    /// Imported function name to return type
    pub functions: HashMap<String, Type>,
    /// Imported class name to schema
    pub classes: HashMap<String, ClassSchema>,
}

/// Per-unit definition tables, plus a view over the extern symbols
#[derive(Debug, Default)]
pub struct SchemaTable {
    classes: HashMap<String, ClassSchema>,
    fn_returns: HashMap<String, Type>,
}

impl SchemaTable {
    pub fn build(module: &Module) -> Self {
        let mut table = SchemaTable::default();
        for stmt in &module.body {
            match &stmt.kind {
                StmtKind::FunctionDef(def) => {
                    let ret = match &def.returns {
                        Some(text) => Type::parse(text),
                        None => Some(Type::None),
                    };
                    if let Some(ret) = ret {
                        table.fn_returns.insert(def.name.clone(), ret);
                    }
                }
                StmtKind::ClassDef(def) => {
                    let schema = build_class_schema(def);
                    table.classes.insert(def.name.clone(), schema);
                }
                _ => {}
            }
        }
        table
    }

    pub fn is_class(&self, name: &str, externs: &ExternSymbols) -> bool {
        self.classes.contains_key(name) || externs.classes.contains_key(name)
    }

    pub fn function_return<'a>(
        &'a self,
        name: &str,
        externs: &'a ExternSymbols,
    ) -> Option<&'a Type> {
        self.fn_returns
            .get(name)
            .or_else(|| externs.functions.get(name))
    }

    fn class<'a>(&'a self, name: &str, externs: &'a ExternSymbols) -> Option<&'a ClassSchema> {
        self.classes
            .get(name)
            .or_else(|| externs.classes.get(name))
    }

    /// Field lookup walking the single-inheritance base chain
    pub fn field_type<'a>(
        &'a self,
        class: &str,
        field: &str,
        externs: &'a ExternSymbols,
    ) -> Option<&'a Type> {
        self.walk_chain(class, externs, |schema| schema.fields.get(field))
    }

    /// Method return lookup walking the base chain
    pub fn method_return<'a>(
        &'a self,
        class: &str,
        method: &str,
        externs: &'a ExternSymbols,
    ) -> Option<&'a Type> {
        self.walk_chain(class, externs, |schema| schema.methods.get(method))
    }

    fn walk_chain<'a>(
        &'a self,
        class: &str,
        externs: &'a ExternSymbols,
        get: impl Fn(&'a ClassSchema) -> Option<&'a Type>,
    ) -> Option<&'a Type> {
        let mut current = Some(class.to_string());
        // depth bound breaks accidental inheritance cycles
        for _ in 0..64 {
            let name = current?;
            let schema = self.class(&name, externs)?;
            if let Some(found) = get(schema) {
                return Some(found);
            }
            current = schema.base.clone();
        }
        None
    }
}

fn build_class_schema(def: &ClassDef) -> ClassSchema {
    let mut schema = ClassSchema {
        base: def.base.clone(),
        ..Default::default()
    };
    for stmt in &def.body {
        match &stmt.kind {
            StmtKind::FunctionDef(method) => {
                let ret = match &method.returns {
                    Some(text) => Type::parse(text),
                    None => Some(Type::None),
                };
                if let Some(ret) = ret {
                    schema.methods.insert(method.name.clone(), ret);
                }
                if method.name == CONSTRUCTOR {
                    collect_constructor_fields(method, &mut schema);
                }
            }
            // class-level annotated field
            StmtKind::AnnAssign {
                target, annotation, ..
            } => {
                if let ExprKind::Name(name) = &target.kind {
                    if let Some(ty) = Type::parse(annotation) {
                        schema.fields.insert(name.clone(), ty);
                    }
                }
            }
            _ => {}
        }
    }
    schema
}

/// Field types observable from the constructor body: annotated
/// `self.x: T = ...` stores, and `self.x = param` copies of annotated
/// parameters.
fn collect_constructor_fields(ctor: &crate::ast::FunctionDef, schema: &mut ClassSchema) {
    let param_types: HashMap<&str, Type> = ctor
        .params
        .iter()
        .filter_map(|param| {
            let ty = Type::parse(param.annotation.as_deref()?)?;
            Some((param.name.as_str(), ty))
        })
        .collect();

    for stmt in &ctor.body {
        match &stmt.kind {
            StmtKind::Assign { targets, value } => {
                for target in targets {
                    let Some(field) = receiver_field(target) else {
                        continue;
                    };
                    if let ExprKind::Name(src) = &value.kind {
                        if let Some(ty) = param_types.get(src.as_str()) {
                            schema.fields.insert(field.to_string(), ty.clone());
                        }
                    }
                }
            }
            StmtKind::AnnAssign {
                target, annotation, ..
            } => {
                if let Some(field) = receiver_field(target) {
                    if let Some(ty) = Type::parse(annotation) {
                        schema.fields.insert(field.to_string(), ty);
                    }
                }
            }
            _ => {}
        }
    }
}

fn receiver_field(target: &Expr) -> Option<&str> {
    if let ExprKind::Attribute { value, attr } = &target.kind {
        if matches!(&value.kind, ExprKind::Name(id) if id == RECEIVER) {
            return Some(attr);
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{FunctionDef, Param};

    fn sprite_module() -> Module {
        // class Sprite: __init__(self, x: int64) { self.x = x; self.tag: str = ... }
        let ctor = FunctionDef {
            name: CONSTRUCTOR.into(),
            params: vec![Param::bare(RECEIVER), Param::new("x", "int64")],
            returns: None,
            body: vec![
                Stmt::assign(Expr::attribute(Expr::name(RECEIVER), "x"), Expr::name("x")),
                Stmt::ann_assign(
                    Expr::attribute(Expr::name(RECEIVER), "tag"),
                    "str",
                    Some(Expr::str("s")),
                ),
            ],
        };
        let scale = FunctionDef {
            name: "scale".into(),
            params: vec![Param::bare(RECEIVER)],
            returns: Some("float64".into()),
            body: vec![Stmt::new(StmtKind::Pass)],
        };
        let base = ClassDef {
            name: "Node".into(),
            base: None,
            body: vec![Stmt::ann_assign(Expr::name("depth"), "int64", None)],
        };
        let sprite = ClassDef {
            name: "Sprite".into(),
            base: Some("Node".into()),
            body: vec![
                Stmt::new(StmtKind::FunctionDef(ctor)),
                Stmt::new(StmtKind::FunctionDef(scale)),
            ],
        };
        Module::new(
            "unit.src",
            vec![
                Stmt::new(StmtKind::ClassDef(base)),
                Stmt::new(StmtKind::ClassDef(sprite)),
            ],
        )
    }

    #[test]
    fn test_constructor_fields() {
        let table = SchemaTable::build(&sprite_module());
        let externs = ExternSymbols::default();
        assert_eq!(
            table.field_type("Sprite", "x", &externs),
            Some(&Type::INT64)
        );
        assert_eq!(table.field_type("Sprite", "tag", &externs), Some(&Type::Str));
    }

    #[test]
    fn test_inherited_field_walks_base_chain() {
        let table = SchemaTable::build(&sprite_module());
        let externs = ExternSymbols::default();
        assert_eq!(
            table.field_type("Sprite", "depth", &externs),
            Some(&Type::INT64)
        );
        assert_eq!(table.field_type("Sprite", "missing", &externs), None);
    }

    #[test]
    fn test_method_returns() {
        let table = SchemaTable::build(&sprite_module());
        let externs = ExternSymbols::default();
        assert_eq!(
            table.method_return("Sprite", "scale", &externs),
            Some(&Type::Float64)
        );
        assert_eq!(
            table.method_return("Sprite", CONSTRUCTOR, &externs),
            Some(&Type::None)
        );
    }

    #[test]
    fn test_extern_symbols_consulted() {
        let table = SchemaTable::build(&Module::new("unit.src", vec![]));
        let mut externs = ExternSymbols::default();
        externs
            .functions
            .insert("blend".into(), Type::Float64);
        externs.classes.insert(
            "Canvas".into(),
            ClassSchema {
                fields: HashMap::from([("width".to_string(), Type::INT64)]),
                methods: HashMap::new(),
                base: None,
            },
        );
        assert_eq!(
            table.function_return("blend", &externs),
            Some(&Type::Float64)
        );
        assert!(table.is_class("Canvas", &externs));
        assert_eq!(
            table.field_type("Canvas", "width", &externs),
            Some(&Type::INT64)
        );
    }
}

//! Stage one: type resolution.
//!
//! One recursive descent over the untyped input tree, producing the
//! typed IR or the unit's single structured error. Rename
//! precomputation and parameter usage classification run ahead of the
//! descent; the scoped type environment is mutated in place as names
//! are bound.

mod env;
mod rename;
mod schema;
mod usage;

pub use env::{BindOutcome, TypeEnv};
pub use rename::RenameMap;
pub use schema::{CONSTRUCTOR, ClassSchema, ExternSymbols, RECEIVER, SchemaTable};
pub use usage::classify_params;

use std::collections::HashMap;

use crate::ast;
use crate::error::{Diagnostic, Result};
use crate::ir::{
    self, BorrowKind, Cast, CastSite, DispatchMode, ParamUsage, RangeMode, Span, Stage,
};
use crate::types::Type;

// Stack growth parameters for deeply nested source trees
const STACK_RED_ZONE: usize = 128 * 1024;
const STACK_GROW_SIZE: usize = 2 * 1024 * 1024;

/// Sentinel name tested by the unit-entry guard
const UNIT_NAME: &str = "__name__";
/// Sentinel value marking direct execution of the unit
const UNIT_MAIN: &str = "__main__";

/// Resolve one compilation unit into the first-stage typed IR
pub fn resolve_unit(module: &ast::Module, externs: &ExternSymbols) -> Result<ir::Module> {
    Resolver::new(module, externs).run(module)
}

/// The recursive-descent resolver for one unit
pub struct Resolver<'a> {
    env: TypeEnv,
    usage_stack: Vec<HashMap<String, ParamUsage>>,
    renames: RenameMap,
    schemas: SchemaTable,
    externs: &'a ExternSymbols,
    class_stack: Vec<String>,
}

impl<'a> Resolver<'a> {
    pub fn new(module: &ast::Module, externs: &'a ExternSymbols) -> Self {
        Self {
            env: TypeEnv::new(),
            usage_stack: Vec::new(),
            renames: RenameMap::precompute(module),
            schemas: SchemaTable::build(module),
            externs,
            class_stack: Vec::new(),
        }
    }

    fn run(&mut self, module: &ast::Module) -> Result<ir::Module> {
        let mut body = Vec::new();
        let mut main_body = Vec::new();
        self.env.push_scope();
        for stmt in &module.body {
            if let Some(guarded) = main_guard_body(stmt) {
                for inner in guarded {
                    main_body.push(self.stmt(inner)?);
                }
                continue;
            }
            body.push(self.stmt(stmt)?);
        }
        self.env.pop_scope();
        Ok(ir::Module {
            source_path: module.source_path.clone(),
            stage: Stage::Typed,
            dispatch_mode: DispatchMode::default(),
            body,
            main_body,
            renames: self.renames.as_map().clone(),
            span: module.span,
        })
    }

    // ------------------------------------------------------------------
    // Statements
    // ------------------------------------------------------------------

    fn stmt(&mut self, stmt: &ast::Stmt) -> Result<ir::Stmt> {
        stacker::maybe_grow(STACK_RED_ZONE, STACK_GROW_SIZE, || self.stmt_inner(stmt))
    }

    fn block(&mut self, body: &[ast::Stmt]) -> Result<Vec<ir::Stmt>> {
        body.iter().map(|s| self.stmt(s)).collect()
    }

    fn stmt_inner(&mut self, stmt: &ast::Stmt) -> Result<ir::Stmt> {
        let span = stmt.span;
        let kind = match &stmt.kind {
            ast::StmtKind::FunctionDef(def) => {
                ir::StmtKind::FunctionDef(self.function(def, span)?)
            }
            ast::StmtKind::ClassDef(def) => {
                self.class_stack.push(def.name.clone());
                let body = self.block(&def.body);
                self.class_stack.pop();
                ir::StmtKind::ClassDef {
                    name: self.renames.resolved(&def.name).to_string(),
                    original_name: def.name.clone(),
                    base: def.base.clone(),
                    body: body?,
                }
            }
            ast::StmtKind::Return(value) => {
                let value = value.as_ref().map(|v| self.expr(v)).transpose()?;
                ir::StmtKind::Return(value)
            }
            ast::StmtKind::Assign { targets, value } => {
                if targets.len() != 1 {
                    return Err(Diagnostic::unsupported(
                        "only single-target assignment is supported",
                        span,
                        "Split the assignment into one target per statement.",
                    ));
                }
                let target = &targets[0];
                let value = self.expr(value)?;
                if let ast::ExprKind::Name(id) = &target.kind {
                    self.bind(id, value.ty.clone(), span)?;
                }
                let target = self.expr(target)?;
                ir::StmtKind::Assign { target, value }
            }
            ast::StmtKind::AugAssign { target, op, value } => {
                let target_ir = self.expr(target)?;
                let value_ir = self.expr(value)?;
                if let ast::ExprKind::Name(id) = &target.kind {
                    let current = self.env.lookup(id).cloned();
                    if let Some(current) = current {
                        if current.is_numeric() && value_ir.ty.is_numeric() {
                            let retyped = if current.is_float() || value_ir.ty.is_float() {
                                Type::Float64
                            } else {
                                current
                            };
                            self.env.rebind(id, retyped);
                        }
                    }
                }
                ir::StmtKind::AugAssign {
                    target: target_ir,
                    op: *op,
                    value: value_ir,
                }
            }
            ast::StmtKind::AnnAssign {
                target,
                annotation,
                value,
            } => {
                let ann = Type::parse(annotation).ok_or_else(|| {
                    Diagnostic::unsupported(
                        format!("unsupported type annotation '{annotation}'"),
                        span,
                        "Use the normalized annotation grammar, e.g. list[int64] or str|none.",
                    )
                })?;
                let value_ir = value
                    .as_ref()
                    .map(|v| self.expr_with(v, Some(&ann)))
                    .transpose()?;
                if let Some(value_ir) = &value_ir {
                    if !ann.compatible(&value_ir.ty) {
                        return Err(Diagnostic::conflict(
                            format!(
                                "annotated type '{ann}' conflicts with value type '{}'",
                                value_ir.ty
                            ),
                            span,
                            "Align the annotation and the assigned value type.",
                        ));
                    }
                }
                match &target.kind {
                    ast::ExprKind::Name(id) => self.bind(id, ann.clone(), span)?,
                    ast::ExprKind::Attribute { .. } => {}
                    _ => {
                        return Err(Diagnostic::unsupported(
                            "annotated assignment target must be a name or attribute",
                            span,
                            "Annotate a simple variable or field.",
                        ));
                    }
                }
                ir::StmtKind::AnnAssign {
                    target: self.expr(target)?,
                    annotation: ann,
                    value: value_ir,
                }
            }
            ast::StmtKind::Expr(value) => ir::StmtKind::Expr(self.expr(value)?),
            ast::StmtKind::If { test, body, orelse } => ir::StmtKind::If {
                test: self.expr(test)?,
                body: self.block(body)?,
                orelse: self.block(orelse)?,
            },
            ast::StmtKind::While { test, body, orelse } => ir::StmtKind::While {
                test: self.expr(test)?,
                body: self.block(body)?,
                orelse: self.block(orelse)?,
            },
            ast::StmtKind::For {
                target,
                iter,
                body,
                orelse,
            } => return self.for_stmt(target, iter, body, orelse, span),
            ast::StmtKind::Try {
                body,
                handlers,
                orelse,
                finalbody,
            } => {
                let body = self.block(body)?;
                let mut handlers_ir = Vec::with_capacity(handlers.len());
                for handler in handlers {
                    let ty = handler.ty.as_ref().map(|t| self.expr(t)).transpose()?;
                    if let Some(name) = &handler.name {
                        self.bind(name, Type::Class("Exception".into()), handler.span)?;
                    }
                    handlers_ir.push(ir::ExceptHandler {
                        ty,
                        name: handler.name.clone(),
                        body: self.block(&handler.body)?,
                        span: handler.span,
                    });
                }
                ir::StmtKind::Try {
                    body,
                    handlers: handlers_ir,
                    orelse: self.block(orelse)?,
                    finalbody: self.block(finalbody)?,
                }
            }
            ast::StmtKind::Raise(exc) => {
                ir::StmtKind::Raise(exc.as_ref().map(|e| self.expr(e)).transpose()?)
            }
            ast::StmtKind::Import { names } => ir::StmtKind::Import {
                names: names.clone(),
            },
            ast::StmtKind::Pass => ir::StmtKind::Pass,
            ast::StmtKind::Break => ir::StmtKind::Break,
            ast::StmtKind::Continue => ir::StmtKind::Continue,
        };
        Ok(ir::Stmt::new(kind, span))
    }

    fn for_stmt(
        &mut self,
        target: &ast::Expr,
        iter: &ast::Expr,
        body: &[ast::Stmt],
        orelse: &[ast::Stmt],
        span: Option<Span>,
    ) -> Result<ir::Stmt> {
        if let Some((start, stop, step)) = self.parse_range_iter(iter)? {
            let mode = range_mode(&step, span)?;
            if let ast::ExprKind::Name(id) = &target.kind {
                self.bind(id, Type::INT64, span)?;
            }
            let kind = ir::StmtKind::ForRange {
                target: self.expr(target)?,
                start: self.expr(&start)?,
                stop: self.expr(&stop)?,
                step: self.expr(&step)?,
                mode,
                body: self.block(body)?,
                orelse: self.block(orelse)?,
            };
            return Ok(ir::Stmt::new(kind, span));
        }

        let iter_ir = self.expr(iter)?;
        self.bind_loop_target(target, &iter_ir.ty, span)?;
        let kind = ir::StmtKind::For {
            target: self.expr(target)?,
            iter: iter_ir,
            body: self.block(body)?,
            orelse: self.block(orelse)?,
        };
        Ok(ir::Stmt::new(kind, span))
    }

    /// Bind the loop name(s) to the iterable's element type. Tuple
    /// targets destructure a tuple-typed element positionally; an
    /// any-like element binds every name dynamically.
    fn bind_loop_target(
        &mut self,
        target: &ast::Expr,
        iter_ty: &Type,
        span: Option<Span>,
    ) -> Result<()> {
        let Some(elem) = iter_ty.iter_element() else {
            return Ok(());
        };
        match &target.kind {
            ast::ExprKind::Name(id) => self.bind(id, elem, span),
            ast::ExprKind::Tuple(elements) => {
                for (idx, element) in elements.iter().enumerate() {
                    let ast::ExprKind::Name(id) = &element.kind else {
                        continue;
                    };
                    let elem_ty = match &elem {
                        Type::Tuple(items) => items.get(idx).cloned().unwrap_or(Type::Unknown),
                        _ => Type::Unknown,
                    };
                    self.bind(id, elem_ty, span)?;
                }
                Ok(())
            }
            _ => Ok(()),
        }
    }

    fn function(&mut self, def: &ast::FunctionDef, span: Option<Span>) -> Result<ir::FunctionDef> {
        let current_class = self.class_stack.last().cloned();
        let mut param_types: Vec<(String, Type)> = Vec::with_capacity(def.params.len());
        for (idx, param) in def.params.iter().enumerate() {
            let ty = match &param.annotation {
                Some(text) => Type::parse(text).ok_or_else(|| {
                    Diagnostic::unsupported(
                        format!("unsupported annotation '{text}' on parameter '{}'", param.name),
                        span,
                        "Use the normalized annotation grammar.",
                    )
                })?,
                None => match &current_class {
                    Some(class) if idx == 0 && param.name == RECEIVER => {
                        Type::Class(class.clone())
                    }
                    _ => {
                        return Err(Diagnostic::inference(
                            format!("parameter '{}' requires a type annotation", param.name),
                            span,
                            "Add a type annotation to the parameter.",
                        ));
                    }
                },
            };
            param_types.push((param.name.clone(), ty));
        }
        let return_type = match &def.returns {
            Some(text) => Type::parse(text).ok_or_else(|| {
                Diagnostic::unsupported(
                    format!("unsupported return annotation '{text}'"),
                    span,
                    "Use the normalized annotation grammar.",
                )
            })?,
            None => Type::None,
        };

        let names: Vec<String> = param_types.iter().map(|(n, _)| n.clone()).collect();
        let usage = classify_params(&names, &def.body);

        self.env.push_scope_with(param_types.iter().cloned());
        self.usage_stack.push(usage.clone());
        let body = self.block(&def.body);
        self.usage_stack.pop();
        self.env.pop_scope();

        Ok(ir::FunctionDef {
            name: self.renames.resolved(&def.name).to_string(),
            original_name: def.name.clone(),
            params: param_types
                .into_iter()
                .map(|(name, ty)| {
                    let usage = usage.get(&name).copied().unwrap_or(ParamUsage::ReadOnly);
                    ir::Param { name, ty, usage }
                })
                .collect(),
            return_type,
            body: body?,
        })
    }

    // ------------------------------------------------------------------
    // Expressions
    // ------------------------------------------------------------------

    fn expr(&mut self, expr: &ast::Expr) -> Result<ir::Expr> {
        self.expr_with(expr, None)
    }

    fn expr_with(&mut self, expr: &ast::Expr, hint: Option<&Type>) -> Result<ir::Expr> {
        stacker::maybe_grow(STACK_RED_ZONE, STACK_GROW_SIZE, || {
            self.expr_inner(expr, hint)
        })
    }

    fn expr_inner(&mut self, expr: &ast::Expr, hint: Option<&Type>) -> Result<ir::Expr> {
        let span = expr.span;
        match &expr.kind {
            ast::ExprKind::Name(id) => self.name_expr(id, span),
            ast::ExprKind::Literal(lit) => {
                let ty = match lit {
                    ast::Literal::Bool(_) => Type::Bool,
                    ast::Literal::Int(_) => Type::INT64,
                    ast::Literal::Float(_) => Type::Float64,
                    ast::Literal::Str(_) => Type::Str,
                    ast::Literal::None => Type::None,
                };
                Ok(ir::Expr::new(ir::ExprKind::Literal(lit.clone()), ty, span))
            }
            ast::ExprKind::List(elements) => {
                if elements.is_empty() {
                    if let Some(hinted @ Type::List(_)) = hint {
                        return Ok(ir::Expr::new(
                            ir::ExprKind::List(Vec::new()),
                            hinted.clone(),
                            span,
                        ));
                    }
                    return Err(Diagnostic::inference(
                        "empty list type is ambiguous",
                        span,
                        "Annotate the target, e.g. x: list[int64] = [].",
                    ));
                }
                let elements = self.exprs(elements)?;
                let elem = self.unify_elements(&elements, span)?;
                Ok(ir::Expr::new(
                    ir::ExprKind::List(elements),
                    Type::list(elem),
                    span,
                ))
            }
            ast::ExprKind::Set(elements) => {
                if elements.is_empty() {
                    if let Some(hinted @ Type::Set(_)) = hint {
                        return Ok(ir::Expr::new(
                            ir::ExprKind::Set(Vec::new()),
                            hinted.clone(),
                            span,
                        ));
                    }
                    return Err(Diagnostic::inference(
                        "empty set type is ambiguous",
                        span,
                        "Annotate the target, e.g. x: set[str] = {}.",
                    ));
                }
                let elements = self.exprs(elements)?;
                let elem = self.unify_elements(&elements, span)?;
                Ok(ir::Expr::new(
                    ir::ExprKind::Set(elements),
                    Type::set(elem),
                    span,
                ))
            }
            ast::ExprKind::Tuple(elements) => {
                let elements = self.exprs(elements)?;
                let ty = Type::Tuple(elements.iter().map(|e| e.ty.clone()).collect());
                Ok(ir::Expr::new(ir::ExprKind::Tuple(elements), ty, span))
            }
            ast::ExprKind::Dict { entries } => {
                if entries.is_empty() {
                    if let Some(hinted @ Type::Dict(_, _)) = hint {
                        return Ok(ir::Expr::new(
                            ir::ExprKind::Dict {
                                entries: Vec::new(),
                            },
                            hinted.clone(),
                            span,
                        ));
                    }
                    return Err(Diagnostic::inference(
                        "empty dict type is ambiguous",
                        span,
                        "Annotate the target, e.g. x: dict[str,int64] = {}.",
                    ));
                }
                let mut out = Vec::with_capacity(entries.len());
                for (key, value) in entries {
                    out.push(ir::DictEntry {
                        key: self.expr(key)?,
                        value: self.expr(value)?,
                    });
                }
                let keys: Vec<Type> = out.iter().map(|e| e.key.ty.clone()).collect();
                let values: Vec<Type> = out.iter().map(|e| e.value.ty.clone()).collect();
                let key_ty = Type::unify_all(&keys).ok_or_else(|| ambiguous(&keys, span))?;
                let value_ty =
                    Type::unify_all(&values).ok_or_else(|| ambiguous(&values, span))?;
                Ok(ir::Expr::new(
                    ir::ExprKind::Dict { entries: out },
                    Type::dict(key_ty, value_ty),
                    span,
                ))
            }
            ast::ExprKind::Binary { op, left, right } => {
                let left = self.expr(left)?;
                let right = self.expr(right)?;
                let (ty, casts) = binary_type(*op, &left.ty, &right.ty, span)?;
                Ok(ir::Expr::new(
                    ir::ExprKind::Binary {
                        op: *op,
                        left: Box::new(left),
                        right: Box::new(right),
                    },
                    ty,
                    span,
                )
                .with_casts(casts))
            }
            ast::ExprKind::Unary { op, operand } => {
                let operand = self.expr(operand)?;
                let ty = match op {
                    ast::UnaryOp::Not => Type::Bool,
                    ast::UnaryOp::Neg if operand.ty.is_numeric() => operand.ty.clone(),
                    _ => {
                        return Err(Diagnostic::inference(
                            format!("cannot infer unary {op:?} on '{}'", operand.ty),
                            span,
                            "Use an explicit cast or a supported unary form.",
                        ));
                    }
                };
                Ok(ir::Expr::new(
                    ir::ExprKind::Unary {
                        op: *op,
                        operand: Box::new(operand),
                    },
                    ty,
                    span,
                ))
            }
            ast::ExprKind::BoolCombine { op, values } => {
                let values = self.exprs(values)?;
                Ok(ir::Expr::new(
                    ir::ExprKind::BoolCombine { op: *op, values },
                    Type::Bool,
                    span,
                ))
            }
            ast::ExprKind::Compare {
                left,
                ops,
                comparators,
            } => {
                let left = self.expr(left)?;
                let comparators = self.exprs(comparators)?;
                Ok(ir::Expr::new(
                    ir::ExprKind::Compare {
                        left: Box::new(left),
                        ops: ops.clone(),
                        comparators,
                    },
                    Type::Bool,
                    span,
                ))
            }
            ast::ExprKind::Cond { test, then, orelse } => {
                let test = self.expr(test)?;
                let then = self.expr(then)?;
                let orelse = self.expr(orelse)?;
                let (ty, casts) = if then.ty == orelse.ty {
                    (then.ty.clone(), Vec::new())
                } else if then.ty.is_numeric() && orelse.ty.is_numeric() {
                    (
                        Type::Float64,
                        vec![
                            Cast::branch(CastSite::Then, then.ty.clone(), Type::Float64),
                            Cast::branch(CastSite::Else, orelse.ty.clone(), Type::Float64),
                        ],
                    )
                } else {
                    return Err(Diagnostic::inference(
                        format!(
                            "conditional branch types mismatch: '{}' vs '{}'",
                            then.ty, orelse.ty
                        ),
                        span,
                        "Align both branches to the same type.",
                    ));
                };
                Ok(ir::Expr::new(
                    ir::ExprKind::Cond {
                        test: Box::new(test),
                        then: Box::new(then),
                        orelse: Box::new(orelse),
                    },
                    ty,
                    span,
                )
                .with_casts(casts))
            }
            ast::ExprKind::Attribute { value, attr } => self.attribute_expr(value, attr, span),
            ast::ExprKind::Subscript { value, index } => self.subscript_expr(value, index, span),
            ast::ExprKind::Call {
                func,
                args,
                keywords,
            } => self.call_expr(func, args, keywords, span),
            ast::ExprKind::StrFormat { parts } => {
                let mut out = Vec::with_capacity(parts.len());
                for part in parts {
                    out.push(match part {
                        ast::FormatPart::Literal(text) => ir::FormatPart::Literal(text.clone()),
                        ast::FormatPart::Value(value) => {
                            ir::FormatPart::Value(self.expr(value)?)
                        }
                    });
                }
                Ok(ir::Expr::new(
                    ir::ExprKind::StrFormat { parts: out },
                    Type::Str,
                    span,
                ))
            }
            ast::ExprKind::ListComp {
                element,
                target,
                iter,
                conds,
            } => {
                let ast::ExprKind::Name(target_name) = &target.kind else {
                    return Err(Diagnostic::unsupported(
                        "comprehension target must be a simple name",
                        span,
                        "Bind a single name in the comprehension.",
                    ));
                };
                let iter_ir = self.expr(iter)?;
                let elem = iter_ir.ty.iter_element().ok_or_else(|| {
                    Diagnostic::inference(
                        format!("cannot infer comprehension target type from '{}'", iter_ir.ty),
                        span,
                        "Annotate the iterable.",
                    )
                })?;
                self.env.push_scope();
                self.bind(target_name, elem, span)?;
                let conds = self.exprs(conds);
                let element_ir = conds.and_then(|conds| Ok((self.expr(element)?, conds)));
                self.env.pop_scope();
                let (element_ir, conds) = element_ir?;
                let ty = Type::list(element_ir.ty.clone());
                Ok(ir::Expr::new(
                    ir::ExprKind::ListComp {
                        element: Box::new(element_ir),
                        target: target_name.clone(),
                        iter: Box::new(iter_ir),
                        conds,
                    },
                    ty,
                    span,
                ))
            }
        }
    }

    fn exprs(&mut self, exprs: &[ast::Expr]) -> Result<Vec<ir::Expr>> {
        exprs.iter().map(|e| self.expr(e)).collect()
    }

    fn unify_elements(&self, elements: &[ir::Expr], span: Option<Span>) -> Result<Type> {
        let types: Vec<Type> = elements.iter().map(|e| e.ty.clone()).collect();
        Type::unify_all(&types).ok_or_else(|| ambiguous(&types, span))
    }

    fn name_expr(&self, id: &str, span: Option<Span>) -> Result<ir::Expr> {
        // reserved identifiers resolve regardless of lexical scope
        let ty = match id {
            "True" | "False" => Type::Bool,
            "None" => Type::None,
            "Exception" | "RuntimeError" => Type::Class("Exception".into()),
            _ => self
                .env
                .lookup(id)
                .cloned()
                .ok_or_else(|| {
                    Diagnostic::inference(
                        format!("type of name '{id}' is unknown"),
                        span,
                        "Add an annotation or assign a concretely typed value before use.",
                    )
                })?,
        };
        let borrow = self.borrow_kind(id);
        Ok(ir::Expr::new(
            ir::ExprKind::Name {
                id: self.renames.resolved(id).to_string(),
            },
            ty,
            span,
        )
        .with_borrow(borrow))
    }

    fn borrow_kind(&self, id: &str) -> BorrowKind {
        match self.usage_stack.last().and_then(|usage| usage.get(id)) {
            Some(ParamUsage::ReadOnly) => BorrowKind::ReadonlyRef,
            Some(ParamUsage::Mutable) => BorrowKind::MutableRef,
            None => BorrowKind::Value,
        }
    }

    fn attribute_expr(
        &mut self,
        value: &ast::Expr,
        attr: &str,
        span: Option<Span>,
    ) -> Result<ir::Expr> {
        // module-level constants of the math namespace
        if let ast::ExprKind::Name(id) = &value.kind {
            if id == "math" && self.env.lookup(id).is_none() {
                let ty = match attr {
                    "pi" | "e" | "tau" | "inf" | "nan" => Type::Float64,
                    _ => Type::Unknown,
                };
                let module = ir::Expr::new(
                    ir::ExprKind::Name { id: id.clone() },
                    Type::Unknown,
                    value.span,
                );
                return Ok(ir::Expr::new(
                    ir::ExprKind::Attribute {
                        value: Box::new(module),
                        attr: attr.to_string(),
                    },
                    ty,
                    span,
                ));
            }
        }

        let value_ir = self.expr(value)?;
        let ty = match &value_ir.ty {
            Type::Class(class) => self
                .schemas
                .field_type(class, attr, self.externs)
                .or_else(|| self.schemas.method_return(class, attr, self.externs))
                .cloned()
                .unwrap_or(Type::Unknown),
            Type::Path => match attr {
                "parent" => Type::Path,
                "name" | "stem" | "suffix" => Type::Str,
                _ => Type::Unknown,
            },
            // deferred to runtime
            _ => Type::Unknown,
        };
        Ok(ir::Expr::new(
            ir::ExprKind::Attribute {
                value: Box::new(value_ir),
                attr: attr.to_string(),
            },
            ty,
            span,
        ))
    }

    fn subscript_expr(
        &mut self,
        value: &ast::Expr,
        index: &ast::Index,
        span: Option<Span>,
    ) -> Result<ir::Expr> {
        let value_ir = self.expr(value)?;
        match index {
            ast::Index::Item(item) => {
                let const_index = match &item.kind {
                    ast::ExprKind::Literal(ast::Literal::Int(n)) => Some(*n),
                    _ => None,
                };
                let item_ir = self.expr(item)?;
                let ty = match &value_ir.ty {
                    Type::List(t) | Type::Set(t) => (**t).clone(),
                    Type::Dict(_, v) => (**v).clone(),
                    Type::Str => Type::Str,
                    Type::Bytes => Type::UINT8,
                    Type::Tuple(items) => match const_index {
                        Some(n) if n >= 0 && (n as usize) < items.len() => {
                            items[n as usize].clone()
                        }
                        // non-constant tuple index has no single element type
                        _ => Type::Unknown,
                    },
                    t if t.is_any_like() => Type::Unknown,
                    Type::Bool | Type::Int(_) | Type::Float32 | Type::Float64 | Type::None => {
                        return Err(Diagnostic::inference(
                            format!("type '{}' is not subscriptable", value_ir.ty),
                            span,
                            "Index a container, string or bytes value.",
                        ));
                    }
                    _ => Type::Unknown,
                };
                Ok(ir::Expr::new(
                    ir::ExprKind::Index {
                        value: Box::new(value_ir),
                        index: Box::new(item_ir),
                    },
                    ty,
                    span,
                ))
            }
            ast::Index::Slice { lower, upper, step } => {
                // slicing preserves the receiver's type
                let ty = value_ir.ty.clone();
                let mut part = |e: &Option<ast::Expr>| -> Result<Option<Box<ir::Expr>>> {
                    Ok(match e {
                        Some(e) => Some(Box::new(self.expr(e)?)),
                        None => None,
                    })
                };
                let lower = part(lower)?;
                let upper = part(upper)?;
                let step = part(step)?;
                Ok(ir::Expr::new(
                    ir::ExprKind::Slice {
                        value: Box::new(value_ir),
                        lower,
                        upper,
                        step,
                    },
                    ty,
                    span,
                ))
            }
        }
    }

    fn call_expr(
        &mut self,
        func: &ast::Expr,
        args: &[ast::Expr],
        keywords: &[ast::Keyword],
        span: Option<Span>,
    ) -> Result<ir::Expr> {
        let args_ir = self.exprs(args)?;
        let mut keywords_ir = Vec::with_capacity(keywords.len());
        for keyword in keywords {
            keywords_ir.push(ir::Keyword {
                arg: keyword.arg.clone(),
                value: self.expr(&keyword.value)?,
            });
        }

        let (func_ir, ty) = match &func.kind {
            ast::ExprKind::Name(name) => {
                let ty = self.named_call_type(name, &args_ir, span)?;
                let func_ir = ir::Expr::new(
                    ir::ExprKind::Name {
                        id: self.renames.resolved(name).to_string(),
                    },
                    Type::Unknown,
                    func.span,
                );
                (func_ir, ty)
            }
            ast::ExprKind::Attribute { value, attr } => {
                // math namespace functions
                if let ast::ExprKind::Name(id) = &value.kind {
                    if id == "math" && self.env.lookup(id).is_none() {
                        let module = ir::Expr::new(
                            ir::ExprKind::Name { id: id.clone() },
                            Type::Unknown,
                            value.span,
                        );
                        let func_ir = ir::Expr::new(
                            ir::ExprKind::Attribute {
                                value: Box::new(module),
                                attr: attr.clone(),
                            },
                            Type::Unknown,
                            func.span,
                        );
                        let call = ir::Expr::new(
                            ir::ExprKind::Call {
                                func: Box::new(func_ir),
                                args: args_ir,
                                keywords: keywords_ir,
                            },
                            Type::Float64,
                            span,
                        );
                        return Ok(call);
                    }
                }
                let owner = self.expr(value)?;
                let ty = self.method_call_type(&owner.ty, attr);
                let func_ir = ir::Expr::new(
                    ir::ExprKind::Attribute {
                        value: Box::new(owner),
                        attr: attr.clone(),
                    },
                    Type::Unknown,
                    func.span,
                );
                (func_ir, ty)
            }
            _ => {
                return Err(Diagnostic::inference(
                    "cannot infer call expression type",
                    span,
                    "Call a named function, constructor or method.",
                ));
            }
        };

        Ok(ir::Expr::new(
            ir::ExprKind::Call {
                func: Box::new(func_ir),
                args: args_ir,
                keywords: keywords_ir,
            },
            ty,
            span,
        ))
    }

    /// Return type of a call to a bare name: builtin table, class
    /// constructor, then recorded/imported function returns.
    fn named_call_type(
        &self,
        name: &str,
        args: &[ir::Expr],
        span: Option<Span>,
    ) -> Result<Type> {
        let ty = match name {
            "int" | "len" | "ord" => Type::INT64,
            "float" | "round" => Type::Float64,
            "bool" => Type::Bool,
            "str" | "chr" => Type::Str,
            "bytes" => Type::Bytes,
            "range" => Type::list(Type::INT64),
            "print" => Type::None,
            "iter" | "next" => Type::Object,
            "Path" => Type::Path,
            "Exception" | "RuntimeError" => Type::Class("Exception".into()),
            "abs" => match args.first() {
                Some(arg) if arg.ty.is_numeric() => arg.ty.clone(),
                _ => {
                    return Err(Diagnostic::inference(
                        "abs() requires one numeric argument",
                        span,
                        "Pass a numeric value to abs().",
                    ));
                }
            },
            "min" | "max" => {
                if args.is_empty() {
                    return Err(Diagnostic::inference(
                        format!("{name}() requires at least one argument"),
                        span,
                        format!("Pass at least one argument to {name}()."),
                    ));
                }
                let types: Vec<Type> = args.iter().map(|a| a.ty.clone()).collect();
                Type::unify_all(&types).ok_or_else(|| ambiguous(&types, span))?
            }
            _ => {
                if self.schemas.is_class(name, self.externs) {
                    Type::Class(name.to_string())
                } else if let Some(ret) = self.schemas.function_return(name, self.externs) {
                    ret.clone()
                } else {
                    return Err(Diagnostic::inference(
                        format!("cannot infer return type of call '{name}(...)'"),
                        span,
                        format!("Add a return annotation to '{name}'."),
                    ));
                }
            }
        };
        Ok(ty)
    }

    /// Return type of a method call on a typed receiver
    fn method_call_type(&self, owner: &Type, method: &str) -> Type {
        if let Type::Class(class) = owner {
            if let Some(ret) = self.schemas.method_return(class, method, self.externs) {
                return ret.clone();
            }
        }
        match owner {
            Type::Path => match method {
                "resolve" | "parent" | "joinpath" => Type::Path,
                "name" | "stem" | "read_text" => Type::Str,
                "exists" | "is_file" | "is_dir" => Type::Bool,
                "write_text" | "mkdir" => Type::None,
                _ => Type::Unknown,
            },
            Type::Str => match method {
                "upper" | "lower" | "strip" | "lstrip" | "rstrip" | "replace" | "join" => {
                    Type::Str
                }
                "split" => Type::list(Type::Str),
                "startswith" | "endswith" | "isdigit" | "isalpha" | "isalnum" => Type::Bool,
                "find" | "rfind" | "count" => Type::INT64,
                _ => Type::Unknown,
            },
            Type::List(elem) => match method {
                "append" | "extend" | "insert" | "clear" | "sort" | "reverse" | "remove" => {
                    Type::None
                }
                "pop" => (**elem).clone(),
                "count" | "index" => Type::INT64,
                _ => Type::Unknown,
            },
            Type::Set(_) => match method {
                "add" | "discard" | "remove" | "clear" | "update" => Type::None,
                _ => Type::Unknown,
            },
            Type::Dict(_, value) => match method {
                "update" | "clear" => Type::None,
                "get" | "pop" => (**value).clone(),
                _ => Type::Unknown,
            },
            _ => match method {
                // mutators on unresolved receivers still return nothing
                "append" | "extend" | "insert" | "clear" | "sort" | "reverse" | "update"
                | "add" => Type::None,
                _ => Type::Unknown,
            },
        }
    }

    // ------------------------------------------------------------------
    // Counting-iteration recognition
    // ------------------------------------------------------------------

    /// Recognize the direct `range(...)` call form of a loop iterable.
    /// Missing start defaults to zero, missing step to one.
    fn parse_range_iter(
        &self,
        iter: &ast::Expr,
    ) -> Result<Option<(ast::Expr, ast::Expr, ast::Expr)>> {
        let ast::ExprKind::Call {
            func,
            args,
            keywords,
        } = &iter.kind
        else {
            return Ok(None);
        };
        if !matches!(&func.kind, ast::ExprKind::Name(id) if id == "range") {
            return Ok(None);
        }
        if !keywords.is_empty() {
            return Err(Diagnostic::unsupported(
                "range() with keyword arguments is not supported",
                iter.span,
                "Use positional range() arguments.",
            ));
        }
        let triple = match args.as_slice() {
            [stop] => (ast::Expr::int(0), stop.clone(), ast::Expr::int(1)),
            [start, stop] => (start.clone(), stop.clone(), ast::Expr::int(1)),
            [start, stop, step] => (start.clone(), stop.clone(), step.clone()),
            _ => {
                return Err(Diagnostic::unsupported(
                    "range() accepts 1 to 3 positional arguments",
                    iter.span,
                    "Use range(stop), range(start, stop) or range(start, stop, step).",
                ));
            }
        };
        Ok(Some(triple))
    }

    fn bind(&mut self, name: &str, ty: Type, span: Option<Span>) -> Result<()> {
        match self.env.bind(name, ty.clone()) {
            BindOutcome::Conflict(prev) => Err(Diagnostic::conflict(
                format!("type conflict on '{name}': '{prev}' vs '{ty}'"),
                span,
                "Use an explicit cast or split the variable into different names.",
            )),
            _ => Ok(()),
        }
    }
}

/// Direction of a counting loop, from the syntactic step expression
fn range_mode(step: &ast::Expr, span: Option<Span>) -> Result<RangeMode> {
    let literal = match &step.kind {
        ast::ExprKind::Literal(ast::Literal::Int(n)) => Some(*n),
        ast::ExprKind::Unary {
            op: ast::UnaryOp::Neg,
            operand,
        } => match &operand.kind {
            ast::ExprKind::Literal(ast::Literal::Int(n)) => Some(-*n),
            _ => None,
        },
        _ => None,
    };
    match literal {
        Some(0) => Err(Diagnostic::conflict(
            "range() step must not be zero",
            span,
            "Use a non-zero step in range().",
        )),
        Some(n) if n > 0 => Ok(RangeMode::Ascending),
        Some(_) => Ok(RangeMode::Descending),
        None => Ok(RangeMode::Dynamic),
    }
}

fn ambiguous(types: &[Type], span: Option<Span>) -> Diagnostic {
    let list = types
        .iter()
        .map(Type::to_string)
        .collect::<Vec<_>>()
        .join(", ");
    Diagnostic::inference(
        format!("ambiguous types: [{list}]"),
        span,
        "Add an explicit annotation or cast to make the type unique.",
    )
}

/// Numeric/string typing of one binary operation, with promotion casts
fn binary_type(
    op: ast::BinOp,
    left: &Type,
    right: &Type,
    span: Option<Span>,
) -> Result<(Type, Vec<Cast>)> {
    if op == ast::BinOp::Div {
        // `/` on a path-like left operand is path-join
        if *left == Type::Path {
            return Ok((Type::Path, Vec::new()));
        }
        if left.is_numeric() && right.is_numeric() {
            return Ok((Type::Float64, promote_to(left, right, &Type::Float64)));
        }
        return Err(cannot_infer_binary(left, right, span));
    }

    if op == ast::BinOp::Add && *left == Type::Str && *right == Type::Str {
        return Ok((Type::Str, Vec::new()));
    }

    if left.is_numeric() && right.is_numeric() {
        if left == right {
            return Ok((left.clone(), Vec::new()));
        }
        if left.is_int() && right.is_int() {
            let unified = Type::unify_all(&[left.clone(), right.clone()])
                .unwrap_or(Type::INT64);
            let casts = promote_to(left, right, &unified);
            return Ok((unified, casts));
        }
        return Ok((Type::Float64, promote_to(left, right, &Type::Float64)));
    }

    Err(cannot_infer_binary(left, right, span))
}

/// One promotion cast per operand whose type differs from the result
fn promote_to(left: &Type, right: &Type, to: &Type) -> Vec<Cast> {
    let mut casts = Vec::new();
    if left != to {
        casts.push(Cast::promotion(CastSite::Left, left.clone(), to.clone()));
    }
    if right != to {
        casts.push(Cast::promotion(CastSite::Right, right.clone(), to.clone()));
    }
    casts
}

fn cannot_infer_binary(left: &Type, right: &Type, span: Option<Span>) -> Diagnostic {
    Diagnostic::inference(
        format!("cannot infer binary operation type: '{left}' op '{right}'"),
        span,
        "Add an explicit cast or simplify the expression.",
    )
}

/// Match the unit-entry guard: `if __name__ == "__main__":`
fn main_guard_body(stmt: &ast::Stmt) -> Option<&[ast::Stmt]> {
    let ast::StmtKind::If { test, body, orelse } = &stmt.kind else {
        return None;
    };
    if !orelse.is_empty() {
        return None;
    }
    let ast::ExprKind::Compare {
        left,
        ops,
        comparators,
    } = &test.kind
    else {
        return None;
    };
    if ops.len() != 1 || ops[0] != ast::CmpOp::Eq || comparators.len() != 1 {
        return None;
    }
    let is_name = matches!(&left.kind, ast::ExprKind::Name(id) if id == UNIT_NAME);
    let is_main = matches!(
        &comparators[0].kind,
        ast::ExprKind::Literal(ast::Literal::Str(s)) if s == UNIT_MAIN
    );
    (is_name && is_main).then_some(body.as_slice())
}

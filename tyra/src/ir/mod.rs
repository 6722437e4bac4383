//! Typed intermediate representation.
//!
//! One node grammar serves both pipeline stages. The resolver produces
//! trees that never contain the boundary variants (`Box`, `Unbox`,
//! `DynOp`) or `ForCore`; lowering introduces them and nothing else.
//! Keeping a single grammar makes the lowering pass a structural
//! rewrite that is trivially idempotent on nodes it does not recognize.

pub mod human;

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

pub use crate::ast::{BinOp, BoolOp, CmpOp, ImportName, Literal, Span, UnaryOp};
use crate::types::Type;

/// How a bound name is used at one occurrence
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BorrowKind {
    Value,
    ReadonlyRef,
    MutableRef,
    Move,
}

/// Conservative per-parameter mutability classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParamUsage {
    ReadOnly,
    Mutable,
}

/// Module-wide runtime-iteration dispatch setting. Opaque here; only
/// downstream code generators interpret it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DispatchMode {
    #[default]
    Native,
    TypeId,
}

/// Which pipeline stage produced the tree
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Typed,
    Lowered,
}

/// Which operand of a node a cast applies to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CastSite {
    Left,
    Right,
    Then,
    Else,
}

/// Why a cast was inserted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CastReason {
    NumericPromotion,
    BranchPromotion,
}

/// An implicit numeric promotion required to evaluate a node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cast {
    pub on: CastSite,
    pub from: Type,
    pub to: Type,
    pub reason: CastReason,
}

impl Cast {
    pub fn promotion(on: CastSite, from: Type, to: Type) -> Self {
        Self {
            on,
            from,
            to,
            reason: CastReason::NumericPromotion,
        }
    }

    pub fn branch(on: CastSite, from: Type, to: Type) -> Self {
        Self {
            on,
            from,
            to,
            reason: CastReason::BranchPromotion,
        }
    }
}

/// What happens when an `Unbox` does not hold the expected type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnboxPolicy {
    Raise,
}

/// The dynamic-boundary operations, each taking one any-like argument
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DynOpKind {
    Truthy,
    Len,
    Str,
    IterInit,
    IterNext,
}

impl DynOpKind {
    /// Result type of the boundary operation
    pub fn result_type(self) -> Type {
        match self {
            DynOpKind::Truthy => Type::Bool,
            DynOpKind::Len => Type::INT64,
            DynOpKind::Str => Type::Str,
            DynOpKind::IterInit | DynOpKind::IterNext => Type::Object,
        }
    }
}

/// A fully typed expression
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Expr {
    pub kind: ExprKind,
    /// Always a normalized type, never raw annotation text
    pub ty: Type,
    pub borrow: BorrowKind,
    /// Empty unless evaluating this node requires numeric promotion
    pub casts: Vec<Cast>,
    pub span: Option<Span>,
}

impl Expr {
    pub fn new(kind: ExprKind, ty: Type, span: Option<Span>) -> Self {
        Self {
            kind,
            ty,
            borrow: BorrowKind::Value,
            casts: Vec::new(),
            span,
        }
    }

    pub fn with_casts(mut self, casts: Vec<Cast>) -> Self {
        self.casts = casts;
        self
    }

    pub fn with_borrow(mut self, borrow: BorrowKind) -> Self {
        self.borrow = borrow;
        self
    }

    /// Synthesized `int64` literal with no span
    pub fn int_literal(value: i64) -> Self {
        Self::new(ExprKind::Literal(Literal::Int(value)), Type::INT64, None)
    }
}

/// Keyword argument on a call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Keyword {
    pub arg: Option<String>,
    pub value: Expr,
}

/// One piece of an interpolated string
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum FormatPart {
    Literal(String),
    Value(Expr),
}

/// One key/value entry of a dict literal
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DictEntry {
    pub key: Expr,
    pub value: Expr,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ExprKind {
    Name {
        id: String,
    },
    Literal(Literal),
    List(Vec<Expr>),
    Set(Vec<Expr>),
    Tuple(Vec<Expr>),
    Dict {
        entries: Vec<DictEntry>,
    },
    Binary {
        op: BinOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    Unary {
        op: UnaryOp,
        operand: Box<Expr>,
    },
    BoolCombine {
        op: BoolOp,
        values: Vec<Expr>,
    },
    Compare {
        left: Box<Expr>,
        ops: Vec<CmpOp>,
        comparators: Vec<Expr>,
    },
    Cond {
        test: Box<Expr>,
        then: Box<Expr>,
        orelse: Box<Expr>,
    },
    Attribute {
        value: Box<Expr>,
        attr: String,
    },
    Index {
        value: Box<Expr>,
        index: Box<Expr>,
    },
    Slice {
        value: Box<Expr>,
        lower: Option<Box<Expr>>,
        upper: Option<Box<Expr>>,
        step: Option<Box<Expr>>,
    },
    Call {
        func: Box<Expr>,
        args: Vec<Expr>,
        keywords: Vec<Keyword>,
    },
    StrFormat {
        parts: Vec<FormatPart>,
    },
    ListComp {
        element: Box<Expr>,
        target: String,
        iter: Box<Expr>,
        conds: Vec<Expr>,
    },
    /// Erase a statically typed value into the dynamic representation.
    /// Introduced only by lowering.
    Box {
        value: Box<Expr>,
    },
    /// Recover a statically typed value from a dynamic one.
    /// Introduced only by lowering.
    Unbox {
        value: Box<Expr>,
        target: Type,
        on_fail: UnboxPolicy,
    },
    /// Single-argument dynamic-boundary operation.
    /// Introduced only by lowering.
    DynOp {
        op: DynOpKind,
        value: Box<Expr>,
    },
}

/// A typed statement
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Stmt {
    pub kind: StmtKind,
    pub span: Option<Span>,
}

impl Stmt {
    pub fn new(kind: StmtKind, span: Option<Span>) -> Self {
        Self { kind, span }
    }
}

/// Typed function definition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionDef {
    /// Canonical (possibly renamed) spelling
    pub name: String,
    pub original_name: String,
    pub params: Vec<Param>,
    pub return_type: Type,
    pub body: Vec<Stmt>,
}

/// Typed, usage-classified parameter
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Param {
    pub name: String,
    pub ty: Type,
    pub usage: ParamUsage,
}

/// One `except` clause
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExceptHandler {
    pub ty: Option<Expr>,
    pub name: Option<String>,
    pub body: Vec<Stmt>,
    pub span: Option<Span>,
}

/// Direction of a statically planned counting loop
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RangeMode {
    Ascending,
    Descending,
    /// Condition and increment must be derived from the step's sign at
    /// run time
    Dynamic,
}

/// How a lowered loop iterates
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum IterPlan {
    StaticRange {
        start: Expr,
        stop: Expr,
        step: Expr,
        mode: RangeMode,
    },
    RuntimeIter {
        iter: Expr,
        dispatch_mode: DispatchMode,
    },
}

/// How a lowered loop binds each produced element
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum TargetPlan {
    Name { id: String, ty: Type },
    Tuple { elements: Vec<TargetPlan> },
    Expr { target: Box<Expr> },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum StmtKind {
    FunctionDef(FunctionDef),
    ClassDef {
        name: String,
        original_name: String,
        base: Option<String>,
        body: Vec<Stmt>,
    },
    Return(Option<Expr>),
    Assign {
        target: Expr,
        value: Expr,
    },
    AugAssign {
        target: Expr,
        op: BinOp,
        value: Expr,
    },
    AnnAssign {
        target: Expr,
        annotation: Type,
        value: Option<Expr>,
    },
    Expr(Expr),
    If {
        test: Expr,
        body: Vec<Stmt>,
        orelse: Vec<Stmt>,
    },
    While {
        test: Expr,
        body: Vec<Stmt>,
        orelse: Vec<Stmt>,
    },
    /// Generic loop over an iterable; replaced by `ForCore` in stage two
    For {
        target: Expr,
        iter: Expr,
        body: Vec<Stmt>,
        orelse: Vec<Stmt>,
    },
    /// Recognized counting loop; replaced by `ForCore` in stage two
    ForRange {
        target: Expr,
        start: Expr,
        stop: Expr,
        step: Expr,
        mode: RangeMode,
        body: Vec<Stmt>,
        orelse: Vec<Stmt>,
    },
    /// The single loop form of the boundary-explicit IR
    ForCore {
        plan: IterPlan,
        target: TargetPlan,
        body: Vec<Stmt>,
        orelse: Vec<Stmt>,
    },
    Try {
        body: Vec<Stmt>,
        handlers: Vec<ExceptHandler>,
        orelse: Vec<Stmt>,
        finalbody: Vec<Stmt>,
    },
    Raise(Option<Expr>),
    Import {
        names: Vec<ImportName>,
    },
    Pass,
    Break,
    Continue,
}

/// A typed compilation unit, the artifact exchanged between stages
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Module {
    pub source_path: String,
    pub stage: Stage,
    pub dispatch_mode: DispatchMode,
    pub body: Vec<Stmt>,
    /// Statements extracted from the unit-entry guard
    pub main_body: Vec<Stmt>,
    /// Canonical spellings for renamed top-level symbols
    pub renames: BTreeMap<String, String>,
    pub span: Option<Span>,
}

impl Module {
    /// Serialize the stage artifact as JSON
    pub fn to_json(&self, pretty: bool) -> serde_json::Result<String> {
        if pretty {
            serde_json::to_string_pretty(self)
        } else {
            serde_json::to_string(self)
        }
    }

    /// Read a stage artifact back from JSON
    pub fn from_json(text: &str) -> serde_json::Result<Module> {
        serde_json::from_str(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dyn_op_result_types() {
        assert_eq!(DynOpKind::Truthy.result_type(), Type::Bool);
        assert_eq!(DynOpKind::Len.result_type(), Type::INT64);
        assert_eq!(DynOpKind::Str.result_type(), Type::Str);
        assert_eq!(DynOpKind::IterInit.result_type(), Type::Object);
        assert_eq!(DynOpKind::IterNext.result_type(), Type::Object);
    }

    #[test]
    fn test_module_json_round_trip() {
        let module = Module {
            source_path: "unit.src".into(),
            stage: Stage::Typed,
            dispatch_mode: DispatchMode::Native,
            body: vec![Stmt::new(
                StmtKind::Expr(Expr::int_literal(7)),
                Some(Span::on_line(1, 0, 1)),
            )],
            main_body: Vec::new(),
            renames: BTreeMap::new(),
            span: None,
        };
        let json = module.to_json(false).unwrap();
        let back = Module::from_json(&json).unwrap();
        assert_eq!(back, module);
    }

    #[test]
    fn test_dispatch_mode_serializes_snake_case() {
        assert_eq!(
            serde_json::to_string(&DispatchMode::TypeId).unwrap(),
            "\"type_id\""
        );
    }
}

//! Untyped input tree.
//!
//! This is the contract with the external front-end: a structurally
//! complete statement/expression tree with no resolved types, no casts
//! and no borrow classification. Type annotations, where present, are
//! carried as text in the normalized type grammar (`list[int64]`,
//! `str|none`) and parsed during resolution.

mod expr;
mod span;

pub use expr::*;
pub use span::*;

use serde::{Deserialize, Serialize};

/// One compilation unit
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Module {
    pub source_path: String,
    pub body: Vec<Stmt>,
    pub span: Option<Span>,
}

impl Module {
    pub fn new(source_path: impl Into<String>, body: Vec<Stmt>) -> Self {
        Self {
            source_path: source_path.into(),
            body,
            span: None,
        }
    }
}

/// An untyped statement
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Stmt {
    pub kind: StmtKind,
    pub span: Option<Span>,
}

impl Stmt {
    pub fn new(kind: StmtKind) -> Self {
        Self { kind, span: None }
    }

    pub fn with_span(kind: StmtKind, span: Span) -> Self {
        Self {
            kind,
            span: Some(span),
        }
    }

    pub fn assign(target: Expr, value: Expr) -> Self {
        Self::new(StmtKind::Assign {
            targets: vec![target],
            value,
        })
    }

    pub fn ann_assign(target: Expr, annotation: impl Into<String>, value: Option<Expr>) -> Self {
        Self::new(StmtKind::AnnAssign {
            target,
            annotation: annotation.into(),
            value,
        })
    }

    pub fn expr(value: Expr) -> Self {
        Self::new(StmtKind::Expr(value))
    }

    pub fn for_loop(target: Expr, iter: Expr, body: Vec<Stmt>) -> Self {
        Self::new(StmtKind::For {
            target,
            iter,
            body,
            orelse: Vec::new(),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum StmtKind {
    FunctionDef(FunctionDef),
    ClassDef(ClassDef),
    Return(Option<Expr>),
    Assign {
        targets: Vec<Expr>,
        value: Expr,
    },
    AugAssign {
        target: Expr,
        op: BinOp,
        value: Expr,
    },
    AnnAssign {
        target: Expr,
        annotation: String,
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
    For {
        target: Expr,
        iter: Expr,
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

/// Function definition (top-level or method)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionDef {
    pub name: String,
    pub params: Vec<Param>,
    /// Return annotation text; absent means the none type
    pub returns: Option<String>,
    pub body: Vec<Stmt>,
}

/// Function parameter with optional annotation text
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Param {
    pub name: String,
    pub annotation: Option<String>,
}

impl Param {
    pub fn new(name: impl Into<String>, annotation: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            annotation: Some(annotation.into()),
        }
    }

    pub fn bare(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            annotation: None,
        }
    }
}

/// Class definition; single inheritance only
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassDef {
    pub name: String,
    pub base: Option<String>,
    pub body: Vec<Stmt>,
}

/// One `except` clause
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExceptHandler {
    pub ty: Option<Expr>,
    pub name: Option<String>,
    pub body: Vec<Stmt>,
    pub span: Option<Span>,
}

/// One imported binding
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImportName {
    pub name: String,
    pub asname: Option<String>,
}

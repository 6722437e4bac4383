//! Stage two: boundary-explicit lowering.
//!
//! Consumes the typed IR and makes every dynamic-boundary crossing and
//! every loop's iteration strategy explicit. The pass is structural and
//! infallible: nodes it does not recognize are rebuilt with lowered
//! children, so running it over already-lowered input changes nothing.

pub mod boundary;
pub mod iter_plan;

use crate::ir::{
    DictEntry, DispatchMode, ExceptHandler, Expr, ExprKind, FormatPart, IterPlan, Keyword,
    Module, Stage, Stmt, StmtKind,
};
use crate::types::Type;

const STACK_RED_ZONE: usize = 128 * 1024;
const STACK_GROW_SIZE: usize = 2 * 1024 * 1024;

/// Lower one typed unit into the boundary-explicit form
pub fn lower_unit(module: Module, dispatch_mode: DispatchMode) -> Module {
    let lowerer = Lowerer { dispatch_mode };
    let Module {
        source_path,
        stage: _,
        dispatch_mode: _,
        body,
        main_body,
        renames,
        span,
    } = module;
    Module {
        source_path,
        stage: Stage::Lowered,
        dispatch_mode,
        body: lowerer.block(body, None),
        main_body: lowerer.block(main_body, None),
        renames,
        span,
    }
}

struct Lowerer {
    dispatch_mode: DispatchMode,
}

impl Lowerer {
    fn block(&self, body: Vec<Stmt>, ret: Option<&Type>) -> Vec<Stmt> {
        body.into_iter().map(|stmt| self.stmt(stmt, ret)).collect()
    }

    fn stmt(&self, stmt: Stmt, ret: Option<&Type>) -> Stmt {
        stacker::maybe_grow(STACK_RED_ZONE, STACK_GROW_SIZE, || {
            self.stmt_inner(stmt, ret)
        })
    }

    fn stmt_inner(&self, stmt: Stmt, ret: Option<&Type>) -> Stmt {
        let span = stmt.span;
        let kind = match stmt.kind {
            StmtKind::FunctionDef(mut def) => {
                let ret_ty = def.return_type.clone();
                let body = std::mem::take(&mut def.body);
                def.body = self.block(body, Some(&ret_ty));
                StmtKind::FunctionDef(def)
            }
            StmtKind::ClassDef {
                name,
                original_name,
                base,
                body,
            } => StmtKind::ClassDef {
                name,
                original_name,
                base,
                body: self.block(body, None),
            },
            StmtKind::Return(value) => StmtKind::Return(value.map(|value| {
                let value = self.expr(value);
                match ret {
                    Some(ret) => boundary::bridge(ret, value),
                    None => value,
                }
            })),
            StmtKind::Assign { target, value } => {
                let target = self.expr(target);
                let value = boundary::bridge(&target.ty, self.expr(value));
                StmtKind::Assign { target, value }
            }
            StmtKind::AugAssign { target, op, value } => {
                let target = self.expr(target);
                let value = boundary::bridge(&target.ty, self.expr(value));
                StmtKind::AugAssign { target, op, value }
            }
            StmtKind::AnnAssign {
                target,
                annotation,
                value,
            } => {
                let value =
                    value.map(|value| boundary::bridge(&annotation, self.expr(value)));
                StmtKind::AnnAssign {
                    target: self.expr(target),
                    annotation,
                    value,
                }
            }
            StmtKind::Expr(value) => StmtKind::Expr(self.expr(value)),
            StmtKind::If { test, body, orelse } => StmtKind::If {
                test: boundary::truthy(self.expr(test)),
                body: self.block(body, ret),
                orelse: self.block(orelse, ret),
            },
            StmtKind::While { test, body, orelse } => StmtKind::While {
                test: boundary::truthy(self.expr(test)),
                body: self.block(body, ret),
                orelse: self.block(orelse, ret),
            },
            StmtKind::For {
                target,
                iter,
                body,
                orelse,
            } => {
                let target = self.expr(target);
                iter_plan::lower_for(
                    &target,
                    self.expr(iter),
                    self.dispatch_mode,
                    self.block(body, ret),
                    self.block(orelse, ret),
                )
            }
            StmtKind::ForRange {
                target,
                start,
                stop,
                step,
                mode,
                body,
                orelse,
            } => {
                let target = self.expr(target);
                iter_plan::lower_for_range(
                    &target,
                    self.expr(start),
                    self.expr(stop),
                    self.expr(step),
                    mode,
                    self.block(body, ret),
                    self.block(orelse, ret),
                )
            }
            // already lowered; dispatch mode of the original lowering wins
            StmtKind::ForCore {
                plan,
                target,
                body,
                orelse,
            } => {
                let plan = match plan {
                    IterPlan::StaticRange {
                        start,
                        stop,
                        step,
                        mode,
                    } => IterPlan::StaticRange {
                        start: self.expr(start),
                        stop: self.expr(stop),
                        step: self.expr(step),
                        mode,
                    },
                    IterPlan::RuntimeIter {
                        iter,
                        dispatch_mode,
                    } => IterPlan::RuntimeIter {
                        iter: self.expr(iter),
                        dispatch_mode,
                    },
                };
                StmtKind::ForCore {
                    plan,
                    target,
                    body: self.block(body, ret),
                    orelse: self.block(orelse, ret),
                }
            }
            StmtKind::Try {
                body,
                handlers,
                orelse,
                finalbody,
            } => StmtKind::Try {
                body: self.block(body, ret),
                handlers: handlers
                    .into_iter()
                    .map(|handler| ExceptHandler {
                        ty: handler.ty.map(|ty| self.expr(ty)),
                        name: handler.name,
                        body: self.block(handler.body, ret),
                        span: handler.span,
                    })
                    .collect(),
                orelse: self.block(orelse, ret),
                finalbody: self.block(finalbody, ret),
            },
            StmtKind::Raise(exc) => StmtKind::Raise(exc.map(|exc| self.expr(exc))),
            passthrough @ (StmtKind::Import { .. }
            | StmtKind::Pass
            | StmtKind::Break
            | StmtKind::Continue) => passthrough,
        };
        Stmt::new(kind, span)
    }

    fn expr(&self, expr: Expr) -> Expr {
        stacker::maybe_grow(STACK_RED_ZONE, STACK_GROW_SIZE, || self.expr_inner(expr))
    }

    fn expr_inner(&self, expr: Expr) -> Expr {
        let Expr {
            kind,
            ty,
            borrow,
            casts,
            span,
        } = expr;
        let kind = match kind {
            leaf @ (ExprKind::Name { .. } | ExprKind::Literal(_)) => leaf,
            ExprKind::List(items) => ExprKind::List(self.exprs(items)),
            ExprKind::Set(items) => ExprKind::Set(self.exprs(items)),
            ExprKind::Tuple(items) => ExprKind::Tuple(self.exprs(items)),
            ExprKind::Dict { entries } => ExprKind::Dict {
                entries: entries
                    .into_iter()
                    .map(|entry| DictEntry {
                        key: self.expr(entry.key),
                        value: self.expr(entry.value),
                    })
                    .collect(),
            },
            ExprKind::Binary { op, left, right } => ExprKind::Binary {
                op,
                left: self.boxed(left),
                right: self.boxed(right),
            },
            ExprKind::Unary { op, operand } => ExprKind::Unary {
                op,
                operand: self.boxed(operand),
            },
            ExprKind::BoolCombine { op, values } => ExprKind::BoolCombine {
                op,
                values: self.exprs(values),
            },
            ExprKind::Compare {
                left,
                ops,
                comparators,
            } => ExprKind::Compare {
                left: self.boxed(left),
                ops,
                comparators: self.exprs(comparators),
            },
            ExprKind::Cond { test, then, orelse } => ExprKind::Cond {
                test: Box::new(boundary::truthy(self.expr(*test))),
                then: self.boxed(then),
                orelse: self.boxed(orelse),
            },
            ExprKind::Attribute { value, attr } => ExprKind::Attribute {
                value: self.boxed(value),
                attr,
            },
            ExprKind::Index { value, index } => ExprKind::Index {
                value: self.boxed(value),
                index: self.boxed(index),
            },
            ExprKind::Slice {
                value,
                lower,
                upper,
                step,
            } => ExprKind::Slice {
                value: self.boxed(value),
                lower: self.opt_boxed(lower),
                upper: self.opt_boxed(upper),
                step: self.opt_boxed(step),
            },
            ExprKind::Call {
                func,
                args,
                keywords,
            } => {
                let call = Expr {
                    kind: ExprKind::Call {
                        func: self.boxed(func),
                        args: self.exprs(args),
                        keywords: keywords
                            .into_iter()
                            .map(|keyword| Keyword {
                                arg: keyword.arg,
                                value: self.expr(keyword.value),
                            })
                            .collect(),
                    },
                    ty,
                    borrow,
                    casts,
                    span,
                };
                return boundary::rewrite_call(call);
            }
            ExprKind::StrFormat { parts } => ExprKind::StrFormat {
                parts: parts
                    .into_iter()
                    .map(|part| match part {
                        FormatPart::Literal(text) => FormatPart::Literal(text),
                        FormatPart::Value(value) => FormatPart::Value(self.expr(value)),
                    })
                    .collect(),
            },
            ExprKind::ListComp {
                element,
                target,
                iter,
                conds,
            } => ExprKind::ListComp {
                element: self.boxed(element),
                target,
                iter: self.boxed(iter),
                conds: self.exprs(conds),
            },
            ExprKind::Box { value } => ExprKind::Box {
                value: self.boxed(value),
            },
            ExprKind::Unbox {
                value,
                target,
                on_fail,
            } => ExprKind::Unbox {
                value: self.boxed(value),
                target,
                on_fail,
            },
            ExprKind::DynOp { op, value } => ExprKind::DynOp {
                op,
                value: self.boxed(value),
            },
        };
        Expr {
            kind,
            ty,
            borrow,
            casts,
            span,
        }
    }

    fn exprs(&self, exprs: Vec<Expr>) -> Vec<Expr> {
        exprs.into_iter().map(|expr| self.expr(expr)).collect()
    }

    fn boxed(&self, expr: Box<Expr>) -> Box<Expr> {
        Box::new(self.expr(*expr))
    }

    fn opt_boxed(&self, expr: Option<Box<Expr>>) -> Option<Box<Expr>> {
        expr.map(|expr| self.boxed(expr))
    }
}

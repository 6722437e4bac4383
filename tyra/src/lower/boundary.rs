//! Box/Unbox insertion and boundary-op rewriting.
//!
//! A value crosses the dynamic boundary when a concretely typed value
//! meets an any-like seam or the reverse. `bridge` wraps exactly the
//! crossing values; values already on the right side pass through
//! untouched, which is what makes the whole pass idempotent.

use crate::ir::{DynOpKind, Expr, ExprKind, UnboxPolicy};
use crate::types::Type;

/// Bridge `value` to the `expected` type at an assignment-like seam
pub fn bridge(expected: &Type, value: Expr) -> Expr {
    if expected.is_any_like() && !value.ty.is_any_like() {
        let span = value.span;
        return Expr::new(
            ExprKind::Box {
                value: Box::new(value),
            },
            Type::Object,
            span,
        );
    }
    if !expected.is_any_like() && value.ty.is_any_like() {
        let span = value.span;
        return Expr::new(
            ExprKind::Unbox {
                value: Box::new(value),
                target: expected.clone(),
                on_fail: UnboxPolicy::Raise,
            },
            expected.clone(),
            span,
        );
    }
    value
}

/// Make a condition position boolean-typed. Concrete tests are left to
/// the code generator's native truthiness.
pub fn truthy(test: Expr) -> Expr {
    if !test.ty.is_any_like() {
        return test;
    }
    let span = test.span;
    Expr::new(
        ExprKind::DynOp {
            op: DynOpKind::Truthy,
            value: Box::new(test),
        },
        Type::Bool,
        span,
    )
}

fn boundary_op(name: &str) -> Option<DynOpKind> {
    Some(match name {
        "bool" => DynOpKind::Truthy,
        "len" => DynOpKind::Len,
        "str" => DynOpKind::Str,
        "iter" => DynOpKind::IterInit,
        "next" => DynOpKind::IterNext,
        _ => return None,
    })
}

/// Rewrite a call to a boundary builtin over one any-like argument
/// into its dedicated operation node. Any other call is returned
/// unchanged, including the same builtins over concrete arguments.
pub fn rewrite_call(expr: Expr) -> Expr {
    let Expr {
        kind,
        ty,
        borrow,
        casts,
        span,
    } = expr;
    match kind {
        ExprKind::Call {
            func,
            mut args,
            keywords,
        } => {
            let op = match &func.kind {
                ExprKind::Name { id }
                    if keywords.is_empty() && args.len() == 1 && args[0].ty.is_any_like() =>
                {
                    boundary_op(id)
                }
                _ => None,
            };
            match op {
                Some(op) => {
                    let value = args.remove(0);
                    Expr::new(
                        ExprKind::DynOp {
                            op,
                            value: Box::new(value),
                        },
                        op.result_type(),
                        span,
                    )
                }
                None => Expr {
                    kind: ExprKind::Call {
                        func,
                        args,
                        keywords,
                    },
                    ty,
                    borrow,
                    casts,
                    span,
                },
            }
        }
        kind => Expr {
            kind,
            ty,
            borrow,
            casts,
            span,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::Literal;

    fn any_name(id: &str) -> Expr {
        Expr::new(
            ExprKind::Name { id: id.into() },
            Type::Unknown,
            None,
        )
    }

    fn call(func: Expr, args: Vec<Expr>) -> Expr {
        Expr::new(
            ExprKind::Call {
                func: Box::new(func),
                args,
                keywords: Vec::new(),
            },
            Type::Unknown,
            None,
        )
    }

    #[test]
    fn test_bridge_boxes_concrete_into_any() {
        let bridged = bridge(&Type::Object, Expr::int_literal(3));
        assert!(matches!(bridged.kind, ExprKind::Box { .. }));
        assert_eq!(bridged.ty, Type::Object);
    }

    #[test]
    fn test_bridge_unboxes_any_into_concrete() {
        let bridged = bridge(&Type::INT64, any_name("x"));
        let ExprKind::Unbox {
            target, on_fail, ..
        } = &bridged.kind
        else {
            panic!("expected Unbox, got {:?}", bridged.kind);
        };
        assert_eq!(*target, Type::INT64);
        assert_eq!(*on_fail, UnboxPolicy::Raise);
        assert_eq!(bridged.ty, Type::INT64);
    }

    #[test]
    fn test_bridge_matching_sides_pass_through() {
        let concrete = bridge(&Type::INT64, Expr::int_literal(3));
        assert!(matches!(
            concrete.kind,
            ExprKind::Literal(Literal::Int(3))
        ));
        let dynamic = bridge(&Type::Object, any_name("x"));
        assert!(matches!(dynamic.kind, ExprKind::Name { .. }));
    }

    #[test]
    fn test_bridge_is_idempotent() {
        let once = bridge(&Type::INT64, any_name("x"));
        let twice = bridge(&Type::INT64, once.clone());
        assert_eq!(once, twice);
    }

    #[test]
    fn test_truthy_wraps_only_any_like() {
        let wrapped = truthy(any_name("flag"));
        assert!(matches!(
            wrapped.kind,
            ExprKind::DynOp {
                op: DynOpKind::Truthy,
                ..
            }
        ));
        assert_eq!(wrapped.ty, Type::Bool);

        let concrete = Expr::new(
            ExprKind::Literal(Literal::Bool(true)),
            Type::Bool,
            None,
        );
        assert!(matches!(
            truthy(concrete).kind,
            ExprKind::Literal(Literal::Bool(true))
        ));
    }

    #[test]
    fn test_len_over_any_becomes_dyn_op() {
        let rewritten = rewrite_call(call(any_name("len"), vec![any_name("xs")]));
        assert!(matches!(
            rewritten.kind,
            ExprKind::DynOp {
                op: DynOpKind::Len,
                ..
            }
        ));
        assert_eq!(rewritten.ty, Type::INT64);
    }

    #[test]
    fn test_len_over_concrete_is_untouched() {
        let arg = Expr::new(
            ExprKind::Name { id: "xs".into() },
            Type::list(Type::INT64),
            None,
        );
        let rewritten = rewrite_call(call(any_name("len"), vec![arg]));
        assert!(matches!(rewritten.kind, ExprKind::Call { .. }));
    }

    #[test]
    fn test_other_callees_are_untouched() {
        let rewritten = rewrite_call(call(any_name("helper"), vec![any_name("xs")]));
        assert!(matches!(rewritten.kind, ExprKind::Call { .. }));
    }
}

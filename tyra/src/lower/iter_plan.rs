//! Loop plan construction.
//!
//! Stage two collapses both loop statement forms into the single
//! `ForCore` shape: an iteration plan saying how values are produced
//! and a target plan saying how each value is bound.

use crate::ir::{DispatchMode, Expr, ExprKind, IterPlan, RangeMode, Stmt, StmtKind, TargetPlan};

/// Plan a recognized counting loop
pub fn lower_for_range(
    target: &Expr,
    start: Expr,
    stop: Expr,
    step: Expr,
    mode: RangeMode,
    body: Vec<Stmt>,
    orelse: Vec<Stmt>,
) -> StmtKind {
    StmtKind::ForCore {
        plan: IterPlan::StaticRange {
            start,
            stop,
            step,
            mode,
        },
        target: target_plan(target),
        body,
        orelse,
    }
}

/// Plan a generic loop over an iterable value
pub fn lower_for(
    target: &Expr,
    iter: Expr,
    dispatch_mode: DispatchMode,
    body: Vec<Stmt>,
    orelse: Vec<Stmt>,
) -> StmtKind {
    StmtKind::ForCore {
        plan: IterPlan::RuntimeIter {
            iter,
            dispatch_mode,
        },
        target: target_plan(target),
        body,
        orelse,
    }
}

/// Recursive binding plan for a loop target
pub fn target_plan(target: &Expr) -> TargetPlan {
    match &target.kind {
        ExprKind::Name { id } => TargetPlan::Name {
            id: id.clone(),
            ty: target.ty.clone(),
        },
        ExprKind::Tuple(elements) => TargetPlan::Tuple {
            elements: elements.iter().map(target_plan).collect(),
        },
        _ => TargetPlan::Expr {
            target: Box::new(target.clone()),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Type;

    fn name(id: &str, ty: Type) -> Expr {
        Expr::new(ExprKind::Name { id: id.into() }, ty, None)
    }

    #[test]
    fn test_name_target_plan() {
        let plan = target_plan(&name("i", Type::INT64));
        assert_eq!(
            plan,
            TargetPlan::Name {
                id: "i".into(),
                ty: Type::INT64
            }
        );
    }

    #[test]
    fn test_tuple_target_plan_recurses() {
        let target = Expr::new(
            ExprKind::Tuple(vec![name("k", Type::Str), name("v", Type::INT64)]),
            Type::Tuple(vec![Type::Str, Type::INT64]),
            None,
        );
        let TargetPlan::Tuple { elements } = target_plan(&target) else {
            panic!("expected tuple plan");
        };
        assert_eq!(elements.len(), 2);
        assert_eq!(
            elements[0],
            TargetPlan::Name {
                id: "k".into(),
                ty: Type::Str
            }
        );
    }

    #[test]
    fn test_other_targets_fall_back_to_expr_plan() {
        let target = Expr::new(
            ExprKind::Index {
                value: Box::new(name("xs", Type::list(Type::INT64))),
                index: Box::new(Expr::int_literal(0)),
            },
            Type::INT64,
            None,
        );
        assert!(matches!(target_plan(&target), TargetPlan::Expr { .. }));
    }

    #[test]
    fn test_static_range_plan_carries_mode() {
        let kind = lower_for_range(
            &name("i", Type::INT64),
            Expr::int_literal(0),
            Expr::int_literal(10),
            Expr::int_literal(2),
            RangeMode::Ascending,
            vec![],
            vec![],
        );
        let StmtKind::ForCore { plan, target, .. } = kind else {
            panic!("expected ForCore");
        };
        assert!(matches!(
            plan,
            IterPlan::StaticRange {
                mode: RangeMode::Ascending,
                ..
            }
        ));
        assert!(matches!(target, TargetPlan::Name { .. }));
    }

    #[test]
    fn test_runtime_plan_carries_dispatch_mode() {
        let kind = lower_for(
            &name("x", Type::Str),
            name("xs", Type::list(Type::Str)),
            DispatchMode::TypeId,
            vec![],
            vec![],
        );
        let StmtKind::ForCore { plan, .. } = kind else {
            panic!("expected ForCore");
        };
        assert!(matches!(
            plan,
            IterPlan::RuntimeIter {
                dispatch_mode: DispatchMode::TypeId,
                ..
            }
        ));
    }
}

//! Integration tests for the tyra middle-end
//!
//! Tests the full pipeline including:
//! - Type resolution (stage one)
//! - Boundary-explicit lowering (stage two)
//! - Error diagnostics
//! - Stage artifact serialization

use tyra::ast::{BinOp, Expr, FunctionDef, Module, Param, Stmt, StmtKind};
use tyra::ir::{
    self, DynOpKind, ExprKind, IterPlan, Literal, ParamUsage, RangeMode, Stage, TargetPlan,
};
use tyra::resolve::ExternSymbols;
use tyra::{compile_unit, lower_unit, resolve_unit, DispatchMode, ErrorKind, Type};

/// Helper to run stage one over a unit body
fn resolve(body: Vec<Stmt>) -> tyra::Result<ir::Module> {
    resolve_unit(&Module::new("test.src", body), &ExternSymbols::default())
}

/// Helper to run both stages with the default dispatch mode
fn compile(body: Vec<Stmt>) -> tyra::Result<ir::Module> {
    compile_unit(
        &Module::new("test.src", body),
        &ExternSymbols::default(),
        DispatchMode::Native,
    )
}

/// Helper returning the error kind a unit fails with
fn fails_with(body: Vec<Stmt>) -> ErrorKind {
    resolve(body).expect_err("expected resolution to fail").kind
}

/// First statement of a resolved body as an expression
fn first_expr(module: &ir::Module, index: usize) -> &ir::Expr {
    match &module.body[index].kind {
        ir::StmtKind::Expr(e) => e,
        other => panic!("expected expression statement, got {other:?}"),
    }
}

// ============================================
// Numeric unification and casts
// ============================================

#[test]
fn test_mixed_width_arithmetic_unifies_with_one_cast() {
    let module = resolve(vec![
        Stmt::ann_assign(Expr::name("a"), "int16", Some(Expr::int(1))),
        Stmt::ann_assign(Expr::name("b"), "int64", Some(Expr::int(2))),
        Stmt::expr(Expr::binary(BinOp::Add, Expr::name("a"), Expr::name("b"))),
    ])
    .unwrap();
    let sum = first_expr(&module, 2);
    assert_eq!(sum.ty, Type::INT64);
    assert_eq!(sum.casts.len(), 1);
    assert_eq!(sum.casts[0].to, Type::INT64);
}

#[test]
fn test_int_float_mix_promotes_to_float64() {
    let module = resolve(vec![Stmt::expr(Expr::binary(
        BinOp::Mul,
        Expr::int(2),
        Expr::float(1.5),
    ))])
    .unwrap();
    let product = first_expr(&module, 0);
    assert_eq!(product.ty, Type::Float64);
    assert_eq!(product.casts.len(), 1);
}

#[test]
fn test_division_is_floating_with_casts_per_int_operand() {
    let module = resolve(vec![Stmt::expr(Expr::binary(
        BinOp::Div,
        Expr::int(7),
        Expr::int(2),
    ))])
    .unwrap();
    let quotient = first_expr(&module, 0);
    assert_eq!(quotient.ty, Type::Float64);
    assert_eq!(quotient.casts.len(), 2);
}

#[test]
fn test_path_join_stays_path_without_casts() {
    let module = resolve(vec![
        Stmt::ann_assign(
            Expr::name("root"),
            "path",
            Some(Expr::call_name("Path", vec![Expr::str("/tmp")])),
        ),
        Stmt::expr(Expr::binary(
            BinOp::Div,
            Expr::name("root"),
            Expr::str("out.txt"),
        )),
    ])
    .unwrap();
    let joined = first_expr(&module, 1);
    assert_eq!(joined.ty, Type::Path);
    assert!(joined.casts.is_empty());
}

// ============================================
// Inference failures and conflicts
// ============================================

#[test]
fn test_empty_containers_fail_inference() {
    assert_eq!(
        fails_with(vec![Stmt::assign(Expr::name("xs"), Expr::list(vec![]))]),
        ErrorKind::InferenceFailure
    );
    assert_eq!(
        fails_with(vec![Stmt::assign(
            Expr::name("d"),
            Expr::new(tyra::ast::ExprKind::Dict { entries: vec![] }),
        )]),
        ErrorKind::InferenceFailure
    );
}

#[test]
fn test_zero_step_counting_loop_conflicts() {
    let kind = fails_with(vec![Stmt::for_loop(
        Expr::name("i"),
        Expr::call_name("range", vec![Expr::int(0), Expr::int(9), Expr::int(0)]),
        vec![],
    )]);
    assert_eq!(kind, ErrorKind::SemanticConflict);
}

#[test]
fn test_first_failure_aborts_resolution() {
    // second statement is also broken; only the first is reported
    let err = resolve(vec![
        Stmt::expr(Expr::name("ghost")),
        Stmt::assign(Expr::name("xs"), Expr::list(vec![])),
    ])
    .unwrap_err();
    assert_eq!(err.kind, ErrorKind::InferenceFailure);
    assert!(err.message.contains("ghost"));
}

// ============================================
// End-to-end scenarios
// ============================================

#[test]
fn test_scenario_compatible_list_rebinding() {
    let module = resolve(vec![
        Stmt::assign(
            Expr::name("x"),
            Expr::list(vec![Expr::int(1), Expr::int(2), Expr::int(3)]),
        ),
        Stmt::assign(Expr::name("x"), Expr::list(vec![Expr::int(4), Expr::int(5)])),
        Stmt::expr(Expr::name("x")),
    ])
    .unwrap();
    assert_eq!(first_expr(&module, 2).ty, Type::list(Type::INT64));
}

#[test]
fn test_scenario_string_over_int_conflicts() {
    let err = resolve(vec![
        Stmt::ann_assign(Expr::name("x"), "int64", Some(Expr::int(1))),
        Stmt::assign(Expr::name("x"), Expr::str("s")),
    ])
    .unwrap_err();
    assert_eq!(err.kind, ErrorKind::SemanticConflict);
    assert!(err.message.contains('x'));
}

#[test]
fn test_scenario_counting_loop_lowers_to_static_plan() {
    let module = compile(vec![Stmt::for_loop(
        Expr::name("i"),
        Expr::call_name("range", vec![Expr::int(0), Expr::int(10), Expr::int(2)]),
        vec![Stmt::expr(Expr::name("i"))],
    )])
    .unwrap();
    let ir::StmtKind::ForCore { plan, target, .. } = &module.body[0].kind else {
        panic!("expected ForCore, got {:?}", module.body[0].kind);
    };
    let IterPlan::StaticRange {
        start,
        stop,
        step,
        mode,
    } = plan
    else {
        panic!("expected static plan, got {plan:?}");
    };
    assert_eq!(start.kind, ExprKind::Literal(Literal::Int(0)));
    assert_eq!(stop.kind, ExprKind::Literal(Literal::Int(10)));
    assert_eq!(step.kind, ExprKind::Literal(Literal::Int(2)));
    assert_eq!(*mode, RangeMode::Ascending);
    assert_eq!(
        *target,
        TargetPlan::Name {
            id: "i".into(),
            ty: Type::INT64
        }
    );
}

#[test]
fn test_scenario_dynamic_loop_lowers_to_runtime_plan() {
    let body = vec![
        Stmt::ann_assign(Expr::name("xs"), "object", Some(Expr::list(vec![Expr::int(1)]))),
        Stmt::for_loop(
            Expr::name("v"),
            Expr::name("xs"),
            vec![Stmt::expr(Expr::call_name("print", vec![Expr::name("v")]))],
        ),
    ];
    let module = compile_unit(
        &Module::new("test.src", body),
        &ExternSymbols::default(),
        DispatchMode::TypeId,
    )
    .unwrap();
    let ir::StmtKind::ForCore { plan, .. } = &module.body[1].kind else {
        panic!("expected ForCore");
    };
    let IterPlan::RuntimeIter {
        iter,
        dispatch_mode,
    } = plan
    else {
        panic!("expected runtime plan, got {plan:?}");
    };
    assert_eq!(*dispatch_mode, DispatchMode::TypeId);
    assert_eq!(iter.ty, Type::Object);
    assert_eq!(module.dispatch_mode, DispatchMode::TypeId);
}

// ============================================
// Boundary lowering
// ============================================

#[test]
fn test_box_inserted_exactly_once() {
    let module = compile(vec![Stmt::ann_assign(
        Expr::name("x"),
        "object",
        Some(Expr::int(3)),
    )])
    .unwrap();
    let ir::StmtKind::AnnAssign { value, .. } = &module.body[0].kind else {
        panic!("expected AnnAssign");
    };
    let value = value.as_ref().unwrap();
    let ExprKind::Box { value: inner } = &value.kind else {
        panic!("expected Box, got {:?}", value.kind);
    };
    // the wrapped value is the plain literal, not another boundary node
    assert_eq!(inner.kind, ExprKind::Literal(Literal::Int(3)));
    assert_eq!(value.ty, Type::Object);
}

#[test]
fn test_unbox_inserted_exactly_once_with_raise_policy() {
    let module = compile(vec![
        Stmt::ann_assign(Expr::name("raw"), "object", Some(Expr::int(1))),
        Stmt::ann_assign(Expr::name("n"), "int64", Some(Expr::name("raw"))),
    ])
    .unwrap();
    let ir::StmtKind::AnnAssign { value, .. } = &module.body[1].kind else {
        panic!("expected AnnAssign");
    };
    let value = value.as_ref().unwrap();
    let ExprKind::Unbox {
        value: inner,
        target,
        on_fail,
    } = &value.kind
    else {
        panic!("expected Unbox, got {:?}", value.kind);
    };
    assert!(matches!(inner.kind, ExprKind::Name { .. }));
    assert_eq!(*target, Type::INT64);
    assert_eq!(*on_fail, ir::UnboxPolicy::Raise);
    assert_eq!(value.ty, Type::INT64);
}

#[test]
fn test_lowering_twice_is_identity() {
    let body = vec![
        Stmt::ann_assign(Expr::name("x"), "object", Some(Expr::int(3))),
        Stmt::new(StmtKind::While {
            test: Expr::name("x"),
            body: vec![Stmt::expr(Expr::call_name("len", vec![Expr::name("x")]))],
            orelse: vec![],
        }),
        Stmt::for_loop(
            Expr::name("i"),
            Expr::call_name("range", vec![Expr::int(3)]),
            vec![],
        ),
    ];
    let typed = resolve(body).unwrap();
    let once = lower_unit(typed, DispatchMode::Native);
    let twice = lower_unit(once.clone(), DispatchMode::Native);
    assert_eq!(once, twice);
    assert_eq!(once.stage, Stage::Lowered);
}

#[test]
fn test_boundary_builtins_over_dynamic_become_dyn_ops() {
    let module = compile(vec![
        Stmt::ann_assign(Expr::name("x"), "object", Some(Expr::int(1))),
        Stmt::expr(Expr::call_name("str", vec![Expr::name("x")])),
        Stmt::expr(Expr::call_name("len", vec![Expr::name("x")])),
        Stmt::expr(Expr::call_name("bool", vec![Expr::name("x")])),
    ])
    .unwrap();
    let expected = [
        (DynOpKind::Str, Type::Str),
        (DynOpKind::Len, Type::INT64),
        (DynOpKind::Truthy, Type::Bool),
    ];
    for (index, (op, ty)) in expected.into_iter().enumerate() {
        let e = first_expr(&module, index + 1);
        let ExprKind::DynOp { op: found, .. } = &e.kind else {
            panic!("expected DynOp, got {:?}", e.kind);
        };
        assert_eq!(*found, op);
        assert_eq!(e.ty, ty);
    }
}

#[test]
fn test_len_over_concrete_list_stays_a_call() {
    let module = compile(vec![
        Stmt::assign(Expr::name("xs"), Expr::list(vec![Expr::int(1)])),
        Stmt::expr(Expr::call_name("len", vec![Expr::name("xs")])),
    ])
    .unwrap();
    let e = first_expr(&module, 1);
    assert!(matches!(e.kind, ExprKind::Call { .. }));
    assert_eq!(e.ty, Type::INT64);
}

// ============================================
// Renames, main guard, borrow classification
// ============================================

#[test]
fn test_reserved_name_renamed_at_definition_and_reference() {
    let module = compile(vec![
        Stmt::new(StmtKind::FunctionDef(FunctionDef {
            name: "main".into(),
            params: vec![],
            returns: Some("int64".into()),
            body: vec![Stmt::new(StmtKind::Return(Some(Expr::int(0))))],
        })),
        Stmt::expr(Expr::call_name("main", vec![])),
    ])
    .unwrap();
    let ir::StmtKind::FunctionDef(def) = &module.body[0].kind else {
        panic!("expected FunctionDef");
    };
    assert_eq!(def.name, "__tyra_main");
    let ExprKind::Call { func, .. } = &first_expr(&module, 1).kind else {
        panic!("expected call");
    };
    assert_eq!(
        func.kind,
        ExprKind::Name {
            id: "__tyra_main".into()
        }
    );
    assert_eq!(module.renames["main"], "__tyra_main");
}

#[test]
fn test_main_guard_body_is_extracted() {
    let guard = Stmt::new(StmtKind::If {
        test: Expr::new(tyra::ast::ExprKind::Compare {
            left: Box::new(Expr::name("__name__")),
            ops: vec![tyra::ast::CmpOp::Eq],
            comparators: vec![Expr::str("__main__")],
        }),
        body: vec![Stmt::expr(Expr::call_name("print", vec![Expr::str("go")]))],
        orelse: vec![],
    });
    let module = compile(vec![guard]).unwrap();
    assert!(module.body.is_empty());
    assert_eq!(module.main_body.len(), 1);
}

#[test]
fn test_parameter_usage_flows_into_lowered_ir() {
    let module = compile(vec![Stmt::new(StmtKind::FunctionDef(FunctionDef {
        name: "push".into(),
        params: vec![
            Param::new("xs", "list[int64]"),
            Param::new("n", "int64"),
        ],
        returns: None,
        body: vec![Stmt::expr(Expr::call(
            Expr::attribute(Expr::name("xs"), "append"),
            vec![Expr::name("n")],
        ))],
    }))])
    .unwrap();
    let ir::StmtKind::FunctionDef(def) = &module.body[0].kind else {
        panic!("expected FunctionDef");
    };
    assert_eq!(def.params[0].usage, ParamUsage::Mutable);
    assert_eq!(def.params[1].usage, ParamUsage::ReadOnly);
}

// ============================================
// Stage artifact serialization
// ============================================

#[test]
fn test_lowered_module_round_trips_through_json() {
    let module = compile(vec![
        Stmt::ann_assign(Expr::name("x"), "object", Some(Expr::int(3))),
        Stmt::for_loop(
            Expr::name("i"),
            Expr::call_name("range", vec![Expr::int(4)]),
            vec![Stmt::expr(Expr::name("i"))],
        ),
    ])
    .unwrap();
    let json = module.to_json(true).unwrap();
    let back = ir::Module::from_json(&json).unwrap();
    assert_eq!(back, module);
}

#[test]
fn test_human_rendering_mentions_types() {
    let module = compile(vec![Stmt::assign(
        Expr::name("x"),
        Expr::list(vec![Expr::int(1), Expr::int(2)]),
    )])
    .unwrap();
    let rendered = ir::human::render_module(&module);
    assert!(rendered.contains("list[int64]"), "got: {rendered}");
}

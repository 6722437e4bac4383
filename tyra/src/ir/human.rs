//! Human-readable rendering of the typed IR.
//!
//! Debug view only: pseudo-source with type, borrow and cast
//! annotations in trailing comments. Not parseable, not stable.

use super::*;

/// Render a module as annotated pseudo-source
pub fn render_module(module: &Module) -> String {
    let mut out = String::new();
    out.push_str(&format!(
        "// unit {} (stage={:?}, dispatch={:?})\n",
        module.source_path, module.stage, module.dispatch_mode
    ));
    if !module.renames.is_empty() {
        out.push_str("// renames:\n");
        for (from, to) in &module.renames {
            out.push_str(&format!("//   {from} -> {to}\n"));
        }
    }
    for stmt in &module.body {
        render_stmt(stmt, 0, &mut out);
    }
    if !module.main_body.is_empty() {
        out.push_str("// entry body\n");
        for stmt in &module.main_body {
            render_stmt(stmt, 0, &mut out);
        }
    }
    out
}

fn pad(level: usize) -> String {
    "    ".repeat(level)
}

fn render_block(label: &str, body: &[Stmt], level: usize, out: &mut String) {
    if body.is_empty() {
        return;
    }
    out.push_str(&format!("{}{label} {{\n", pad(level)));
    for stmt in body {
        render_stmt(stmt, level + 1, out);
    }
    out.push_str(&format!("{}}}\n", pad(level)));
}

fn render_stmt(stmt: &Stmt, level: usize, out: &mut String) {
    let p = pad(level);
    match &stmt.kind {
        StmtKind::FunctionDef(def) => {
            let params = def
                .params
                .iter()
                .map(|param| {
                    let usage = match param.usage {
                        ParamUsage::ReadOnly => "readonly",
                        ParamUsage::Mutable => "mutable",
                    };
                    format!("{} {} /* {usage} */", param.ty, param.name)
                })
                .collect::<Vec<_>>()
                .join(", ");
            out.push_str(&format!(
                "{p}{} {}({params}) {{\n",
                def.return_type, def.name
            ));
            for s in &def.body {
                render_stmt(s, level + 1, out);
            }
            out.push_str(&format!("{p}}}\n"));
        }
        StmtKind::ClassDef { name, base, body, .. } => {
            match base {
                Some(b) => out.push_str(&format!("{p}class {name}: {b} {{\n")),
                None => out.push_str(&format!("{p}class {name} {{\n")),
            }
            for s in body {
                render_stmt(s, level + 1, out);
            }
            out.push_str(&format!("{p}}}\n"));
        }
        StmtKind::Return(value) => match value {
            Some(v) => out.push_str(&format!("{p}return {};\n", render_expr(v))),
            None => out.push_str(&format!("{p}return;\n")),
        },
        StmtKind::Assign { target, value } => {
            out.push_str(&format!("{p}{} = {};\n", render_expr(target), render_expr(value)));
        }
        StmtKind::AugAssign { target, op, value } => {
            out.push_str(&format!(
                "{p}{} {}= {};\n",
                render_expr(target),
                bin_op(*op),
                render_expr(value)
            ));
        }
        StmtKind::AnnAssign {
            target,
            annotation,
            value,
        } => match value {
            Some(v) => out.push_str(&format!(
                "{p}{annotation} {} = {};\n",
                render_expr(target),
                render_expr(v)
            )),
            None => out.push_str(&format!("{p}{annotation} {};\n", render_expr(target))),
        },
        StmtKind::Expr(value) => out.push_str(&format!("{p}{};\n", render_expr(value))),
        StmtKind::If { test, body, orelse } => {
            out.push_str(&format!("{p}if ({}) {{\n", render_expr(test)));
            for s in body {
                render_stmt(s, level + 1, out);
            }
            out.push_str(&format!("{p}}}\n"));
            render_block("else", orelse, level, out);
        }
        StmtKind::While { test, body, orelse } => {
            out.push_str(&format!("{p}while ({}) {{\n", render_expr(test)));
            for s in body {
                render_stmt(s, level + 1, out);
            }
            out.push_str(&format!("{p}}}\n"));
            render_block("while-else", orelse, level, out);
        }
        StmtKind::For {
            target,
            iter,
            body,
            orelse,
        } => {
            out.push_str(&format!(
                "{p}for ({} : {}) {{\n",
                render_expr(target),
                render_expr(iter)
            ));
            for s in body {
                render_stmt(s, level + 1, out);
            }
            out.push_str(&format!("{p}}}\n"));
            render_block("for-else", orelse, level, out);
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
            out.push_str(&format!(
                "{p}for ({} = {}; ..{}; +{}) /* {mode:?} */ {{\n",
                render_expr(target),
                render_expr(start),
                render_expr(stop),
                render_expr(step)
            ));
            for s in body {
                render_stmt(s, level + 1, out);
            }
            out.push_str(&format!("{p}}}\n"));
            render_block("for-else", orelse, level, out);
        }
        StmtKind::ForCore {
            plan,
            target,
            body,
            orelse,
        } => {
            let plan_txt = match plan {
                IterPlan::StaticRange {
                    start,
                    stop,
                    step,
                    mode,
                } => format!(
                    "static_range({}, {}, {}) /* {mode:?} */",
                    render_expr(start),
                    render_expr(stop),
                    render_expr(step)
                ),
                IterPlan::RuntimeIter {
                    iter,
                    dispatch_mode,
                } => format!("runtime_iter({}, {dispatch_mode:?})", render_expr(iter)),
            };
            out.push_str(&format!(
                "{p}for_core ({} : {plan_txt}) {{\n",
                render_target_plan(target)
            ));
            for s in body {
                render_stmt(s, level + 1, out);
            }
            out.push_str(&format!("{p}}}\n"));
            render_block("for-else", orelse, level, out);
        }
        StmtKind::Try {
            body,
            handlers,
            orelse,
            finalbody,
        } => {
            out.push_str(&format!("{p}try {{\n"));
            for s in body {
                render_stmt(s, level + 1, out);
            }
            out.push_str(&format!("{p}}}\n"));
            for handler in handlers {
                let ty = handler
                    .ty
                    .as_ref()
                    .map(render_expr)
                    .unwrap_or_else(|| "_".into());
                let name = handler.name.as_deref().unwrap_or("_");
                out.push_str(&format!("{p}catch ({ty} as {name}) {{\n"));
                for s in &handler.body {
                    render_stmt(s, level + 1, out);
                }
                out.push_str(&format!("{p}}}\n"));
            }
            render_block("try-else", orelse, level, out);
            render_block("finally", finalbody, level, out);
        }
        StmtKind::Raise(exc) => match exc {
            Some(e) => out.push_str(&format!("{p}raise {};\n", render_expr(e))),
            None => out.push_str(&format!("{p}raise;\n")),
        },
        StmtKind::Import { names } => {
            let list = names
                .iter()
                .map(|n| match &n.asname {
                    Some(a) => format!("{} as {a}", n.name),
                    None => n.name.clone(),
                })
                .collect::<Vec<_>>()
                .join(", ");
            out.push_str(&format!("{p}// import {list}\n"));
        }
        StmtKind::Pass => out.push_str(&format!("{p}// pass\n")),
        StmtKind::Break => out.push_str(&format!("{p}break;\n")),
        StmtKind::Continue => out.push_str(&format!("{p}continue;\n")),
    }
}

fn render_target_plan(plan: &TargetPlan) -> String {
    match plan {
        TargetPlan::Name { id, ty } => format!("{ty} {id}"),
        TargetPlan::Tuple { elements } => {
            let inner = elements
                .iter()
                .map(render_target_plan)
                .collect::<Vec<_>>()
                .join(", ");
            format!("({inner})")
        }
        TargetPlan::Expr { target } => render_expr(target),
    }
}

/// Render one expression with its annotation comment
pub fn render_expr(expr: &Expr) -> String {
    let mut note = format!("type={}", expr.ty);
    if expr.borrow != BorrowKind::Value {
        let borrow = match expr.borrow {
            BorrowKind::Value => "value",
            BorrowKind::ReadonlyRef => "readonly_ref",
            BorrowKind::MutableRef => "mutable_ref",
            BorrowKind::Move => "move",
        };
        note.push_str(&format!(", borrow={borrow}"));
    }
    if !expr.casts.is_empty() {
        let casts = expr
            .casts
            .iter()
            .map(|c| format!("{:?}:{}->{}", c.on, c.from, c.to))
            .collect::<Vec<_>>()
            .join(",");
        note.push_str(&format!(", casts={casts}"));
    }
    format!("{} /* {note} */", render_expr_bare(expr))
}

fn bin_op(op: BinOp) -> &'static str {
    match op {
        BinOp::Add => "+",
        BinOp::Sub => "-",
        BinOp::Mul => "*",
        BinOp::Div => "/",
        BinOp::FloorDiv => "//",
        BinOp::Mod => "%",
    }
}

fn cmp_op(op: CmpOp) -> &'static str {
    match op {
        CmpOp::Eq => "==",
        CmpOp::NotEq => "!=",
        CmpOp::Lt => "<",
        CmpOp::LtE => "<=",
        CmpOp::Gt => ">",
        CmpOp::GtE => ">=",
        CmpOp::In => "in",
        CmpOp::NotIn => "not in",
        CmpOp::Is => "is",
        CmpOp::IsNot => "is not",
    }
}

fn render_expr_bare(expr: &Expr) -> String {
    match &expr.kind {
        ExprKind::Name { id } => id.clone(),
        ExprKind::Literal(lit) => match lit {
            Literal::Bool(b) => b.to_string(),
            Literal::Int(n) => n.to_string(),
            Literal::Float(x) => format!("{x:?}"),
            Literal::Str(s) => format!("{s:?}"),
            Literal::None => "none".into(),
        },
        ExprKind::List(items) => format!("[{}]", join(items)),
        ExprKind::Set(items) => format!("{{{}}}", join(items)),
        ExprKind::Tuple(items) => format!("({})", join(items)),
        ExprKind::Dict { entries } => {
            let inner = entries
                .iter()
                .map(|e| format!("{}: {}", render_expr_bare(&e.key), render_expr_bare(&e.value)))
                .collect::<Vec<_>>()
                .join(", ");
            format!("{{{inner}}}")
        }
        ExprKind::Binary { op, left, right } => format!(
            "({} {} {})",
            render_expr_bare(left),
            bin_op(*op),
            render_expr_bare(right)
        ),
        ExprKind::Unary { op, operand } => {
            let sym = match op {
                UnaryOp::Not => "not ",
                UnaryOp::Neg => "-",
                UnaryOp::Pos => "+",
                UnaryOp::Invert => "~",
            };
            format!("{sym}{}", render_expr_bare(operand))
        }
        ExprKind::BoolCombine { op, values } => {
            let sym = match op {
                BoolOp::And => " and ",
                BoolOp::Or => " or ",
            };
            values
                .iter()
                .map(render_expr_bare)
                .collect::<Vec<_>>()
                .join(sym)
        }
        ExprKind::Compare {
            left,
            ops,
            comparators,
        } => {
            let mut text = render_expr_bare(left);
            for (op, c) in ops.iter().zip(comparators) {
                text.push_str(&format!(" {} {}", cmp_op(*op), render_expr_bare(c)));
            }
            text
        }
        ExprKind::Cond { test, then, orelse } => format!(
            "({} if {} else {})",
            render_expr_bare(then),
            render_expr_bare(test),
            render_expr_bare(orelse)
        ),
        ExprKind::Attribute { value, attr } => format!("{}.{attr}", render_expr_bare(value)),
        ExprKind::Index { value, index } => {
            format!("{}[{}]", render_expr_bare(value), render_expr_bare(index))
        }
        ExprKind::Slice {
            value,
            lower,
            upper,
            step,
        } => {
            let part = |e: &Option<Box<Expr>>| e.as_deref().map(render_expr_bare).unwrap_or_default();
            format!(
                "{}[{}:{}:{}]",
                render_expr_bare(value),
                part(lower),
                part(upper),
                part(step)
            )
        }
        ExprKind::Call { func, args, .. } => {
            format!("{}({})", render_expr_bare(func), join(args))
        }
        ExprKind::StrFormat { parts } => {
            let inner = parts
                .iter()
                .map(|part| match part {
                    FormatPart::Literal(s) => s.clone(),
                    FormatPart::Value(e) => format!("{{{}}}", render_expr_bare(e)),
                })
                .collect::<String>();
            format!("f{inner:?}")
        }
        ExprKind::ListComp {
            element,
            target,
            iter,
            conds,
        } => {
            let mut text = format!(
                "[{} for {target} in {}",
                render_expr_bare(element),
                render_expr_bare(iter)
            );
            for cond in conds {
                text.push_str(&format!(" if {}", render_expr_bare(cond)));
            }
            text.push(']');
            text
        }
        ExprKind::Box { value } => format!("box({})", render_expr_bare(value)),
        ExprKind::Unbox { value, target, .. } => {
            format!("unbox<{target}>({})", render_expr_bare(value))
        }
        ExprKind::DynOp { op, value } => {
            let name = match op {
                DynOpKind::Truthy => "obj_truthy",
                DynOpKind::Len => "obj_len",
                DynOpKind::Str => "obj_str",
                DynOpKind::IterInit => "obj_iter_init",
                DynOpKind::IterNext => "obj_iter_next",
            };
            format!("{name}({})", render_expr_bare(value))
        }
    }
}

fn join(items: &[Expr]) -> String {
    items
        .iter()
        .map(render_expr_bare)
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Type;

    #[test]
    fn test_render_expr_annotations() {
        let expr = Expr::new(
            ExprKind::Binary {
                op: BinOp::Add,
                left: Box::new(Expr::int_literal(1)),
                right: Box::new(Expr::int_literal(2)),
            },
            Type::INT64,
            None,
        );
        assert_eq!(render_expr(&expr), "(1 + 2) /* type=int64 */");
    }

    #[test]
    fn test_render_boundary_nodes() {
        let boxed = Expr::new(
            ExprKind::Box {
                value: Box::new(Expr::int_literal(3)),
            },
            Type::Object,
            None,
        );
        assert_eq!(render_expr(&boxed), "box(3) /* type=object */");

        let dyn_len = Expr::new(
            ExprKind::DynOp {
                op: DynOpKind::Len,
                value: Box::new(Expr::new(
                    ExprKind::Name { id: "x".into() },
                    Type::Object,
                    None,
                )),
            },
            Type::INT64,
            None,
        );
        assert_eq!(render_expr(&dyn_len), "obj_len(x) /* type=int64 */");
    }
}

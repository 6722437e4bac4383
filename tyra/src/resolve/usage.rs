//! Conservative parameter mutability classification.
//!
//! Runs over the untyped body before resolution. A parameter is marked
//! mutable when it (or an attribute/subscript rooted at it) is an
//! assignment target, when it receives a known mutating method call, or
//! when it is passed positionally to a callee not known to be
//! side-effect free. Everything else is read-only.

use std::collections::{HashMap, HashSet};

use crate::ast::{Expr, ExprKind, Index, Stmt, StmtKind};
use crate::ir::ParamUsage;

/// Container/string/path operations that mutate their receiver
const MUTATING_METHODS: &[&str] = &[
    "append",
    "extend",
    "insert",
    "pop",
    "clear",
    "remove",
    "discard",
    "add",
    "update",
    "sort",
    "reverse",
    "write",
    "write_text",
    "mkdir",
];

/// Callees that provably do not mutate their arguments
const PURE_CALLEES: &[&str] = &[
    "len", "print", "int", "float", "str", "bool", "range", "min", "max", "ord", "chr", "abs",
];

/// Classify every parameter of one function body
pub fn classify_params(params: &[String], body: &[Stmt]) -> HashMap<String, ParamUsage> {
    let mut scan = UsageScan {
        params: params.iter().cloned().collect(),
        mutable: HashSet::new(),
    };
    for stmt in body {
        scan.stmt(stmt);
    }
    params
        .iter()
        .map(|name| {
            let usage = if scan.mutable.contains(name) {
                ParamUsage::Mutable
            } else {
                ParamUsage::ReadOnly
            };
            (name.clone(), usage)
        })
        .collect()
}

struct UsageScan {
    params: HashSet<String>,
    mutable: HashSet<String>,
}

impl UsageScan {
    fn stmt(&mut self, stmt: &Stmt) {
        match &stmt.kind {
            StmtKind::Assign { targets, value } => {
                for target in targets {
                    self.mark_target(target);
                }
                self.expr(value);
            }
            StmtKind::AugAssign { target, value, .. } => {
                self.mark_target(target);
                self.expr(value);
            }
            StmtKind::AnnAssign { target, value, .. } => {
                self.mark_target(target);
                if let Some(value) = value {
                    self.expr(value);
                }
            }
            StmtKind::Expr(value) | StmtKind::Raise(Some(value)) => self.expr(value),
            StmtKind::Return(value) => {
                if let Some(value) = value {
                    self.expr(value);
                }
            }
            StmtKind::If { test, body, orelse } | StmtKind::While { test, body, orelse } => {
                self.expr(test);
                self.block(body);
                self.block(orelse);
            }
            StmtKind::For {
                target,
                iter,
                body,
                orelse,
            } => {
                self.mark_target(target);
                self.expr(iter);
                self.block(body);
                self.block(orelse);
            }
            StmtKind::Try {
                body,
                handlers,
                orelse,
                finalbody,
            } => {
                self.block(body);
                for handler in handlers {
                    self.block(&handler.body);
                }
                self.block(orelse);
                self.block(finalbody);
            }
            StmtKind::FunctionDef(def) => self.block(&def.body),
            StmtKind::ClassDef(def) => self.block(&def.body),
            StmtKind::Raise(None)
            | StmtKind::Import { .. }
            | StmtKind::Pass
            | StmtKind::Break
            | StmtKind::Continue => {}
        }
    }

    fn block(&mut self, body: &[Stmt]) {
        for stmt in body {
            self.stmt(stmt);
        }
    }

    /// Assignment through an attribute or subscript mutates the root
    fn mark_target(&mut self, target: &Expr) {
        match &target.kind {
            ExprKind::Name(id) => self.mark(id),
            ExprKind::Attribute { value, .. } | ExprKind::Subscript { value, .. } => {
                if let ExprKind::Name(id) = &value.kind {
                    self.mark(id);
                }
            }
            ExprKind::Tuple(elements) => {
                for element in elements {
                    self.mark_target(element);
                }
            }
            _ => {}
        }
    }

    fn mark(&mut self, name: &str) {
        if self.params.contains(name) {
            self.mutable.insert(name.to_string());
        }
    }

    fn expr(&mut self, expr: &Expr) {
        if let ExprKind::Call {
            func,
            args,
            keywords,
        } = &expr.kind
        {
            match &func.kind {
                ExprKind::Attribute { value, attr } => {
                    if let ExprKind::Name(owner) = &value.kind {
                        if self.params.contains(owner)
                            && MUTATING_METHODS.contains(&attr.as_str())
                        {
                            self.mutable.insert(owner.clone());
                        }
                    }
                }
                ExprKind::Name(callee) => {
                    // The callee's effect cannot be proven safe without
                    // whole-program analysis.
                    if !PURE_CALLEES.contains(&callee.as_str()) {
                        for arg in args {
                            if let ExprKind::Name(id) = &arg.kind {
                                self.mark(id);
                            }
                        }
                    }
                }
                _ => {}
            }
            self.expr(func);
            for arg in args {
                self.expr(arg);
            }
            for keyword in keywords {
                self.expr(&keyword.value);
            }
            return;
        }
        self.children(expr);
    }

    fn children(&mut self, expr: &Expr) {
        match &expr.kind {
            ExprKind::Name(_) | ExprKind::Literal(_) => {}
            ExprKind::List(items) | ExprKind::Set(items) | ExprKind::Tuple(items) => {
                for item in items {
                    self.expr(item);
                }
            }
            ExprKind::Dict { entries } => {
                for (key, value) in entries {
                    self.expr(key);
                    self.expr(value);
                }
            }
            ExprKind::Binary { left, right, .. } => {
                self.expr(left);
                self.expr(right);
            }
            ExprKind::Unary { operand, .. } => self.expr(operand),
            ExprKind::BoolCombine { values, .. } => {
                for value in values {
                    self.expr(value);
                }
            }
            ExprKind::Compare {
                left, comparators, ..
            } => {
                self.expr(left);
                for comparator in comparators {
                    self.expr(comparator);
                }
            }
            ExprKind::Cond { test, then, orelse } => {
                self.expr(test);
                self.expr(then);
                self.expr(orelse);
            }
            ExprKind::Attribute { value, .. } => self.expr(value),
            ExprKind::Subscript { value, index } => {
                self.expr(value);
                match &**index {
                    Index::Item(item) => self.expr(item),
                    Index::Slice { lower, upper, step } => {
                        for part in [lower, upper, step].into_iter().flatten() {
                            self.expr(part);
                        }
                    }
                }
            }
            ExprKind::Call { .. } => self.expr(expr),
            ExprKind::StrFormat { parts } => {
                for part in parts {
                    if let crate::ast::FormatPart::Value(value) = part {
                        self.expr(value);
                    }
                }
            }
            ExprKind::ListComp {
                element,
                iter,
                conds,
                ..
            } => {
                self.expr(element);
                self.expr(iter);
                for cond in conds {
                    self.expr(cond);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::BinOp;

    fn params(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_unused_param_is_readonly() {
        let usage = classify_params(&params(&["a"]), &[Stmt::expr(Expr::int(1))]);
        assert_eq!(usage["a"], ParamUsage::ReadOnly);
    }

    #[test]
    fn test_assignment_target_is_mutable() {
        let body = vec![Stmt::assign(Expr::name("a"), Expr::int(1))];
        let usage = classify_params(&params(&["a", "b"]), &body);
        assert_eq!(usage["a"], ParamUsage::Mutable);
        assert_eq!(usage["b"], ParamUsage::ReadOnly);
    }

    #[test]
    fn test_subscript_store_marks_root() {
        let body = vec![Stmt::assign(
            Expr::index(Expr::name("xs"), Expr::int(0)),
            Expr::int(5),
        )];
        let usage = classify_params(&params(&["xs"]), &body);
        assert_eq!(usage["xs"], ParamUsage::Mutable);
    }

    #[test]
    fn test_mutating_method_marks_receiver() {
        let body = vec![Stmt::expr(Expr::call(
            Expr::attribute(Expr::name("xs"), "append"),
            vec![Expr::int(1)],
        ))];
        let usage = classify_params(&params(&["xs"]), &body);
        assert_eq!(usage["xs"], ParamUsage::Mutable);
    }

    #[test]
    fn test_pure_method_keeps_readonly() {
        let body = vec![Stmt::expr(Expr::call(
            Expr::attribute(Expr::name("s"), "upper"),
            vec![],
        ))];
        let usage = classify_params(&params(&["s"]), &body);
        assert_eq!(usage["s"], ParamUsage::ReadOnly);
    }

    #[test]
    fn test_unknown_callee_marks_positional_args() {
        let body = vec![Stmt::expr(Expr::call_name(
            "helper",
            vec![Expr::name("a"), Expr::int(2)],
        ))];
        let usage = classify_params(&params(&["a"]), &body);
        assert_eq!(usage["a"], ParamUsage::Mutable);
    }

    #[test]
    fn test_pure_callee_keeps_readonly() {
        let body = vec![Stmt::expr(Expr::call_name("len", vec![Expr::name("a")]))];
        let usage = classify_params(&params(&["a"]), &body);
        assert_eq!(usage["a"], ParamUsage::ReadOnly);
    }

    #[test]
    fn test_aug_assign_in_nested_block() {
        let body = vec![Stmt::new(StmtKind::While {
            test: Expr::bool(true),
            body: vec![Stmt::new(StmtKind::AugAssign {
                target: Expr::name("total"),
                op: BinOp::Add,
                value: Expr::int(1),
            })],
            orelse: vec![],
        })];
        let usage = classify_params(&params(&["total"]), &body);
        assert_eq!(usage["total"], ParamUsage::Mutable);
    }
}

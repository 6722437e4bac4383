//! Scoped name-to-type environment

use std::collections::HashMap;

use crate::types::Type;

/// Outcome of a binding attempt in the innermost scope
#[derive(Debug, Clone, PartialEq)]
pub enum BindOutcome {
    /// First binding of this name in the innermost scope
    New,
    /// Compatible rebinding; the recorded type is unchanged
    Rebound,
    /// Incompatible rebinding; carries the previously recorded type
    Conflict(Type),
}

/// A stack of scopes. One scope per function body, per comprehension
/// and for the module top level.
#[derive(Debug, Default)]
pub struct TypeEnv {
    scopes: Vec<HashMap<String, Type>>,
}

impl TypeEnv {
    pub fn new() -> Self {
        Self { scopes: Vec::new() }
    }

    pub fn push_scope(&mut self) {
        self.scopes.push(HashMap::new());
    }

    /// Push a scope pre-populated with bindings (function parameters)
    pub fn push_scope_with(&mut self, bindings: impl IntoIterator<Item = (String, Type)>) {
        self.scopes.push(bindings.into_iter().collect());
    }

    pub fn pop_scope(&mut self) {
        self.scopes.pop();
    }

    /// Innermost-first lookup across the whole stack
    pub fn lookup(&self, name: &str) -> Option<&Type> {
        self.scopes.iter().rev().find_map(|scope| scope.get(name))
    }

    /// Bind `name` in the innermost scope. A compatible rebinding keeps
    /// the already-recorded type's identity; an incompatible one is
    /// reported, not applied.
    pub fn bind(&mut self, name: &str, ty: Type) -> BindOutcome {
        let Some(scope) = self.scopes.last_mut() else {
            return BindOutcome::New;
        };
        match scope.get(name) {
            Some(prev) if prev.compatible(&ty) => BindOutcome::Rebound,
            Some(prev) => BindOutcome::Conflict(prev.clone()),
            None => {
                scope.insert(name.to_string(), ty);
                BindOutcome::New
            }
        }
    }

    /// Replace a binding unconditionally, searching from the innermost
    /// scope outward. Used by augmented assignment retyping.
    pub fn rebind(&mut self, name: &str, ty: Type) {
        for scope in self.scopes.iter_mut().rev() {
            if let Some(slot) = scope.get_mut(name) {
                *slot = ty;
                return;
            }
        }
        if let Some(scope) = self.scopes.last_mut() {
            scope.insert(name.to_string(), ty);
        }
    }

    pub fn depth(&self) -> usize {
        self.scopes.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_walks_outward() {
        let mut env = TypeEnv::new();
        env.push_scope();
        env.bind("x", Type::Str);
        env.push_scope();
        env.bind("y", Type::Bool);
        assert_eq!(env.lookup("x"), Some(&Type::Str));
        assert_eq!(env.lookup("y"), Some(&Type::Bool));
        env.pop_scope();
        assert_eq!(env.lookup("y"), None);
    }

    #[test]
    fn test_compatible_rebind_keeps_identity() {
        let mut env = TypeEnv::new();
        env.push_scope();
        assert_eq!(env.bind("n", Type::INT64), BindOutcome::New);
        // numeric rebinding is compatible but does not retype
        assert_eq!(env.bind("n", Type::Float64), BindOutcome::Rebound);
        assert_eq!(env.lookup("n"), Some(&Type::INT64));
    }

    #[test]
    fn test_incompatible_rebind_conflicts() {
        let mut env = TypeEnv::new();
        env.push_scope();
        env.bind("s", Type::Str);
        assert_eq!(
            env.bind("s", Type::INT64),
            BindOutcome::Conflict(Type::Str)
        );
        assert_eq!(env.lookup("s"), Some(&Type::Str));
    }

    #[test]
    fn test_inner_scope_shadows_without_conflict() {
        let mut env = TypeEnv::new();
        env.push_scope();
        env.bind("x", Type::Str);
        env.push_scope();
        assert_eq!(env.bind("x", Type::INT64), BindOutcome::New);
        assert_eq!(env.lookup("x"), Some(&Type::INT64));
    }

    #[test]
    fn test_rebind_forces() {
        let mut env = TypeEnv::new();
        env.push_scope();
        env.bind("a", Type::INT64);
        env.rebind("a", Type::Float64);
        assert_eq!(env.lookup("a"), Some(&Type::Float64));
    }
}

//! Symbol rename precomputation.
//!
//! Built once per compilation unit, before resolution. Top-level
//! definitions that collide with each other or with a reserved
//! identifier get one canonical replacement spelling; every definition
//! and reference consults this map.

use std::collections::BTreeMap;

use crate::ast::{Module, StmtKind};

/// Identifiers the emitted unit may not define directly
const RESERVED: &[&str] = &["main", "__tyra_main"];

const RENAME_PREFIX: &str = "__tyra_";

/// Collision table for one compilation unit
#[derive(Debug, Default, Clone)]
pub struct RenameMap {
    map: BTreeMap<String, String>,
}

impl RenameMap {
    /// Scan all top-level function/class definition names
    pub fn precompute(module: &Module) -> Self {
        let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
        for stmt in &module.body {
            let name = match &stmt.kind {
                StmtKind::FunctionDef(def) => def.name.as_str(),
                StmtKind::ClassDef(def) => def.name.as_str(),
                _ => continue,
            };
            *counts.entry(name).or_insert(0) += 1;
        }
        let mut map = BTreeMap::new();
        for (name, count) in counts {
            if count > 1 || RESERVED.contains(&name) {
                map.insert(name.to_string(), format!("{RENAME_PREFIX}{name}"));
            }
        }
        Self { map }
    }

    /// Canonical spelling for `name`
    pub fn resolved<'a>(&'a self, name: &'a str) -> &'a str {
        self.map.get(name).map(String::as_str).unwrap_or(name)
    }

    pub fn as_map(&self) -> &BTreeMap<String, String> {
        &self.map
    }
}

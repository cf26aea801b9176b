// Copyright 2026 xbuild contributors (see CONTRIBUTORS.md).
// Licensed under the Apache License, Version 2.0 (see LICENSE).

//! Per-target option resolution: `merge_options` overlays, in priority
//! order, option defaults, global overrides, and target-specific overrides.

use std::collections::BTreeMap;

use crate::value::Value;

/// Mutable option definitions and global overrides, collected while a build
/// script loads.
#[derive(Default)]
pub struct OptionTable {
    defaults: BTreeMap<String, Value>,
    global_overrides: BTreeMap<String, Value>,
}

impl OptionTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn define(&mut self, name: impl Into<String>, default: impl Into<Value>) {
        self.defaults.insert(name.into(), default.into());
    }

    pub fn set_global(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        self.global_overrides.insert(name.into(), value.into());
    }

    pub fn freeze(self) -> ResolvedOptions {
        ResolvedOptions {
            defaults: self.defaults,
            global_overrides: self.global_overrides,
        }
    }
}

pub struct ResolvedOptions {
    defaults: BTreeMap<String, Value>,
    global_overrides: BTreeMap<String, Value>,
}

impl ResolvedOptions {
    /// Overlays defaults, then global overrides, then `target_overrides`
    /// (highest priority), returning the effective option map for one
    /// target.
    pub fn merge_options(&self, target_overrides: &BTreeMap<String, Value>) -> BTreeMap<String, Value> {
        let mut merged = self.defaults.clone();
        merged.extend(self.global_overrides.clone());
        merged.extend(target_overrides.clone());
        merged
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn target_override_wins() {
        let mut table = OptionTable::new();
        table.define("encoding", "ascii");
        table.set_global("encoding", "utf-8");
        let resolved = table.freeze();

        let mut target_overrides = BTreeMap::new();
        target_overrides.insert("encoding".to_string(), Value::from("latin-1"));

        let merged = resolved.merge_options(&target_overrides);
        assert_eq!(merged.get("encoding").unwrap().as_str(), "latin-1");
    }

    #[test]
    fn global_override_wins_over_default() {
        let mut table = OptionTable::new();
        table.define("encoding", "ascii");
        table.set_global("encoding", "utf-8");
        let resolved = table.freeze();

        let merged = resolved.merge_options(&BTreeMap::new());
        assert_eq!(merged.get("encoding").unwrap().as_str(), "utf-8");
    }
}

// Copyright 2026 xbuild contributors (see CONTRIBUTORS.md).
// Licensed under the Apache License, Version 2.0 (see LICENSE).

use std::collections::BTreeMap;
use std::path::Path;

use xbuild_errors::{BuildError, SourceLocation};
use xbuild_options::Value;

use crate::context::BuildContext;
use crate::pathset::PathSet;

/// The behavior a concrete target kind (write-file, copy, compile, ...)
/// contributes to the engine. Everything else about a target — its name,
/// declared dependencies, tags, priority — is metadata the engine owns
/// directly (see [`TargetSpec`]), not part of this trait.
pub trait Target: Send + Sync {
    /// Produces the target's output at its resolved path. May read
    /// `ctx.properties()`/`ctx.options_for(name)` and use
    /// `ctx.work_dir_for(name)` for scratch space.
    fn run(&self, ctx: &BuildContext, target_name: &str) -> Result<(), BuildError>;

    /// Removes this target's output and work directory. The default,
    /// inherited by most targets, is exactly that; targets with additional
    /// generated state may override it.
    fn clean(&self, ctx: &BuildContext, target_name: &str) -> Result<(), BuildError> {
        default_clean(ctx, target_name)
    }

    /// Extra fingerprint lines (beyond resolved dependency paths) whose
    /// change should force a rebuild: option values, manifest contents,
    /// compiler flags, and the like. Lines must not contain embedded
    /// newlines (callers escape CR/LF before appending).
    fn hashable_implicit_inputs(&self, _ctx: &BuildContext, _target_name: &str) -> Vec<String> {
        Vec::new()
    }

    /// Short name identifying this target kind, used as the `<TargetClass>`
    /// path segment under which per-target work directories and
    /// implicit-inputs files are grouped (§6). Defaults to the concrete
    /// type's unqualified name.
    fn type_name(&self) -> &'static str {
        let full = std::any::type_name::<Self>();
        match full.rsplit_once("::") {
            Some((_, last)) => last,
            None => full,
        }
    }
}

pub fn default_clean(ctx: &BuildContext, target_name: &str) -> Result<(), BuildError> {
    let registered = ctx.target(target_name)?;
    let path = Path::new(&registered.path);
    if path.is_dir() {
        std::fs::remove_dir_all(path).ok();
    } else {
        std::fs::remove_file(path).ok();
    }
    let work_dir = ctx.work_dir_for(target_name);
    std::fs::remove_dir_all(&work_dir).ok();
    let implicit_inputs_file = ctx.implicit_inputs_file_for(target_name);
    std::fs::remove_file(&implicit_inputs_file).ok();
    Ok(())
}

/// Construction-time declaration of a target: everything the dependency
/// resolver and scheduler need that isn't specific to one target kind.
pub struct TargetSpec {
    /// Canonical name, possibly containing unexpanded `${VAR}` placeholders.
    /// Ends with `/` iff this target denotes a directory.
    pub name: String,
    pub deps: PathSet,
    pub tags: Vec<String>,
    pub priority: u32,
    pub option_overrides: BTreeMap<String, Value>,
    pub location: Option<SourceLocation>,
    pub action: Box<dyn Target>,
}

impl TargetSpec {
    pub fn new(name: impl Into<String>, deps: PathSet, action: impl Target + 'static) -> Self {
        TargetSpec {
            name: name.into(),
            deps,
            tags: vec!["all".to_string()],
            priority: 0,
            option_overrides: BTreeMap::new(),
            location: None,
            action: Box::new(action),
        }
    }

    pub fn with_tags(mut self, tags: Vec<String>) -> Self {
        self.tags = tags;
        self
    }

    pub fn with_priority(mut self, priority: u32) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_location(mut self, location: SourceLocation) -> Self {
        self.location = Some(location);
        self
    }

    pub fn is_dir_path(&self) -> bool {
        xbuild_fs::is_dir_path(&self.name)
    }
}

// Copyright 2026 xbuild contributors (see CONTRIBUTORS.md).
// Licensed under the Apache License, Version 2.0 (see LICENSE).

//! The two-phase build context: a mutable [`InitializationContext`] that
//! collects properties, options, and target registrations while a build
//! script loads, frozen into an immutable [`BuildContext`] snapshot used for
//! the rest of the build.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use fnv::FnvHashMap;

use xbuild_errors::BuildError;
use xbuild_fs::dedup_key;
use xbuild_options::{OptionTable, PropertyTable, ResolvedOptions, ResolvedProperties, Value};

use crate::target::TargetSpec;

/// A target after its name has been property-expanded into an absolute
/// path, with its action retained for execution.
pub struct RegisteredTarget {
    pub spec: TargetSpec,
    pub path: String,
}

impl RegisteredTarget {
    pub fn name(&self) -> &str {
        &self.spec.name
    }

    pub fn is_dir_path(&self) -> bool {
        self.spec.is_dir_path()
    }
}

type PreBuildCheck = Box<dyn Fn(&BuildContext) -> Result<(), BuildError> + Send + Sync>;

#[derive(Default)]
pub struct InitializationContext {
    properties: PropertyTable,
    options: OptionTable,
    targets: Vec<TargetSpec>,
    output_dirs: Vec<String>,
    atomic_groups: Vec<Vec<String>>,
    pre_build_checks: Vec<PreBuildCheck>,
    root_dir: PathBuf,
}

impl InitializationContext {
    pub fn new(root_dir: PathBuf) -> Self {
        InitializationContext {
            properties: PropertyTable::new(),
            options: OptionTable::new(),
            targets: Vec::new(),
            output_dirs: Vec::new(),
            atomic_groups: Vec::new(),
            pre_build_checks: Vec::new(),
            root_dir,
        }
    }

    pub fn define_property(&mut self, name: impl Into<String>, default: impl Into<Value>) {
        self.properties.define(name, default);
    }

    pub fn override_property_from_cli(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.properties.override_from_cli(name, value);
    }

    pub fn enable_environment_overrides(&mut self, prefix: impl Into<String>) {
        self.properties.enable_environment_overrides(prefix);
    }

    pub fn define_option(&mut self, name: impl Into<String>, default: impl Into<Value>) {
        self.options.define(name, default);
    }

    pub fn set_global_option(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        self.options.set_global(name, value);
    }

    pub fn register_target(&mut self, spec: TargetSpec) {
        self.targets.push(spec);
    }

    pub fn register_output_dir(&mut self, abs_path: impl Into<String>) {
        self.output_dirs.push(abs_path.into());
    }

    /// Defines a property whose resolved value names a directory to create
    /// before the build starts, and registers that directory the same way
    /// `register_output_dir` does. `default` may itself reference other
    /// properties (e.g. `"${OUTPUT_DIR}/release"`); expansion happens once,
    /// at `freeze`, alongside every target path.
    pub fn define_output_dir_property(&mut self, name: impl Into<String>, default: impl Into<Value>) {
        let name = name.into();
        self.properties.define(name.clone(), default);
        self.output_dirs.push(format!("${{{name}}}"));
    }

    pub fn define_atomic_target_group(&mut self, members: Vec<String>) {
        self.atomic_groups.push(members);
    }

    /// Adds tags to an already-registered target, in addition to whatever
    /// it was given at construction. A no-op if `target_name` was never
    /// registered (the build script is free to call this speculatively).
    pub fn register_tags(&mut self, target_name: &str, tags: Vec<String>) {
        if let Some(spec) = self.targets.iter_mut().find(|t| t.name == target_name) {
            for tag in tags {
                if !spec.tags.contains(&tag) {
                    spec.tags.push(tag);
                }
            }
        }
    }

    /// Removes tags from an already-registered target, e.g. to exclude a
    /// slow target from the default "all" tag without untagging it entirely.
    pub fn remove_tags(&mut self, target_name: &str, tags: &[String]) {
        if let Some(spec) = self.targets.iter_mut().find(|t| t.name == target_name) {
            spec.tags.retain(|t| !tags.contains(t));
        }
    }

    /// Registers a functor to run once, against the frozen [`BuildContext`],
    /// before the scheduler dispatches any target. The functor should return
    /// an error to abort the build outright (e.g. a missing toolchain), not
    /// for anything target-specific.
    pub fn register_pre_build_check(&mut self, check: impl Fn(&BuildContext) -> Result<(), BuildError> + Send + Sync + 'static) {
        self.pre_build_checks.push(Box::new(check));
    }

    /// Expands every target's name into an absolute path and validates the
    /// static invariants that don't depend on the dependency graph:
    /// uniqueness (case-insensitive), no target writing directly into a
    /// declared output directory, and no target writing into a directory
    /// another target already owns wholesale.
    pub fn freeze(self) -> Result<BuildContext, BuildError> {
        let properties = self.properties.freeze(self.root_dir.clone());
        let options = self.options.freeze();

        let mut output_dirs = Vec::with_capacity(self.output_dirs.len());
        for dir in &self.output_dirs {
            output_dirs.push(properties.expand(dir)?);
        }

        let mut by_name: FnvHashMap<String, Arc<RegisteredTarget>> = FnvHashMap::default();
        let mut seen_paths: FnvHashMap<String, String> = FnvHashMap::default();
        let mut by_tag: FnvHashMap<String, Vec<String>> = FnvHashMap::default();
        let mut dir_owners: Vec<(String, String)> = Vec::new();
        let mut expanded: Vec<(TargetSpec, String)> = Vec::new();

        for spec in self.targets {
            let path = properties.expand(&spec.name)?;
            if xbuild_fs::is_dir_path(&spec.name) != xbuild_fs::is_dir_path(&path) {
                return Err(BuildError::user(format!(
                    "target \"{}\" resolved path \"{path}\" disagrees on directory-ness",
                    spec.name
                )));
            }
            let key = dedup_key(&path);
            if let Some(existing) = seen_paths.get(&key) {
                return Err(BuildError::user(format!(
                    "duplicate target path: \"{}\" and \"{}\" both resolve to \"{path}\"",
                    existing, spec.name
                )));
            }
            seen_paths.insert(key, spec.name.clone());

            for dir in &output_dirs {
                if &path == dir {
                    return Err(BuildError::user(format!(
                        "target \"{}\" must not write directly to declared output directory \"{dir}\"",
                        spec.name
                    )));
                }
            }

            if xbuild_fs::is_dir_path(&path) {
                dir_owners.push((spec.name.clone(), path.clone()));
            }
            expanded.push((spec, path));
        }

        // No target may write into a directory another target already owns
        // wholesale (a nested path is a sign the author forgot to declare a
        // target dependency on the owning directory target instead).
        for (owner_name, owner_dir) in &dir_owners {
            let owner_key = dedup_key(owner_dir);
            for (spec, path) in &expanded {
                if &spec.name == owner_name {
                    continue;
                }
                let key = dedup_key(path);
                if key.starts_with(&owner_key) && key != owner_key {
                    return Err(BuildError::user(format!(
                        "target \"{}\" writes inside directory \"{owner_dir}\" which target \"{owner_name}\" already owns wholesale",
                        spec.name
                    )));
                }
            }
        }

        for (spec, path) in expanded {
            for tag in &spec.tags {
                by_tag.entry(tag.clone()).or_default().push(spec.name.clone());
            }
            let name = spec.name.clone();
            by_name.insert(name, Arc::new(RegisteredTarget { spec, path }));
        }

        Ok(BuildContext {
            properties,
            options,
            targets: by_name,
            targets_by_tag: by_tag,
            output_dirs,
            atomic_groups: self.atomic_groups,
            pre_build_checks: self.pre_build_checks,
            root_dir: self.root_dir,
        })
    }
}

/// Immutable snapshot used by the dependency resolver, the up-to-date
/// evaluator, and every target's `run`/`clean`.
pub struct BuildContext {
    properties: ResolvedProperties,
    options: ResolvedOptions,
    targets: FnvHashMap<String, Arc<RegisteredTarget>>,
    targets_by_tag: FnvHashMap<String, Vec<String>>,
    output_dirs: Vec<String>,
    atomic_groups: Vec<Vec<String>>,
    pre_build_checks: Vec<PreBuildCheck>,
    root_dir: PathBuf,
}

impl BuildContext {
    pub fn properties(&self) -> &ResolvedProperties {
        &self.properties
    }

    pub fn root_dir(&self) -> &Path {
        &self.root_dir
    }

    pub fn target(&self, name: &str) -> Result<Arc<RegisteredTarget>, BuildError> {
        self.targets
            .get(name)
            .cloned()
            .ok_or_else(|| BuildError::dependency_resolution(format!("unknown target: {name}")))
    }

    pub fn all_target_names(&self) -> impl Iterator<Item = &str> {
        self.targets.keys().map(|s| s.as_str())
    }

    pub fn targets_with_tag(&self, tag: &str) -> Vec<Arc<RegisteredTarget>> {
        self.targets_by_tag
            .get(tag)
            .into_iter()
            .flatten()
            .filter_map(|name| self.targets.get(name).cloned())
            .collect()
    }

    pub fn is_target_path(&self, path: &str) -> Option<Arc<RegisteredTarget>> {
        let key = dedup_key(path);
        self.targets
            .values()
            .find(|t| dedup_key(&t.path) == key)
            .cloned()
    }

    pub fn output_dirs(&self) -> &[String] {
        &self.output_dirs
    }

    pub fn atomic_groups(&self) -> &[Vec<String>] {
        &self.atomic_groups
    }

    /// Runs every registered pre-build check in registration order, stopping
    /// at (and returning) the first failure.
    pub fn run_pre_build_checks(&self) -> Result<(), BuildError> {
        for check in &self.pre_build_checks {
            check(self)?;
        }
        Ok(())
    }

    /// Merges option defaults, global overrides, and target-specific
    /// overrides (highest priority wins), then property-expands every
    /// string-valued result at access time, per §4.3.
    pub fn options_for(&self, target_name: &str) -> Result<BTreeMap<String, Value>, BuildError> {
        let target = self.target(target_name)?;
        let merged = self.options.merge_options(&target.spec.option_overrides);
        merged
            .into_iter()
            .map(|(name, value)| {
                let expanded = match value {
                    Value::Str(s) => Value::Str(self.properties.expand(&s)?),
                    bool_value @ Value::Bool(_) => bool_value,
                };
                Ok((name, expanded))
            })
            .collect()
    }

    /// `${BUILD_WORK_DIR}/targets/<TargetClass>/<unique_id>/`, per §6.
    pub fn work_dir_for(&self, target_name: &str) -> PathBuf {
        let build_work_dir = self
            .properties
            .get("BUILD_WORK_DIR")
            .map(|v| v.as_str())
            .unwrap_or_else(|_| "BUILD_WORK".to_string());
        Path::new(&build_work_dir)
            .join("targets")
            .join(self.target_class(target_name))
            .join(sanitize_unique_id(target_name))
    }

    /// `${BUILD_WORK_DIR}/targets/<TargetClass>/implicit-inputs/<unique_id>.txt`,
    /// per §6.
    pub fn implicit_inputs_file_for(&self, target_name: &str) -> PathBuf {
        let build_work_dir = self
            .properties
            .get("BUILD_WORK_DIR")
            .map(|v| v.as_str())
            .unwrap_or_else(|_| "BUILD_WORK".to_string());
        Path::new(&build_work_dir)
            .join("targets")
            .join(self.target_class(target_name))
            .join("implicit-inputs")
            .join(format!("{}.txt", sanitize_unique_id(target_name)))
    }

    fn target_class(&self, target_name: &str) -> &'static str {
        self.targets
            .get(target_name)
            .map(|t| t.spec.action.type_name())
            .unwrap_or("unknown")
    }
}

/// Replaces filesystem-unsafe characters in a target name with `_` and
/// collapses slashes, producing the `unique_id` used for work directories
/// and implicit-inputs files.
pub fn sanitize_unique_id(target_name: &str) -> String {
    target_name
        .chars()
        .map(|c| if c.is_alphanumeric() || c == '.' || c == '-' { c } else { '_' })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pathset::PathSet;
    use crate::target::Target;

    struct Noop;
    impl Target for Noop {
        fn run(&self, _ctx: &BuildContext, _name: &str) -> Result<(), BuildError> {
            Ok(())
        }
    }

    #[test]
    fn option_values_are_property_expanded_at_access_time() {
        let mut init = InitializationContext::new(PathBuf::from("/root"));
        init.define_property("ENCODING", "utf-8");
        init.define_option("encoding", "${ENCODING}");
        init.register_target(TargetSpec::new("a.txt", PathSet::literal(".", vec![]), Noop));
        let ctx = init.freeze().unwrap();

        let options = ctx.options_for("a.txt").unwrap();
        assert_eq!(options.get("encoding").unwrap().as_str(), "utf-8");
    }

    #[test]
    fn target_specific_option_override_is_also_expanded() {
        let mut init = InitializationContext::new(PathBuf::from("/root"));
        init.define_property("NAME", "widget");
        init.define_option("label", "default");
        let spec = TargetSpec::new("a.txt", PathSet::literal(".", vec![]), Noop);
        let mut overrides = BTreeMap::new();
        overrides.insert("label".to_string(), Value::Str("${NAME}".to_string()));
        let spec = TargetSpec { option_overrides: overrides, ..spec };
        init.register_target(spec);
        let ctx = init.freeze().unwrap();

        let options = ctx.options_for("a.txt").unwrap();
        assert_eq!(options.get("label").unwrap().as_str(), "widget");
    }

    #[test]
    fn work_dir_and_implicit_inputs_file_are_namespaced_by_target_class() {
        let mut init = InitializationContext::new(PathBuf::from("/root"));
        init.define_property("BUILD_WORK_DIR", "/root/BUILD_WORK");
        init.register_target(TargetSpec::new("out/a.txt", PathSet::literal(".", vec![]), Noop));
        let ctx = init.freeze().unwrap();

        let work_dir = ctx.work_dir_for("out/a.txt");
        assert!(work_dir.to_string_lossy().contains("/Noop/"), "expected a Noop segment in {}", work_dir.display());
        let implicit_inputs = ctx.implicit_inputs_file_for("out/a.txt");
        assert!(implicit_inputs.to_string_lossy().contains("/Noop/implicit-inputs/"));
    }

    #[test]
    fn target_nested_inside_a_directory_target_is_rejected() {
        let mut init = InitializationContext::new(PathBuf::from("/root"));
        init.register_target(TargetSpec::new("out/generated/", PathSet::literal(".", vec![]), Noop));
        init.register_target(TargetSpec::new("out/generated/leftover.txt", PathSet::literal(".", vec![]), Noop));
        let err = init.freeze().unwrap_err();
        assert!(err.to_string().contains("owns wholesale"), "{err}");
    }

    #[test]
    fn sibling_targets_outside_any_directory_target_are_fine() {
        let mut init = InitializationContext::new(PathBuf::from("/root"));
        init.register_target(TargetSpec::new("out/a.txt", PathSet::literal(".", vec![]), Noop));
        init.register_target(TargetSpec::new("out/b.txt", PathSet::literal(".", vec![]), Noop));
        assert!(init.freeze().is_ok());
    }

    #[test]
    fn register_tags_and_remove_tags_adjust_an_already_registered_target() {
        let mut init = InitializationContext::new(PathBuf::from("/root"));
        init.register_target(TargetSpec::new("a.txt", PathSet::literal(".", vec![]), Noop).with_tags(vec!["all".to_string()]));
        init.register_tags("a.txt", vec!["slow".to_string()]);
        init.remove_tags("a.txt", &["all".to_string()]);
        let ctx = init.freeze().unwrap();

        assert_eq!(ctx.targets_with_tag("slow").len(), 1);
        assert!(ctx.targets_with_tag("all").is_empty());
    }

    #[test]
    fn define_output_dir_property_expands_and_registers_the_resolved_path() {
        let mut init = InitializationContext::new(PathBuf::from("/root"));
        init.define_property("OUTPUT_DIR", "/root/out");
        init.define_output_dir_property("RELEASE_DIR", "${OUTPUT_DIR}/release");
        init.register_target(TargetSpec::new("/root/out/release", PathSet::literal(".", vec![]), Noop));
        let err = init.freeze().unwrap_err();
        assert!(err.to_string().contains("declared output directory"), "{err}");
    }

    #[test]
    fn pre_build_check_failure_is_surfaced_to_the_caller() {
        let mut init = InitializationContext::new(PathBuf::from("/root"));
        init.register_pre_build_check(|_ctx| Err(BuildError::user("missing toolchain")));
        let ctx = init.freeze().unwrap();
        let err = ctx.run_pre_build_checks().unwrap_err();
        assert!(err.to_string().contains("missing toolchain"));
    }
}

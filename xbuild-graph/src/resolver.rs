// Copyright 2026 xbuild contributors (see CONTRIBUTORS.md).
// Licensed under the Apache License, Version 2.0 (see LICENSE).

//! The single-threaded dependency-resolution phase: walks the requested
//! target subset, resolves every [`PathSet`](crate::pathset::PathSet),
//! classifies each dependency as target or non-target, wires reverse links,
//! expands atomic groups, and computes effective priorities.

use std::collections::VecDeque;
use std::sync::Arc;

use fnv::{FnvHashMap, FnvHashSet};

use xbuild_errors::BuildError;
use xbuild_fs::dedup_key;

use crate::context::BuildContext;
use crate::wrapper::TargetWrapper;

/// The resolved dependency graph: one [`TargetWrapper`] per target reachable
/// from the requested set, keyed by target name.
pub struct ResolvedGraph {
    pub wrappers: FnvHashMap<String, Arc<TargetWrapper>>,
    pub requested: Vec<String>,
}

impl ResolvedGraph {
    pub fn wrapper(&self, name: &str) -> Option<Arc<TargetWrapper>> {
        self.wrappers.get(name).cloned()
    }

    /// Targets with no target dependencies: the scheduler's initial work
    /// list.
    pub fn leaves(&self) -> Vec<String> {
        self.wrappers
            .iter()
            .filter(|(_, w)| w.target_deps.is_empty())
            .map(|(name, _)| name.clone())
            .collect()
    }
}

/// Resolves `requested` (and everything they transitively depend on) against
/// `ctx`, logging `i/total` progress the way the single-threaded resolution
/// pool of the original does. Returns every validation failure found rather
/// than stopping at the first, since resolution errors are never partially
/// recoverable and a user fixing one wants to see the rest in the same pass.
pub fn resolve(ctx: &BuildContext, requested: &[String]) -> Result<ResolvedGraph, Vec<BuildError>> {
    let mut errors = Vec::new();
    let mut wrappers: FnvHashMap<String, Arc<TargetWrapper>> = FnvHashMap::default();
    let mut pending: VecDeque<String> = VecDeque::new();
    let mut seen: FnvHashSet<String> = FnvHashSet::default();

    for name in requested {
        if ctx.target(name).is_err() {
            errors.push(BuildError::dependency_resolution(format!(
                "requested target \"{name}\" is not registered"
            )));
            continue;
        }
        if seen.insert(name.clone()) {
            pending.push_back(name.clone());
        }
    }

    let total_estimate = ctx.all_target_names().count().max(1);
    let mut resolved_count = 0usize;

    while let Some(name) = pending.pop_front() {
        resolved_count += 1;
        log::debug!(
            target: "xbuild_graph::resolver",
            "resolving {resolved_count}/{total_estimate}: {name}"
        );

        let target = match ctx.target(&name) {
            Ok(t) => t,
            Err(e) => {
                errors.push(e);
                continue;
            }
        };

        let underlying = match target.spec.deps.resolve_underlying_dependencies(ctx) {
            Ok(deps) => deps,
            Err(e) => {
                errors.push(e);
                continue;
            }
        };

        let mut target_dep_names: FnvHashSet<String> = FnvHashSet::default();
        let mut non_target_deps = Vec::new();
        for dep in underlying {
            match ctx.is_target_path(&dep.path) {
                Some(dep_target) => {
                    target_dep_names.insert(dep_target.name().to_string());
                }
                None => non_target_deps.push(dep),
            }
        }

        expand_atomic_groups(ctx, &mut target_dep_names, &mut errors);
        target_dep_names.remove(&name);

        for dep_name in &target_dep_names {
            if seen.insert(dep_name.clone()) {
                pending.push_back(dep_name.clone());
            }
        }

        let mut target_deps: Vec<String> = target_dep_names.into_iter().collect();
        target_deps.sort();
        non_target_deps.sort_by(|a, b| a.path.cmp(&b.path));
        non_target_deps.dedup_by(|a, b| a.path == b.path);

        let wrapper = TargetWrapper::new(
            name.clone(),
            target.path.clone(),
            target.is_dir_path(),
            target_deps,
            non_target_deps,
        );
        wrappers.insert(name, Arc::new(wrapper));
    }

    if !errors.is_empty() {
        return Err(errors);
    }

    wire_rdeps(&wrappers);
    if let Err(e) = validate_non_target_deps(ctx, &wrappers) {
        errors.extend(e);
    }
    propagate_priorities(ctx, &wrappers, &mut errors);

    if !errors.is_empty() {
        return Err(errors);
    }

    Ok(ResolvedGraph {
        wrappers,
        requested: requested.to_vec(),
    })
}

/// For every target dep that belongs to an atomic group, adds every other
/// member of that group as an additional target dep, so that the group is
/// indivisible from the perspective of whichever target depends on any one
/// member.
fn expand_atomic_groups(
    ctx: &BuildContext,
    target_dep_names: &mut FnvHashSet<String>,
    errors: &mut Vec<BuildError>,
) {
    let mut additions = Vec::new();
    for group in ctx.atomic_groups() {
        if group.iter().any(|m| target_dep_names.contains(m)) {
            for member in group {
                if ctx.target(member).is_err() {
                    errors.push(BuildError::dependency_resolution(format!(
                        "atomic group references unknown target \"{member}\""
                    )));
                    continue;
                }
                additions.push(member.clone());
            }
        }
    }
    target_dep_names.extend(additions);
}

fn wire_rdeps(wrappers: &FnvHashMap<String, Arc<TargetWrapper>>) {
    let edges: Vec<(String, String)> = wrappers
        .values()
        .flat_map(|w| w.target_deps.iter().map(move |d| (d.clone(), w.name.clone())))
        .collect();
    for (dep_name, dependent_name) in edges {
        if let Some(dep) = wrappers.get(&dep_name) {
            dep.rdeps.lock().push(dependent_name);
        }
    }
}

/// Non-target dependency validation (§4.4): each must exist, its filesystem
/// type must agree with the `IS_DIR_PATH` flag, and it must not live inside
/// a declared top-level output directory (a sign the author forgot to model
/// a target dependency).
fn validate_non_target_deps(
    ctx: &BuildContext,
    wrappers: &FnvHashMap<String, Arc<TargetWrapper>>,
) -> Result<(), Vec<BuildError>> {
    let mut errors = Vec::new();
    for wrapper in wrappers.values() {
        for dep in &wrapper.non_target_deps {
            if dep.skip_existence_check {
                continue;
            }
            let path = std::path::Path::new(&dep.path);
            match xbuild_fs::stat_cached(path) {
                xbuild_fs::StatEntry::Missing => {
                    errors.push(BuildError::dependency_resolution(format!(
                        "{}: non-target dependency does not exist: {}",
                        wrapper.name, dep.path
                    )));
                    continue;
                }
                entry => {
                    let is_dir = matches!(entry, xbuild_fs::StatEntry::Dir { .. });
                    if is_dir != dep.is_dir {
                        errors.push(BuildError::dependency_resolution(format!(
                            "{}: dependency \"{}\" is a {} but was declared as a {}",
                            wrapper.name,
                            dep.path,
                            if is_dir { "directory" } else { "file" },
                            if dep.is_dir { "directory" } else { "file" },
                        )));
                    }
                }
            }
            for output_dir in ctx.output_dirs() {
                if dedup_key(&dep.path).starts_with(&dedup_key(output_dir)) {
                    errors.push(BuildError::dependency_resolution(format!(
                        "{}: non-target dependency \"{}\" lives inside declared output directory \"{output_dir}\" — model it as a target dependency instead",
                        wrapper.name, dep.path
                    )));
                }
            }
        }
    }
    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

/// Raises each target's `effective_priority` to the max of its own declared
/// priority and that of anything depending on it (transitively). Implemented
/// as a Bellman-Ford-style relaxation: since a raise only re-queues a node
/// when its value strictly increased, and priorities are bounded above, this
/// terminates even if the graph (incorrectly) contains a cycle.
fn propagate_priorities(
    ctx: &BuildContext,
    wrappers: &FnvHashMap<String, Arc<TargetWrapper>>,
    errors: &mut Vec<BuildError>,
) {
    let mut queue: VecDeque<String> = VecDeque::new();
    for (name, wrapper) in wrappers {
        let priority = match ctx.target(name) {
            Ok(t) => t.spec.priority,
            Err(e) => {
                errors.push(e);
                continue;
            }
        };
        if wrapper.raise_effective_priority(priority) {
            queue.push_back(name.clone());
        }
    }

    while let Some(name) = queue.pop_front() {
        let Some(wrapper) = wrappers.get(&name) else { continue };
        let priority = wrapper.effective_priority();
        for dep_name in &wrapper.target_deps {
            if let Some(dep) = wrappers.get(dep_name) {
                if dep.raise_effective_priority(priority) {
                    queue.push_back(dep_name.clone());
                }
            }
        }
    }
}

/// Locates a concrete cycle via DFS over reverse-dependency edges. Called by
/// the scheduler only when the execution pool drains with targets still
/// outstanding and no other error was recorded — the one situation the
/// resolution phase's forward walk can't itself detect, since it only
/// follows dependencies that already resolved.
pub fn find_cycle(wrappers: &FnvHashMap<String, Arc<TargetWrapper>>) -> Option<Vec<String>> {
    #[derive(Clone, Copy, PartialEq)]
    enum Mark {
        InProgress,
        Done,
    }

    let mut marks: FnvHashMap<String, Mark> = FnvHashMap::default();
    let mut stack: Vec<String> = Vec::new();

    fn visit(
        name: &str,
        wrappers: &FnvHashMap<String, Arc<TargetWrapper>>,
        marks: &mut FnvHashMap<String, Mark>,
        stack: &mut Vec<String>,
    ) -> Option<Vec<String>> {
        match marks.get(name) {
            Some(Mark::Done) => return None,
            Some(Mark::InProgress) => {
                let start = stack.iter().position(|n| n == name).unwrap_or(0);
                let mut cycle = stack[start..].to_vec();
                cycle.push(name.to_string());
                return Some(cycle);
            }
            None => {}
        }
        marks.insert(name.to_string(), Mark::InProgress);
        stack.push(name.to_string());
        if let Some(wrapper) = wrappers.get(name) {
            for dep_name in wrapper.target_deps.iter() {
                if let Some(cycle) = visit(dep_name, wrappers, marks, stack) {
                    return Some(cycle);
                }
            }
        }
        stack.pop();
        marks.insert(name.to_string(), Mark::Done);
        None
    }

    for name in wrappers.keys() {
        if let Some(cycle) = visit(name, wrappers, &mut marks, &mut stack) {
            return Some(cycle);
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::InitializationContext;
    use crate::pathset::PathSet;
    use crate::target::{Target, TargetSpec};
    use std::path::PathBuf;

    struct Noop;
    impl Target for Noop {
        fn run(&self, _ctx: &BuildContext, _name: &str) -> Result<(), BuildError> {
            Ok(())
        }
    }

    fn ctx_with_targets(targets: Vec<TargetSpec>) -> BuildContext {
        let mut init = InitializationContext::new(PathBuf::from("/root"));
        for t in targets {
            init.register_target(t);
        }
        init.freeze().unwrap()
    }

    #[test]
    fn resolves_linear_chain() {
        let a = TargetSpec::new("a.txt", PathSet::literal(".", vec![]), Noop);
        let b = TargetSpec::new(
            "b.txt",
            PathSet::targets_with_tag("all", false),
            Noop,
        );
        let ctx = ctx_with_targets(vec![a, b]);
        let graph = resolve(&ctx, &["b.txt".to_string()]).unwrap();
        assert!(graph.wrappers.contains_key("a.txt"));
        assert!(graph.wrappers.contains_key("b.txt"));
        let b_wrapper = graph.wrapper("b.txt").unwrap();
        assert_eq!(b_wrapper.target_deps, vec!["a.txt".to_string()]);
    }

    #[test]
    fn detects_cycle() {
        let mut wrappers: FnvHashMap<String, Arc<TargetWrapper>> = FnvHashMap::default();
        wrappers.insert(
            "a".to_string(),
            Arc::new(TargetWrapper::new("a".into(), "/a".into(), false, vec!["b".into()], vec![])),
        );
        wrappers.insert(
            "b".to_string(),
            Arc::new(TargetWrapper::new("b".into(), "/b".into(), false, vec!["a".into()], vec![])),
        );
        let cycle = find_cycle(&wrappers);
        assert!(cycle.is_some());
        let cycle = cycle.unwrap();
        assert!(cycle.contains(&"a".to_string()));
        assert!(cycle.contains(&"b".to_string()));
    }

    #[test]
    fn atomic_group_pulls_in_mates() {
        let x = TargetSpec::new("x.txt", PathSet::literal(".", vec![]), Noop);
        let y = TargetSpec::new("y.txt", PathSet::literal(".", vec![]), Noop);
        let z = TargetSpec::new("z.txt", PathSet::dir_based(".", vec!["x.txt".to_string()]), Noop);
        let mut init = InitializationContext::new(PathBuf::from("/root"));
        init.register_target(x);
        init.register_target(y);
        init.register_target(z);
        init.define_atomic_target_group(vec!["x.txt".to_string(), "y.txt".to_string()]);
        let ctx = init.freeze().unwrap();

        let graph = resolve(&ctx, &["z.txt".to_string()]).unwrap();
        let z_wrapper = graph.wrapper("z.txt").unwrap();
        assert!(z_wrapper.target_deps.contains(&"x.txt".to_string()));
        assert!(z_wrapper.target_deps.contains(&"y.txt".to_string()));
    }

    #[test]
    fn priority_propagates_to_deps() {
        let a = TargetSpec::new("a.txt", PathSet::literal(".", vec![]), Noop);
        let b = TargetSpec::new("b.txt", PathSet::dir_based(".", vec!["a.txt".to_string()]), Noop)
            .with_priority(5);
        let ctx = ctx_with_targets(vec![a, b]);
        let graph = resolve(&ctx, &["b.txt".to_string()]).unwrap();
        assert_eq!(graph.wrapper("a.txt").unwrap().effective_priority(), 5);
        assert_eq!(graph.wrapper("b.txt").unwrap().effective_priority(), 5);
    }
}

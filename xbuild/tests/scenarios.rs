// Copyright 2026 xbuild contributors (see CONTRIBUTORS.md).
// Licensed under the Apache License, Version 2.0 (see LICENSE).

//! End-to-end scenarios S1-S6: a clean build, an incremental no-op, a
//! property-driven rebuild, cycle detection, an atomic group, and
//! keep-going. Driven directly against the library crates rather than the
//! compiled binary, the way the teacher's own crates test end-to-end
//! behavior without spawning a subprocess.

use xbuild_errors::BuildError;
use xbuild_graph::{resolve, BuildContext, InitializationContext, PathSet, Target, TargetSpec};
use xbuild_scheduler::{run, run_resolved, BuildOptions};
use xbuild_targets::WriteFile;

fn init_at(dir: &std::path::Path) -> InitializationContext {
    InitializationContext::new(dir.to_path_buf())
}

fn hello_path(dir: &std::path::Path) -> String {
    dir.join("buildoutput").join("hello.txt").to_string_lossy().into_owned()
}

/// S1 - clean build, single target.
#[test]
fn s1_clean_build_single_target() {
    let dir = tempfile::tempdir().unwrap();
    let mut init = init_at(dir.path());
    init.register_target(TargetSpec::new(hello_path(dir.path()), PathSet::literal(".", vec![]), WriteFile::new("hi")));
    let ctx = init.freeze().unwrap();

    let report = run(&ctx, &[hello_path(dir.path())], &BuildOptions::default()).unwrap();
    assert!(report.success());
    assert_eq!(report.built, vec![hello_path(dir.path())]);
    assert_eq!(std::fs::read_to_string(hello_path(dir.path())).unwrap(), "hi");

    let implicit_inputs_file = ctx.implicit_inputs_file_for(&hello_path(dir.path()));
    let contents = std::fs::read_to_string(&implicit_inputs_file).unwrap();
    assert_eq!(contents.lines().collect::<Vec<_>>(), vec!["hi"]);
}

/// S2 - incremental no-op: a second run of S1 against the same workspace
/// performs no writes and reports the target as up-to-date.
#[test]
fn s2_incremental_no_op() {
    let dir = tempfile::tempdir().unwrap();
    let mut init = init_at(dir.path());
    init.register_target(TargetSpec::new(hello_path(dir.path()), PathSet::literal(".", vec![]), WriteFile::new("hi")));
    let ctx = init.freeze().unwrap();

    let first = run(&ctx, &[hello_path(dir.path())], &BuildOptions::default()).unwrap();
    assert!(first.success());
    let mtime_after_first = std::fs::metadata(hello_path(dir.path())).unwrap().modified().unwrap();

    let second = run(&ctx, &[hello_path(dir.path())], &BuildOptions::default()).unwrap();
    assert!(second.success());
    assert!(second.built.is_empty());
    assert_eq!(second.up_to_date, vec![hello_path(dir.path())]);
    let mtime_after_second = std::fs::metadata(hello_path(dir.path())).unwrap().modified().unwrap();
    assert_eq!(mtime_after_first, mtime_after_second);
}

/// S3 - a property change forces a rebuild even though nothing else about
/// the target declaration changed.
#[test]
fn s3_property_change_forces_rebuild() {
    let dir = tempfile::tempdir().unwrap();
    let mut init = init_at(dir.path());
    init.define_property("GREETING", "hi");
    init.register_target(TargetSpec::new(hello_path(dir.path()), PathSet::literal(".", vec![]), WriteFile::new("${GREETING}")));
    let ctx = init.freeze().unwrap();
    let first = run(&ctx, &[hello_path(dir.path())], &BuildOptions::default()).unwrap();
    assert!(first.success());
    assert_eq!(std::fs::read_to_string(hello_path(dir.path())).unwrap(), "hi");
    let implicit_inputs_before = std::fs::read_to_string(ctx.implicit_inputs_file_for(&hello_path(dir.path()))).unwrap();

    let mut init2 = init_at(dir.path());
    init2.override_property_from_cli("GREETING", "bye");
    init2.register_target(TargetSpec::new(hello_path(dir.path()), PathSet::literal(".", vec![]), WriteFile::new("${GREETING}")));
    let ctx2 = init2.freeze().unwrap();
    let second = run(&ctx2, &[hello_path(dir.path())], &BuildOptions::default()).unwrap();
    assert!(second.success());
    assert_eq!(second.built, vec![hello_path(dir.path())]);
    assert_eq!(std::fs::read_to_string(hello_path(dir.path())).unwrap(), "bye");
    let implicit_inputs_after = std::fs::read_to_string(ctx2.implicit_inputs_file_for(&hello_path(dir.path()))).unwrap();
    assert_ne!(implicit_inputs_before, implicit_inputs_after);
}

/// S4 - two targets each declaring the other as a dependency are rejected
/// during resolution, before any target runs, and both names are named in
/// the error.
#[test]
fn s4_cycle_detection() {
    let dir = tempfile::tempdir().unwrap();
    let a = dir.path().join("a.txt").to_string_lossy().into_owned();
    let b = dir.path().join("b.txt").to_string_lossy().into_owned();

    let mut init = init_at(dir.path());
    init.register_target(TargetSpec::new(a.clone(), PathSet::literal(".", vec![b.clone()]), WriteFile::new("a")));
    init.register_target(TargetSpec::new(b.clone(), PathSet::literal(".", vec![a.clone()]), WriteFile::new("b")));
    let ctx = init.freeze().unwrap();

    // Resolution itself succeeds (a cycle is a structurally valid, if
    // unschedulable, graph); the scheduler discovers that nothing can ever
    // become ready and reports the cycle instead.
    let report = run(&ctx, &[a.clone()], &BuildOptions::default()).unwrap();
    assert!(!report.success());
    assert!(report.built.is_empty());
    assert!(report.up_to_date.is_empty());
    assert_eq!(report.errors.len(), 1);
    let message = report.errors[0].to_string();
    assert!(message.contains(&a), "expected cycle error to name {a}, got: {message}");
    assert!(message.contains(&b), "expected cycle error to name {b}, got: {message}");
    assert!(!std::path::Path::new(&a).exists());
}

/// A target that always fails, used to exercise S5 and S6.
struct AlwaysFails;
impl Target for AlwaysFails {
    fn run(&self, _ctx: &BuildContext, _target_name: &str) -> Result<(), BuildError> {
        Err(BuildError::user("deliberate failure"))
    }
}

/// S5 - atomic group: Z depends only on X, but X and Y are declared as an
/// atomic group, so Y is scheduled alongside X even though Z never lists it.
#[test]
fn s5_atomic_group_pulls_in_its_members() {
    let dir = tempfile::tempdir().unwrap();
    let x = dir.path().join("x.txt").to_string_lossy().into_owned();
    let y = dir.path().join("y.txt").to_string_lossy().into_owned();
    let z = dir.path().join("z.txt").to_string_lossy().into_owned();

    let mut init = init_at(dir.path());
    init.register_target(TargetSpec::new(x.clone(), PathSet::literal(".", vec![]), WriteFile::new("x")));
    init.register_target(TargetSpec::new(y.clone(), PathSet::literal(".", vec![]), WriteFile::new("y")));
    init.register_target(TargetSpec::new(z.clone(), PathSet::literal(".", vec![x.clone()]), WriteFile::new("z")));
    init.define_atomic_target_group(vec![x.clone(), y.clone()]);
    let ctx = init.freeze().unwrap();

    let graph = resolve(&ctx, &[z.clone()]).unwrap();
    assert!(graph.wrappers.contains_key(&y), "atomic-group mate Y should be pulled into the graph even though Z never depends on it");

    let report = run_resolved(&ctx, &graph, &BuildOptions::default());
    assert!(report.success());
    assert!(report.built.contains(&y));
}

/// S6 - keep-going: an independent, unrelated failure does not stop an
/// otherwise-successful target from being attempted, and the error list
/// names exactly the failing target.
#[test]
fn s6_keep_going_runs_independent_targets_despite_a_failure() {
    let dir = tempfile::tempdir().unwrap();
    let a = dir.path().join("a.txt").to_string_lossy().into_owned();
    let b = dir.path().join("b.txt").to_string_lossy().into_owned();

    let mut init = init_at(dir.path());
    init.register_target(TargetSpec::new(a.clone(), PathSet::literal(".", vec![]), AlwaysFails));
    init.register_target(TargetSpec::new(b.clone(), PathSet::literal(".", vec![]), WriteFile::new("b")));
    let ctx = init.freeze().unwrap();

    let options = BuildOptions { keep_going: true, ..BuildOptions::default() };
    let report = run(&ctx, &[a.clone(), b.clone()], &options).unwrap();

    assert!(!report.success());
    assert_eq!(report.built, vec![b.clone()]);
    assert_eq!(report.errors.len(), 1);
    assert!(matches!(&report.errors[0], BuildError::TargetExecution { target, .. } if target == &a));
}

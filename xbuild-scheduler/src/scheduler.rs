// Copyright 2026 xbuild contributors (see CONTRIBUTORS.md).
// Licensed under the Apache License, Version 2.0 (see LICENSE).

//! The priority-aware parallel scheduler (§4.6): dispatches targets whose
//! outstanding-dependency counter has reached zero to a fixed worker pool,
//! in clean/build/dry-run modes, accumulating errors with keep-going
//! semantics.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use fnv::FnvHashSet;

use xbuild_errors::BuildError;
use xbuild_fs::{stat_uncached, StatEntry};
use xbuild_graph::{default_clean, resolve, BuildContext, ResolvedGraph};

use crate::options::BuildOptions;
use crate::queue::WorkQueue;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    Clean,
    Build,
    DryRun,
}

/// The outcome of a scheduler run: which targets landed in which bucket,
/// plus every error recorded along the way.
#[derive(Debug, Default)]
pub struct BuildReport {
    pub built: Vec<String>,
    pub up_to_date: Vec<String>,
    pub cleaned: Vec<String>,
    pub skipped: Vec<String>,
    pub errors: Vec<BuildError>,
}

impl BuildReport {
    pub fn success(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Resolves `requested` against `ctx` and then runs the scheduler over the
/// resulting graph in the mode implied by `options` (clean takes priority
/// over dry-run, which takes priority over a normal build).
pub fn run(ctx: &BuildContext, requested: &[String], options: &BuildOptions) -> Result<BuildReport, Vec<BuildError>> {
    if let Err(e) = ctx.run_pre_build_checks() {
        return Err(vec![e]);
    }
    let graph = resolve(ctx, requested)?;
    Ok(run_resolved(ctx, &graph, options))
}

pub fn run_resolved(ctx: &BuildContext, graph: &ResolvedGraph, options: &BuildOptions) -> BuildReport {
    let mode = if options.clean {
        Mode::Clean
    } else if options.dry_run {
        Mode::DryRun
    } else {
        Mode::Build
    };

    let total = graph.wrappers.len();
    let queue = WorkQueue::new(options.randomize_priorities);
    let report = Mutex::new(BuildReport::default());
    let aborted = AtomicBool::new(false);
    let completed_count = AtomicUsize::new(0);

    match mode {
        Mode::Clean => {
            // Clean has no dependency ordering requirement: every target is
            // independently removable. Seed the whole graph at once.
            for name in graph.wrappers.keys() {
                queue.push(name.clone(), 0);
            }
        }
        Mode::Build | Mode::DryRun => {
            for name in graph.leaves() {
                let priority = graph.wrapper(&name).map(|w| w.effective_priority()).unwrap_or(0);
                queue.push(name, priority);
            }
        }
    }

    std::thread::scope(|scope| {
        for _ in 0..options.worker_count() {
            scope.spawn(|| {
                while let Some(name) = queue.pop() {
                    if options.cancel.load(Ordering::SeqCst) {
                        aborted.store(true, Ordering::SeqCst);
                        queue.close();
                        queue.finish();
                        continue;
                    }
                    process_one(ctx, graph, &name, &queue, options, mode, &report, &aborted, &completed_count);
                    queue.finish();
                }
            });
        }
    });

    if options.cancel.load(Ordering::SeqCst) {
        crate::process_monitor::process_monitor().kill_all();
    }

    let mut report = report.into_inner().unwrap();

    if mode != Mode::Clean {
        let completed = completed_count.load(Ordering::SeqCst);
        if completed < total {
            if report.errors.is_empty() && options.cancel.load(Ordering::SeqCst) {
                report.errors.push(BuildError::user("build cancelled"));
            } else if report.errors.is_empty() {
                let cycle = xbuild_graph::find_cycle(&graph.wrappers)
                    .unwrap_or_default()
                    .join(" -> ");
                report.errors.push(BuildError::dependency_resolution(format!(
                    "dependency cycle detected: {cycle}"
                )));
            }
            let handled: FnvHashSet<&str> = report
                .built
                .iter()
                .chain(report.up_to_date.iter())
                .map(|s| s.as_str())
                .collect();
            let failed: FnvHashSet<&str> = report
                .errors
                .iter()
                .filter_map(|e| e.target())
                .collect();
            for name in graph.wrappers.keys() {
                if !handled.contains(name.as_str()) && !failed.contains(name.as_str()) {
                    report.skipped.push(name.clone());
                }
            }
        }
    }

    report
}

#[allow(clippy::too_many_arguments)]
fn process_one(
    ctx: &BuildContext,
    graph: &ResolvedGraph,
    name: &str,
    queue: &WorkQueue,
    options: &BuildOptions,
    mode: Mode,
    report: &Mutex<BuildReport>,
    aborted: &AtomicBool,
    completed_count: &AtomicUsize,
) {
    match mode {
        Mode::Clean => {
            let target = match ctx.target(name) {
                Ok(t) => t,
                Err(e) => {
                    report.lock().unwrap().errors.push(e);
                    completed_count.fetch_add(1, Ordering::SeqCst);
                    return;
                }
            };
            if let Err(e) = target.spec.action.clean(ctx, name) {
                report.lock().unwrap().errors.push(BuildError::Clean {
                    target: name.to_string(),
                    cause: e.to_string(),
                });
            } else {
                report.lock().unwrap().cleaned.push(name.to_string());
            }
            completed_count.fetch_add(1, Ordering::SeqCst);
        }
        Mode::Build | Mode::DryRun => {
            let Some(wrapper) = graph.wrapper(name) else {
                return;
            };
            let target = match ctx.target(name) {
                Ok(t) => t,
                Err(e) => {
                    report.lock().unwrap().errors.push(e);
                    completed_count.fetch_add(1, Ordering::SeqCst);
                    return;
                }
            };
            let fingerprint = || target.spec.action.hashable_implicit_inputs(ctx, name);

            let already_fresh = wrapper.up_to_date(ctx, &|n| graph.wrapper(n), options.ignore_deps, fingerprint);
            if already_fresh {
                log::info!("{name}: target is already up-to-date");
                report.lock().unwrap().up_to_date.push(name.to_string());
                completed_count.fetch_add(1, Ordering::SeqCst);
                let allowed = options.keep_going || !aborted.load(Ordering::SeqCst);
                enqueue_ready_rdeps(graph, queue, name, allowed, false);
                return;
            }

            default_clean(ctx, name).ok();

            let start = SystemTime::now();
            let run_result = if mode == Mode::DryRun {
                Ok(())
            } else {
                target.spec.action.run(ctx, name)
            };

            match run_result {
                Ok(()) => {
                    if wrapper.has_implicit_inputs(ctx, fingerprint) {
                        let lines = wrapper.implicit_inputs(ctx, fingerprint);
                        let path = ctx.implicit_inputs_file_for(name);
                        if let Some(parent) = path.parent() {
                            std::fs::create_dir_all(parent).ok();
                        }
                        let mut contents = lines.join("\n");
                        if !lines.is_empty() {
                            contents.push('\n');
                        }
                        if let Err(e) = std::fs::write(&path, contents) {
                            report.lock().unwrap().errors.push(BuildError::TargetExecution {
                                target: name.to_string(),
                                cause: format!("failed to write implicit-inputs file: {e}"),
                            });
                        }
                    }

                    if options.verify {
                        verify_dependencies(ctx, &wrapper, start, &mut report.lock().unwrap());
                    }

                    log::info!("{name}: built");
                    report.lock().unwrap().built.push(name.to_string());
                    completed_count.fetch_add(1, Ordering::SeqCst);
                    let allowed = options.keep_going || !aborted.load(Ordering::SeqCst);
                    enqueue_ready_rdeps(graph, queue, name, allowed, true);
                }
                Err(e) => {
                    let stamp = wrapper.stamp_path(ctx);
                    std::fs::remove_file(&stamp).ok();
                    report.lock().unwrap().errors.push(BuildError::TargetExecution {
                        target: name.to_string(),
                        cause: e.to_string(),
                    });
                    completed_count.fetch_add(1, Ordering::SeqCst);
                    if !options.keep_going {
                        aborted.store(true, Ordering::SeqCst);
                    }
                    // Dependents of a failed target are never enqueued.
                }
            }
        }
    }
}

/// Decrements the outstanding-dep counter of every rdep of `name`, enqueuing
/// those that reach zero — unless `allowed` is false, meaning the build has
/// aborted (no `keep_going`) and no further new work should be dispatched.
/// `mark_dirty` additionally forces each rdep to rebuild even if its own
/// up-to-date check would otherwise pass, matching §4.6's cascading-rebuild
/// requirement for targets that were actually rebuilt (not merely found
/// fresh).
fn enqueue_ready_rdeps(graph: &ResolvedGraph, queue: &WorkQueue, name: &str, allowed: bool, mark_dirty: bool) {
    let Some(wrapper) = graph.wrapper(name) else { return };
    let rdeps = wrapper.rdeps.lock().clone();
    for rdep_name in rdeps {
        let Some(rdep) = graph.wrapper(&rdep_name) else { continue };
        if mark_dirty {
            rdep.mark_dirty();
        }
        let remaining = rdep.decrement();
        if remaining == 0 && allowed && !queue.is_closed() {
            queue.push(rdep_name, rdep.effective_priority());
        }
    }
}

fn verify_dependencies(
    ctx: &BuildContext,
    wrapper: &xbuild_graph::TargetWrapper,
    start: SystemTime,
    report: &mut BuildReport,
) {
    let start_ceil = ceil_to_second(start);

    for dep_name in &wrapper.target_deps {
        let Ok(dep) = ctx.target(dep_name) else { continue };
        match stat_uncached(std::path::Path::new(&dep.path)) {
            StatEntry::Missing => {
                report.errors.push(BuildError::Verification {
                    target: wrapper.name.clone(),
                    message: format!("dependency \"{dep_name}\" was deleted mid-build"),
                });
            }
            StatEntry::File { mtime } if mtime > start_ceil => {
                report.errors.push(BuildError::Verification {
                    target: wrapper.name.clone(),
                    message: format!("dependency \"{dep_name}\" was modified after this target started"),
                });
            }
            _ => {}
        }
    }

    for dep in &wrapper.non_target_deps {
        match stat_uncached(std::path::Path::new(&dep.path)) {
            StatEntry::Missing => {
                report.errors.push(BuildError::Verification {
                    target: wrapper.name.clone(),
                    message: format!("dependency \"{}\" was deleted mid-build", dep.path),
                });
            }
            StatEntry::File { mtime } if !dep.is_dir && mtime > start_ceil => {
                report.errors.push(BuildError::Verification {
                    target: wrapper.name.clone(),
                    message: format!("dependency \"{}\" was modified after this target started", dep.path),
                });
            }
            _ => {}
        }
    }
}

fn ceil_to_second(t: SystemTime) -> SystemTime {
    let dur = t.duration_since(UNIX_EPOCH).unwrap_or_default();
    let secs = dur.as_secs() + u64::from(dur.subsec_nanos() > 0);
    UNIX_EPOCH + Duration::from_secs(secs)
}

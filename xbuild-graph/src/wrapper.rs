// Copyright 2026 xbuild contributors (see CONTRIBUTORS.md).
// Licensed under the Apache License, Version 2.0 (see LICENSE).

//! Per-target internal state: resolved dependencies, reverse dependencies,
//! the outstanding-dependency counter the scheduler drains, and the
//! up-to-date evaluator.

use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use std::time::SystemTime;

use parking_lot::Mutex;

use xbuild_fs::{stat_uncached, StatEntry};

use crate::context::BuildContext;
use crate::pathset::UnderlyingDep;

struct MutableState {
    outstanding_dep_count: usize,
    dirty: bool,
    effective_priority: u32,
}

/// The engine's internal view of one target: everything the resolver,
/// up-to-date evaluator, and scheduler need beyond what the target itself
/// declares.
pub struct TargetWrapper {
    pub name: String,
    pub path: String,
    pub is_dir_path: bool,
    pub target_deps: Vec<String>,
    pub non_target_deps: Vec<UnderlyingDep>,
    pub rdeps: Mutex<Vec<String>>,
    state: Mutex<MutableState>,
    implicit_inputs: OnceLock<Vec<String>>,
}

impl TargetWrapper {
    pub fn new(
        name: String,
        path: String,
        is_dir_path: bool,
        target_deps: Vec<String>,
        non_target_deps: Vec<UnderlyingDep>,
    ) -> Self {
        let outstanding = target_deps.len();
        TargetWrapper {
            name,
            path,
            is_dir_path,
            target_deps,
            non_target_deps,
            rdeps: Mutex::new(Vec::new()),
            state: Mutex::new(MutableState {
                outstanding_dep_count: outstanding,
                dirty: false,
                effective_priority: 0,
            }),
            implicit_inputs: OnceLock::new(),
        }
    }

    pub fn outstanding_dep_count(&self) -> usize {
        self.state.lock().outstanding_dep_count
    }

    pub fn effective_priority(&self) -> u32 {
        self.state.lock().effective_priority
    }

    pub fn raise_effective_priority(&self, priority: u32) -> bool {
        let mut state = self.state.lock();
        if priority > state.effective_priority {
            state.effective_priority = priority;
            true
        } else {
            false
        }
    }

    /// Decrements the outstanding-dependency counter, returning the new
    /// value. The caller enqueues this target once it reaches zero.
    pub fn decrement(&self) -> usize {
        let mut state = self.state.lock();
        state.outstanding_dep_count = state.outstanding_dep_count.saturating_sub(1);
        state.outstanding_dep_count
    }

    pub fn mark_dirty(&self) {
        self.state.lock().dirty = true;
    }

    /// Returns the dirty flag's value *before* this call, matching the
    /// legacy contract: a caller racing with a concurrent `mark_dirty` sees
    /// the value as of just before it took the lock, not a freshly-applied
    /// one.
    pub fn dirty(&self) -> bool {
        self.state.lock().dirty
    }

    /// Whether this target has anything worth writing an implicit-inputs
    /// file for: a directory output (whose stamp *is* the implicit-inputs
    /// file), or any dependency/fingerprint line the combined manifest would
    /// contain. Must be called with the *real* fingerprint closure — the
    /// result feeds the single `implicit_inputs` cache, so a throwaway
    /// closure here would poison later calls with an empty fingerprint.
    pub fn has_implicit_inputs(&self, ctx: &BuildContext, fingerprint_lines: impl FnOnce() -> Vec<String>) -> bool {
        self.is_dir_path || !self.implicit_inputs(ctx, fingerprint_lines).is_empty()
    }

    /// Computes (once, cached) the implicit-inputs vector: sorted target-dep
    /// paths, then sorted non-target-dep paths, then the target's own
    /// fingerprint lines. Each line has embedded CR/LF escaped so a diff of
    /// the on-disk manifest stays one-line-per-entry.
    pub fn implicit_inputs(
        &self,
        ctx: &BuildContext,
        fingerprint_lines: impl FnOnce() -> Vec<String>,
    ) -> &[String] {
        self.implicit_inputs.get_or_init(|| {
            let mut lines = Vec::new();
            for dep_name in &self.target_deps {
                if let Ok(dep) = ctx.target(dep_name) {
                    lines.push(escape_line(&dep.path));
                }
            }
            for dep in &self.non_target_deps {
                lines.push(escape_line(&dep.path));
            }
            for line in fingerprint_lines() {
                lines.push(escape_line(&line));
            }
            lines
        })
    }

    pub fn stamp_path(&self, ctx: &BuildContext) -> PathBuf {
        if self.is_dir_path {
            ctx.implicit_inputs_file_for(&self.name)
        } else {
            PathBuf::from(&self.path)
        }
    }

    /// The full ordered up-to-date check of §4.5: dirty flag, existence,
    /// `ignore_deps` short-circuit, implicit-inputs manifest comparison,
    /// and dependency mtimes. Returns `false` (and logs a reason) on the
    /// first failing check.
    pub fn up_to_date(
        &self,
        ctx: &BuildContext,
        wrappers: &dyn Fn(&str) -> Option<std::sync::Arc<TargetWrapper>>,
        ignore_deps: bool,
        fingerprint_lines: impl FnOnce() -> Vec<String>,
    ) -> bool {
        if self.dirty() {
            log::debug!(target: "xbuild_graph::uptodate", "{}: dirty", self.name);
            return false;
        }

        let own_stat = stat_uncached(Path::new(&self.path));
        if !own_stat.exists() {
            log::debug!(target: "xbuild_graph::uptodate", "{}: output does not exist", self.name);
            return false;
        }

        if ignore_deps {
            return true;
        }

        let expected = self.implicit_inputs(ctx, fingerprint_lines);
        if !expected.is_empty() || self.is_dir_path {
            let implicit_inputs_file = ctx.implicit_inputs_file_for(&self.name);
            match std::fs::read_to_string(&implicit_inputs_file) {
                Ok(contents) => {
                    let actual: Vec<&str> = contents.lines().collect();
                    if actual != expected.iter().map(|s| s.as_str()).collect::<Vec<_>>() {
                        log::debug!(
                            target: "xbuild_graph::uptodate",
                            "{}: implicit inputs changed",
                            self.name
                        );
                        return false;
                    }
                }
                Err(_) => {
                    log::debug!(
                        target: "xbuild_graph::uptodate",
                        "{}: implicit inputs file missing",
                        self.name
                    );
                    return false;
                }
            }
        }

        let stamp_path = self.stamp_path(ctx);
        let stamp_mtime = match stat_uncached(&stamp_path) {
            StatEntry::File { mtime } | StatEntry::Dir { mtime } => mtime,
            StatEntry::Missing => {
                log::debug!(target: "xbuild_graph::uptodate", "{}: stamp missing", self.name);
                return false;
            }
        };

        for dep_name in &self.target_deps {
            let Some(dep) = wrappers(dep_name) else { continue };
            let dep_stamp = dep.stamp_path(ctx);
            if let StatEntry::File { mtime } | StatEntry::Dir { mtime } = stat_uncached(&dep_stamp) {
                if newer(mtime, stamp_mtime, &format!("dependency {dep_name}"), &self.name) {
                    return false;
                }
            }
        }

        for dep in &self.non_target_deps {
            if dep.is_dir {
                continue;
            }
            if let StatEntry::File { mtime } = stat_uncached(Path::new(&dep.path)) {
                if newer(mtime, stamp_mtime, &dep.path, &self.name) {
                    return false;
                }
            }
        }

        true
    }
}

fn newer(candidate: SystemTime, baseline: SystemTime, what: &str, target: &str) -> bool {
    if candidate <= baseline {
        return false;
    }
    if let Ok(gap) = candidate.duration_since(baseline) {
        if gap.as_secs() < 1 {
            log::warn!(
                "{target}: {what} is only {}ms newer than the target's stamp; possible clock/filesystem resolution hazard",
                gap.as_millis()
            );
        }
    }
    log::debug!(target: "xbuild_graph::uptodate", "{target}: {what} is newer than stamp");
    true
}

fn escape_line(s: &str) -> String {
    s.replace('\r', "\\r").replace('\n', "\\n")
}

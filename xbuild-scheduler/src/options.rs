// Copyright 2026 xbuild contributors (see CONTRIBUTORS.md).
// Licensed under the Apache License, Version 2.0 (see LICENSE).

//! The driver-facing options mapping of §6: every knob the CLI (or any other
//! embedder) can set on a build.

use std::path::PathBuf;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

#[derive(Debug, Clone)]
pub struct BuildOptions {
    pub clean: bool,
    pub dry_run: bool,
    pub ignore_deps: bool,
    pub keep_going: bool,
    pub verify: bool,
    pub workers: usize,
    pub randomize_priorities: bool,
    pub dep_graph_file: Option<PathBuf>,
    pub profile: bool,
    pub log_cpu_utilisation: bool,
    /// Cooperative cancellation flag, checked between target dispatches.
    /// Nothing in this crate sets it on its own initiative; an embedder
    /// (e.g. a Ctrl-C handler installed by the driver) flips it to request
    /// an orderly stop: no new targets are dispatched, but ones already
    /// running are left to finish.
    pub cancel: Arc<AtomicBool>,
}

impl Default for BuildOptions {
    fn default() -> Self {
        BuildOptions {
            clean: false,
            dry_run: false,
            ignore_deps: false,
            keep_going: false,
            verify: false,
            workers: std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1),
            randomize_priorities: false,
            dep_graph_file: None,
            profile: false,
            log_cpu_utilisation: false,
            cancel: Arc::new(AtomicBool::new(false)),
        }
    }
}

impl BuildOptions {
    /// `workers` is clamped to at least 1: a zero-worker pool could never
    /// drain the queue and would hang forever.
    pub fn worker_count(&self) -> usize {
        self.workers.max(1)
    }
}

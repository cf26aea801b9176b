// Copyright 2026 xbuild contributors (see CONTRIBUTORS.md).
// Licensed under the Apache License, Version 2.0 (see LICENSE).

//! A process-wide registry of subprocesses spawned by running targets, so a
//! cancelled or aborted build can kill every child still alive instead of
//! leaving it orphaned. Grounded in `original_source/utils/process.py`'s
//! `__ProcessMonitor`: a global `add`/`remove`/`killall` set guarded by a
//! single lock, consulted by the scheduler during teardown.

use std::process::Child;
use std::sync::Mutex;

#[derive(Default)]
pub struct ProcessMonitor {
    children: Mutex<Vec<Child>>,
}

impl ProcessMonitor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a freshly spawned child so it can be killed on teardown.
    pub fn register(&self, child: Child) {
        self.children.lock().unwrap().push(child);
    }

    /// Kills every still-registered child, logging (not failing) on any
    /// individual kill error, and clears the registry.
    pub fn kill_all(&self) {
        let mut children = self.children.lock().unwrap();
        if children.is_empty() {
            return;
        }
        log::info!("cleaning up {} remaining child process(es)", children.len());
        for mut child in children.drain(..) {
            if let Err(e) = child.kill() {
                log::warn!("failed to kill child process {}: {e}", child.id());
            }
        }
    }
}

static PROCESS_MONITOR: Mutex<Option<&'static ProcessMonitor>> = Mutex::new(None);

/// The process-wide monitor instance targets should register spawned
/// children with. Lazily leaked on first use, matching the teacher's
/// module-level `_processCleanupMonitor` singleton.
pub fn process_monitor() -> &'static ProcessMonitor {
    let mut guard = PROCESS_MONITOR.lock().unwrap();
    *guard.get_or_insert_with(|| Box::leak(Box::new(ProcessMonitor::new())))
}

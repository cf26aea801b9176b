// Copyright 2026 xbuild contributors (see CONTRIBUTORS.md).
// Licensed under the Apache License, Version 2.0 (see LICENSE).

//! The execution side of the engine: a blocking priority [`queue`], the
//! [`scheduler`] that drives targets through it, and the diagnostic
//! [`artifacts`] written alongside a build.

pub mod artifacts;
mod options;
pub mod process_monitor;
mod queue;
mod scheduler;

pub use options::BuildOptions;
pub use process_monitor::{process_monitor, ProcessMonitor};
pub use scheduler::{run, run_resolved, BuildReport};

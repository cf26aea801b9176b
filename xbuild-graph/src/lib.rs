// Copyright 2026 xbuild contributors (see CONTRIBUTORS.md).
// Licensed under the Apache License, Version 2.0 (see LICENSE).

//! The dependency graph: the lazy [`PathSet`](pathset::PathSet) model, the
//! two-phase [`BuildContext`](context::BuildContext), the per-target
//! [`TargetWrapper`](wrapper::TargetWrapper), and the single-threaded
//! [`resolver`] that ties them together into a DAG ready for scheduling.

pub mod context;
pub mod pathset;
pub mod resolver;
pub mod target;
pub mod wrapper;

pub use context::{BuildContext, InitializationContext, RegisteredTarget};
pub use pathset::{PathSet, UnderlyingDep};
pub use resolver::{find_cycle, resolve, ResolvedGraph};
pub use target::{default_clean, Target, TargetSpec};
pub use wrapper::TargetWrapper;

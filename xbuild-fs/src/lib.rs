// Copyright 2026 xbuild contributors (see CONTRIBUTORS.md).
// Licensed under the Apache License, Version 2.0 (see LICENSE).

//! Path discrimination, a process-wide stat cache, and ant-style glob
//! matching: the ground floor the rest of the engine builds on.

mod antglob;
mod path;
mod stat;

pub use antglob::{GlobPattern, GlobPatternSet};
pub use path::{dedup_key, is_case_insensitive_fs, is_dir_path, normalize_long_path};
pub use stat::{stat_cached, stat_uncached, StatCache, StatEntry};

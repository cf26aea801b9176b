// Copyright 2026 xbuild contributors (see CONTRIBUTORS.md).
// Licensed under the Apache License, Version 2.0 (see LICENSE).

//! Property and option layering for the build context: script-declared
//! defaults overlaid by environment and command-line overrides, plus
//! `${NAME}` string expansion.

mod options;
mod properties;
mod source;
mod value;

pub use options::{OptionTable, ResolvedOptions};
pub use properties::{PropertyTable, ResolvedProperties};
pub use source::{OptionSource, Source};
pub use value::Value;

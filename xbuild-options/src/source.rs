// Copyright 2026 xbuild contributors (see CONTRIBUTORS.md).
// Licensed under the Apache License, Version 2.0 (see LICENSE).

/// Where a property's effective value came from. Ordered so that a
/// `BTreeMap` keyed by `Source` iterates highest-priority first: the same
/// trick the option-parsing layer this module is modeled on uses to let a
/// single "first source with a value wins" loop implement all of its
/// priority rules.
#[derive(Copy, Clone, Debug, Ord, PartialOrd, Eq, PartialEq)]
pub enum Source {
    Cli,
    Env,
    Script,
}

/// Where a per-target option override sits relative to its global default.
#[derive(Copy, Clone, Debug, Ord, PartialOrd, Eq, PartialEq)]
pub enum OptionSource {
    TargetOverride,
    GlobalOverride,
    Default,
}

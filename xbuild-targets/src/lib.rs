// Copyright 2026 xbuild contributors (see CONTRIBUTORS.md).
// Licensed under the Apache License, Version 2.0 (see LICENSE).

//! Concrete target kinds the engine can build out of the box. These exist to
//! make the engine independently testable end-to-end; a real build script
//! would register many more kinds (compilers, archivers, ...) the same way.

mod copy;
mod write_file;

pub use copy::Copy;
pub use write_file::WriteFile;

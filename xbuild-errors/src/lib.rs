// Copyright 2026 xbuild contributors (see CONTRIBUTORS.md).
// Licensed under the Apache License, Version 2.0 (see LICENSE).

//! The error type shared by every crate in this workspace.
//!
//! Internal helper functions still return `Result<T, String>` where a caller
//! only ever logs or immediately wraps the failure (the same convention the
//! options-parsing layer this crate borrows from uses for its own bootstrap
//! errors). Anything that can surface to a user of the `xbuild` binary is
//! collected into a [`BuildError`] instead, so the top level always has a
//! location and a kind to report.

use std::fmt;
use std::path::PathBuf;

/// Where in a build script an error originated, when known.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceLocation {
    pub file: PathBuf,
    pub line: u32,
}

impl fmt::Display for SourceLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.file.display(), self.line)
    }
}

/// Unified error type for the engine. Each variant corresponds to one of the
/// error kinds a caller needs to treat differently: resolution errors are
/// always fatal, execution/clean/verification errors are collected and may
/// or may not abort the build depending on `keep_going`.
#[derive(Debug)]
pub enum BuildError {
    /// A problem with the build script or its declarations: unknown property,
    /// duplicate target, malformed glob, and the like.
    User {
        message: String,
        location: Option<SourceLocation>,
    },
    /// Raised while resolving the dependency graph, before any target runs.
    DependencyResolution {
        message: String,
        location: Option<SourceLocation>,
    },
    /// A target's `run` failed.
    TargetExecution {
        target: String,
        cause: String,
    },
    /// A target's `clean` failed. Never fatal to the overall build.
    Clean {
        target: String,
        cause: String,
    },
    /// A `--verify` pass found a dependency missing or modified mid-build.
    Verification {
        target: String,
        message: String,
    },
    /// An engine invariant was violated.
    Internal {
        message: String,
        backtrace: Option<String>,
    },
}

impl BuildError {
    pub fn user(message: impl Into<String>) -> Self {
        BuildError::User {
            message: message.into(),
            location: None,
        }
    }

    pub fn user_at(message: impl Into<String>, location: SourceLocation) -> Self {
        BuildError::User {
            message: message.into(),
            location: Some(location),
        }
    }

    pub fn dependency_resolution(message: impl Into<String>) -> Self {
        BuildError::DependencyResolution {
            message: message.into(),
            location: None,
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        let backtrace = std::env::var_os("RUST_BACKTRACE")
            .is_some()
            .then(|| std::backtrace::Backtrace::force_capture().to_string());
        BuildError::Internal {
            message: message.into(),
            backtrace,
        }
    }

    /// The target this error is attributed to, if any. Used by the scheduler
    /// to decide which rdeps to skip.
    pub fn target(&self) -> Option<&str> {
        match self {
            BuildError::TargetExecution { target, .. }
            | BuildError::Clean { target, .. }
            | BuildError::Verification { target, .. } => Some(target.as_str()),
            _ => None,
        }
    }
}

impl fmt::Display for BuildError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BuildError::User { message, location } => {
                write!(f, "{message}")?;
                if let Some(loc) = location {
                    write!(f, " ({loc})")?;
                }
                Ok(())
            }
            BuildError::DependencyResolution { message, location } => {
                write!(f, "dependency resolution failed: {message}")?;
                if let Some(loc) = location {
                    write!(f, " ({loc})")?;
                }
                Ok(())
            }
            BuildError::TargetExecution { target, cause } => {
                write!(f, "{target} : {cause}")
            }
            BuildError::Clean { target, cause } => {
                write!(f, "{target} : clean failed : {cause}")
            }
            BuildError::Verification { target, message } => {
                write!(f, "{target} : verification failed : {message}")
            }
            BuildError::Internal { message, backtrace } => {
                write!(f, "internal error: {message}")?;
                if let Some(bt) = backtrace {
                    write!(f, "\n{bt}")?;
                }
                Ok(())
            }
        }
    }
}

impl std::error::Error for BuildError {}

/// Appends a wrapped cause's single-line summary to a message, in the
/// `" : "`-separated form every user-facing error uses.
pub fn with_cause(message: impl Into<String>, cause: &dyn fmt::Display) -> String {
    format!("{} : {}", message.into(), cause)
}

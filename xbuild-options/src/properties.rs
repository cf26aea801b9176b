// Copyright 2026 xbuild contributors (see CONTRIBUTORS.md).
// Licensed under the Apache License, Version 2.0 (see LICENSE).

//! Property definition, layered override resolution, and `${NAME}`
//! expansion.
//!
//! Mirrors the two-phase split the rest of this crate's build-context model
//! uses: [`PropertyTable`] is mutable and is only touched while a build
//! script is loading; [`ResolvedProperties`] is the frozen snapshot the
//! engine reads from for the rest of the build.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use parking_lot::Mutex;

use xbuild_errors::BuildError;

use crate::source::Source;
use crate::value::Value;

/// Mutable property definitions collected while a build script loads.
/// Frozen into a [`ResolvedProperties`] once loading completes.
#[derive(Default)]
pub struct PropertyTable {
    defaults: BTreeMap<String, Value>,
    cli_overrides: BTreeMap<String, String>,
    env_prefix: Option<String>,
}

impl PropertyTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a script-declared property with its default value.
    /// Re-defining an existing property silently replaces its default,
    /// matching the loader's forgiving re-declaration behavior.
    pub fn define(&mut self, name: impl Into<String>, default: impl Into<Value>) {
        self.defaults.insert(name.into(), default.into());
    }

    /// Records a `-D NAME=VALUE` command-line override. Takes precedence
    /// over everything else once resolved.
    pub fn override_from_cli(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.cli_overrides.insert(name.into(), value.into());
    }

    /// Enables `${PREFIX}NAME` environment variable overrides for every
    /// property, ranking below CLI overrides but above the script default.
    pub fn enable_environment_overrides(&mut self, prefix: impl Into<String>) {
        self.env_prefix = Some(prefix.into());
    }

    pub fn freeze(self, root_dir: PathBuf) -> ResolvedProperties {
        ResolvedProperties {
            defaults: self.defaults,
            cli_overrides: self.cli_overrides,
            env_prefix: self.env_prefix,
            root_dir,
            lazily_defined: Mutex::new(BTreeMap::new()),
        }
    }
}

/// Immutable, thread-safe snapshot of a build's properties. A handful of
/// properties (`OUTPUT_DIR`, `BUILD_MODE`, `BUILD_WORK_DIR`, `LOG_FILE`) are
/// synthesized with a default on first read if the script never defined
/// them, matching the "always-defined" properties of the context this is
/// modeled on.
pub struct ResolvedProperties {
    defaults: BTreeMap<String, Value>,
    cli_overrides: BTreeMap<String, String>,
    env_prefix: Option<String>,
    root_dir: PathBuf,
    lazily_defined: Mutex<BTreeMap<String, Value>>,
}

impl ResolvedProperties {
    /// Which [`Source`] (if any) would win for `name`, not counting the
    /// script default. Used by tests and diagnostics; the engine itself only
    /// needs [`get`](Self::get).
    pub fn source_of(&self, name: &str) -> Source {
        if self.cli_overrides.contains_key(name) {
            return Source::Cli;
        }
        if let Some(prefix) = &self.env_prefix {
            if std::env::var(format!("{prefix}{name}")).is_ok() {
                return Source::Env;
            }
        }
        Source::Script
    }

    pub fn get(&self, name: &str) -> Result<Value, BuildError> {
        if let Some(v) = self.cli_overrides.get(name) {
            return Ok(Value::Str(v.clone()));
        }
        if let Some(prefix) = &self.env_prefix {
            if let Ok(v) = std::env::var(format!("{prefix}{name}")) {
                return Ok(Value::Str(v));
            }
        }
        if let Some(v) = self.defaults.get(name) {
            return Ok(v.clone());
        }
        if let Some(v) = self.lazily_defined.lock().get(name) {
            return Ok(v.clone());
        }
        self.define_special_property(name)
    }

    fn define_special_property(&self, name: &str) -> Result<Value, BuildError> {
        let value = match name {
            "OUTPUT_DIR" => Value::Str(
                self.root_dir
                    .join("buildoutput")
                    .to_string_lossy()
                    .into_owned(),
            ),
            "BUILD_MODE" => Value::Str("release".to_string()),
            "BUILD_WORK_DIR" => {
                let output_dir = self.get("OUTPUT_DIR")?.as_str();
                Value::Str(Path::new(&output_dir).join("BUILD_WORK").to_string_lossy().into_owned())
            }
            "LOG_FILE" => Value::Str(
                std::env::current_dir()
                    .unwrap_or_default()
                    .join("build.log")
                    .to_string_lossy()
                    .into_owned(),
            ),
            _ => {
                return Err(BuildError::user(format!(
                    "property \"{name}\" is not defined"
                )))
            }
        };
        self.lazily_defined
            .lock()
            .insert(name.to_string(), value.clone());
        Ok(value)
    }

    /// Expands every `${NAME}` placeholder in `s`, returning a single
    /// string. `$${...}` escapes to a literal `${...}`. Fails if `s`
    /// contains a list-valued `NAME[]` placeholder — use
    /// [`expand_list`](Self::expand_list) for those.
    pub fn expand(&self, s: &str) -> Result<String, BuildError> {
        let mut results = self.expand_inner(s, false)?;
        Ok(results.remove(0))
    }

    /// Expands `s`, splitting into multiple strings if it contains exactly
    /// one list-valued `${NAME[]}` placeholder (a comma-separated property
    /// value). Returns a single-element vector if there is no list
    /// placeholder.
    pub fn expand_list(&self, s: &str) -> Result<Vec<String>, BuildError> {
        self.expand_inner(s, true)
    }

    fn expand_inner(&self, s: &str, expand_list: bool) -> Result<Vec<String>, BuildError> {
        if s.is_empty() {
            return Ok(vec![String::new()]);
        }

        const ESCAPE_PLACEHOLDER: &str = "\u{0}xbuild-escaped-dollar\u{0}";
        let mut working = s.replace("$${", ESCAPE_PLACEHOLDER);

        let mut list_prop: Option<String> = None;
        let mut prefix = String::new();

        loop {
            let Some(start) = working.find("${") else {
                break;
            };
            let Some(rel_end) = working[start..].find('}') else {
                return Err(BuildError::user(format!(
                    "incorrectly formatted property string \"{s}\""
                )));
            };
            let end = start + rel_end;
            let prop_name = &working[start + 2..end];

            if expand_list && prop_name.ends_with("[]") {
                if list_prop.is_some() {
                    return Err(BuildError::user(
                        "cannot expand as a list a string containing multiple list variables",
                    ));
                }
                list_prop = Some(prop_name.to_string());
                prefix = working[..start].to_string();
                working = working[end + 1..].to_string();
                continue;
            }

            let value = self.get(prop_name)?.as_str();
            working = format!("{}{}{}", &working[..start], value, &working[end + 1..]);
        }

        if let Some(list_name) = list_prop {
            let items = self.expand_list_property(&list_name)?;
            let mut out = Vec::new();
            for item in items {
                for expanded_item in self.expand_inner(&item, true)? {
                    out.push(
                        format!("{prefix}{expanded_item}{working}")
                            .replace(ESCAPE_PLACEHOLDER, "${"),
                    );
                }
            }
            Ok(out)
        } else {
            Ok(vec![working.replace(ESCAPE_PLACEHOLDER, "${")])
        }
    }

    fn expand_list_property(&self, name: &str) -> Result<Vec<String>, BuildError> {
        let raw = self.get(name)?.as_str();
        Ok(raw.split(',').map(|s| s.trim().to_string()).collect())
    }

    pub fn root_dir(&self) -> &Path {
        &self.root_dir
    }

    /// Expands `path`, then resolves it to an absolute, normalized form:
    /// relative paths are resolved against `default_dir` (itself expanded
    /// first), collapsing `.`/`..` segments without touching the filesystem.
    pub fn get_full_path(&self, path: &str, default_dir: &str) -> Result<String, BuildError> {
        let expanded_path = self.expand(path)?;
        let expanded_default_dir = self.expand(default_dir)?;
        let base = Path::new(&expanded_default_dir);
        let absolute_base = if base.is_absolute() { base.to_path_buf() } else { self.root_dir.join(base) };
        Ok(xbuild_fs::normalize_long_path(&expanded_path, &absolute_base).to_string())
    }
}

// Copyright 2026 xbuild contributors (see CONTRIBUTORS.md).
// Licensed under the Apache License, Version 2.0 (see LICENSE).

//! Minimal build-script loader (§4.8): reads a small declarative TOML
//! dialect and registers its declarations against an [`InitializationContext`].
//! Grounded in the teacher `options` crate's `Config::parse`/`Config::merged`
//! TOML-table layering — read the whole document as a [`toml::Value`],
//! validate section shapes explicitly, and report clear, located errors
//! rather than relying on serde's generic deserialization failures.

use std::collections::HashSet;
use std::fs;
use std::path::Path;

use toml::Value as TomlValue;

use xbuild_errors::{BuildError, SourceLocation};
use xbuild_graph::{InitializationContext, PathSet, TargetSpec};
use xbuild_options::Value;
use xbuild_targets::{Copy, WriteFile};

/// Parses the TOML build script at `path` and registers every declared
/// property, option, target, and atomic group against `ctx`.
pub fn load(ctx: &mut InitializationContext, path: &Path) -> Result<(), BuildError> {
    let text = fs::read_to_string(path)
        .map_err(|e| BuildError::user(format!("failed to read build script {}: {e}", path.display())))?;
    load_str(ctx, &text, path)
}

/// Same as [`load`], but takes the script text directly rather than reading
/// it from disk — used by tests and by callers that already have the text
/// in hand.
pub fn load_str(ctx: &mut InitializationContext, text: &str, path: &Path) -> Result<(), BuildError> {
    let doc: TomlValue = text
        .parse()
        .map_err(|e| BuildError::user(format!("failed to parse build script {}: {e}", path.display())))?;
    let table = doc
        .as_table()
        .ok_or_else(|| BuildError::user(format!("build script {} must be a TOML table", path.display())))?;

    if let Some(properties) = table.get("properties") {
        let properties = properties
            .as_table()
            .ok_or_else(|| located(path, section_line(text, "[properties]"), "[properties] must be a table"))?;
        for (name, value) in properties {
            ctx.define_property(name.clone(), scalar_value(path, name, value)?);
        }
    }

    if let Some(output_dirs) = table.get("output_dir") {
        let output_dirs = output_dirs
            .as_table()
            .ok_or_else(|| located(path, section_line(text, "[output_dir]"), "[output_dir] must be a table"))?;
        for (name, value) in output_dirs {
            ctx.define_output_dir_property(name.clone(), scalar_value(path, name, value)?);
        }
    }

    if let Some(options) = table.get("options") {
        let options = options
            .as_table()
            .ok_or_else(|| located(path, section_line(text, "[options]"), "[options] must be a table"))?;
        for (name, value) in options {
            ctx.define_option(name.clone(), scalar_value(path, name, value)?);
        }
    }

    let mut seen_names = HashSet::new();
    if let Some(targets) = table.get("target").and_then(TomlValue::as_array) {
        let target_lines = block_lines(text, "[[target]]");
        for (index, entry) in targets.iter().enumerate() {
            let location = target_lines.get(index).map(|&line| SourceLocation { file: path.to_path_buf(), line });
            register_target(ctx, entry, location, &mut seen_names)?;
        }
    }

    if let Some(groups) = table.get("atomic_group").and_then(TomlValue::as_array) {
        let group_lines = block_lines(text, "[[atomic_group]]");
        for (index, entry) in groups.iter().enumerate() {
            let location = group_lines.get(index).map(|&line| SourceLocation { file: path.to_path_buf(), line });
            let members = entry
                .get("members")
                .and_then(TomlValue::as_array)
                .ok_or_else(|| located_opt(location.clone(), "[[atomic_group]] requires a \"members\" array"))?
                .iter()
                .map(|v| {
                    v.as_str()
                        .map(str::to_string)
                        .ok_or_else(|| located_opt(location.clone(), "atomic_group members must be strings"))
                })
                .collect::<Result<Vec<_>, _>>()?;
            ctx.define_atomic_target_group(members);
        }
    }

    Ok(())
}

fn register_target(
    ctx: &mut InitializationContext,
    entry: &TomlValue,
    location: Option<SourceLocation>,
    seen_names: &mut HashSet<String>,
) -> Result<(), BuildError> {
    let table = entry
        .as_table()
        .ok_or_else(|| located_opt(location.clone(), "each [[target]] entry must be a table"))?;

    let kind = table
        .get("kind")
        .and_then(TomlValue::as_str)
        .ok_or_else(|| located_opt(location.clone(), "target is missing a \"kind\""))?;
    let name = table
        .get("name")
        .and_then(TomlValue::as_str)
        .ok_or_else(|| located_opt(location.clone(), "target is missing a \"name\""))?
        .to_string();

    if !seen_names.insert(name.clone()) {
        return Err(located_opt(location, format!("duplicate target name \"{name}\"")));
    }

    let priority = table.get("priority").and_then(TomlValue::as_integer).unwrap_or(0).max(0) as u32;
    let tags = table
        .get("tags")
        .and_then(TomlValue::as_array)
        .map(|arr| arr.iter().filter_map(|v| v.as_str().map(str::to_string)).collect())
        .unwrap_or_else(|| vec!["all".to_string()]);
    let deps = table
        .get("deps")
        .and_then(TomlValue::as_array)
        .map(|arr| arr.iter().filter_map(|v| v.as_str().map(str::to_string)).collect::<Vec<_>>())
        .unwrap_or_default();

    match kind {
        "write_file" => {
            let content = table
                .get("content")
                .and_then(TomlValue::as_str)
                .ok_or_else(|| located_opt(location.clone(), "write_file target requires \"content\""))?
                .to_string();
            let action_deps = PathSet::literal(".", deps);
            let mut spec = TargetSpec::new(name, action_deps, WriteFile::new(content)).with_tags(tags).with_priority(priority);
            if let Some(loc) = location {
                spec = spec.with_location(loc);
            }
            ctx.register_target(spec);
        }
        "copy" => {
            let from = table
                .get("from")
                .and_then(TomlValue::as_array)
                .ok_or_else(|| located_opt(location.clone(), "copy target requires \"from\""))?
                .iter()
                .filter_map(|v| v.as_str().map(str::to_string))
                .collect::<Vec<_>>();
            let action_deps = PathSet::union(vec![
                PathSet::find_paths(".", from.clone(), vec![]),
                PathSet::literal(".", deps),
            ]);
            let mut spec = TargetSpec::new(name, action_deps, Copy::new(PathSet::find_paths(".", from, vec![])))
                .with_tags(tags)
                .with_priority(priority);
            if let Some(loc) = location {
                spec = spec.with_location(loc);
            }
            ctx.register_target(spec);
        }
        other => {
            return Err(located_opt(location, format!("unknown target kind \"{other}\"")));
        }
    }

    Ok(())
}

fn scalar_value(path: &Path, name: &str, value: &TomlValue) -> Result<Value, BuildError> {
    match value {
        TomlValue::String(s) => Ok(Value::Str(s.clone())),
        TomlValue::Boolean(b) => Ok(Value::Bool(*b)),
        TomlValue::Integer(i) => Ok(Value::Str(i.to_string())),
        TomlValue::Float(f) => Ok(Value::Str(f.to_string())),
        other => Err(BuildError::user(format!(
            "{}: property/option \"{name}\" must be a string, bool, or number, found {}",
            path.display(),
            other.type_str()
        ))),
    }
}

fn located(path: &Path, line: Option<u32>, message: impl Into<String>) -> BuildError {
    match line {
        Some(line) => BuildError::user_at(message, SourceLocation { file: path.to_path_buf(), line }),
        None => BuildError::user(message),
    }
}

fn located_opt(location: Option<SourceLocation>, message: impl Into<String>) -> BuildError {
    match location {
        Some(loc) => BuildError::user_at(message, loc),
        None => BuildError::user(message),
    }
}

/// The 1-based line number of the first line equal (after trimming) to
/// `header`, if any.
fn section_line(text: &str, header: &str) -> Option<u32> {
    text.lines().position(|l| l.trim() == header).map(|i| (i + 1) as u32)
}

/// The 1-based line number of every line equal (after trimming) to `header`,
/// in order — used to locate the Nth `[[target]]`/`[[atomic_group]]` block.
fn block_lines(text: &str, header: &str) -> Vec<u32> {
    text.lines()
        .enumerate()
        .filter_map(|(i, l)| (l.trim() == header).then_some((i + 1) as u32))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn loaded_ctx(script: &str) -> InitializationContext {
        let mut ctx = InitializationContext::new(PathBuf::from("/root"));
        load_str(&mut ctx, script, Path::new("build.toml")).unwrap();
        ctx
    }

    #[test]
    fn loads_properties_and_write_file_target() {
        let ctx = loaded_ctx(
            r#"
[properties]
GREETING = "hi"

[[target]]
kind = "write_file"
name = "out/hello.txt"
content = "${GREETING}"
"#,
        );
        let built = ctx.freeze().unwrap();
        let target = built.target("out/hello.txt").unwrap();
        assert_eq!(target.path, "out/hello.txt");
    }

    #[test]
    fn copy_target_requires_from() {
        let mut ctx = InitializationContext::new(PathBuf::from("/root"));
        let err = load_str(
            &mut ctx,
            r#"
[[target]]
kind = "copy"
name = "out/assets/"
"#,
            Path::new("build.toml"),
        )
        .unwrap_err();
        assert!(err.to_string().contains("requires \"from\""));
    }

    #[test]
    fn unknown_kind_is_rejected_with_location() {
        let mut ctx = InitializationContext::new(PathBuf::from("/root"));
        let err = load_str(
            &mut ctx,
            r#"
[[target]]
kind = "bogus"
name = "out/x"
"#,
            Path::new("build.toml"),
        )
        .unwrap_err();
        let message = err.to_string();
        assert!(message.contains("unknown target kind \"bogus\""));
        assert!(message.contains("build.toml:2"));
    }

    #[test]
    fn duplicate_target_names_rejected() {
        let mut ctx = InitializationContext::new(PathBuf::from("/root"));
        let err = load_str(
            &mut ctx,
            r#"
[[target]]
kind = "write_file"
name = "out/x"
content = "a"

[[target]]
kind = "write_file"
name = "out/x"
content = "b"
"#,
            Path::new("build.toml"),
        )
        .unwrap_err();
        assert!(err.to_string().contains("duplicate target name"));
    }

    #[test]
    fn output_dir_section_registers_a_property_and_rejects_direct_writes() {
        let mut ctx = InitializationContext::new(PathBuf::from("/root"));
        load_str(
            &mut ctx,
            r#"
[output_dir]
OUTPUT_DIR = "/root/out"

[[target]]
kind = "write_file"
name = "${OUTPUT_DIR}"
content = "a"
"#,
            Path::new("build.toml"),
        )
        .unwrap();
        let err = ctx.freeze().unwrap_err();
        assert!(err.to_string().contains("declared output directory"), "{err}");
    }

    #[test]
    fn atomic_group_is_registered() {
        let ctx = loaded_ctx(
            r#"
[[target]]
kind = "write_file"
name = "out/a"
content = "a"

[[target]]
kind = "write_file"
name = "out/b"
content = "b"

[[atomic_group]]
members = ["out/a", "out/b"]
"#,
        );
        let built = ctx.freeze().unwrap();
        assert_eq!(built.atomic_groups().to_vec(), vec![vec!["out/a".to_string(), "out/b".to_string()]]);
    }
}

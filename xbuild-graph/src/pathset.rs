// Copyright 2026 xbuild contributors (see CONTRIBUTORS.md).
// Licensed under the Apache License, Version 2.0 (see LICENSE).

//! The lazily-resolved path-set model: literal path lists, directory
//! listings, glob searches, target-generated directories, and the
//! transforms (filter, prefix, flatten, rename) that compose over them.

use std::path::{Path, PathBuf};
use std::sync::{Arc, OnceLock};

use xbuild_errors::BuildError;
use xbuild_fs::GlobPatternSet;

use crate::context::BuildContext;

/// One dependency discovered while resolving a [`PathSet`]: either a target
/// (by path, matched against the registry by the caller) or a plain
/// filesystem path.
#[derive(Debug, Clone)]
pub struct UnderlyingDep {
    pub path: String,
    pub is_dir: bool,
    pub skip_existence_check: bool,
}

pub type PathMapper = Arc<dyn Fn(&str) -> String + Send + Sync>;

pub enum PathSet {
    /// Explicit paths (possibly containing `${VAR}`), resolved against
    /// `base_dir`.
    Literal { base_dir: String, entries: Vec<String> },
    /// A base directory plus an explicit, non-glob list of relative
    /// children.
    DirBased { base_dir: String, children: Vec<String> },
    /// An ant-style glob search rooted at `base_dir`.
    FindPaths {
        base_dir: String,
        includes: Vec<String>,
        excludes: Vec<String>,
        cache: Arc<OnceLock<Vec<(String, String)>>>,
    },
    /// Every target carrying `tag` (optionally including directory targets).
    TargetsWithTag { tag: String, allow_directories: bool },
    /// The contents of a directory produced by another target, evaluated
    /// only at execution time — at resolution time this contributes only
    /// the generating target as an underlying dependency.
    DirGeneratedByTarget { target_name: String, includes: Vec<String>, excludes: Vec<String> },
    Filtered { inner: Box<PathSet>, exclude_globs: Vec<String> },
    AddDestPrefix { inner: Box<PathSet>, prefix: String },
    RemoveDestParents { inner: Box<PathSet>, levels: usize },
    FlattenDest { inner: Box<PathSet> },
    MapSrc { inner: Box<PathSet>, mapper: PathMapper },
    MapDest { inner: Box<PathSet>, mapper: PathMapper },
    SingletonDestRename { inner: Box<PathSet>, new_name: String },
    /// The concatenation of several path-sets, in order. Mirrors the
    /// original implementation's habit of passing a plain list of PathSets
    /// (and bare dependency strings) wherever one was expected.
    Union(Vec<PathSet>),
}

impl PathSet {
    pub fn literal(base_dir: impl Into<String>, entries: Vec<String>) -> Self {
        PathSet::Literal { base_dir: base_dir.into(), entries }
    }

    pub fn dir_based(base_dir: impl Into<String>, children: Vec<String>) -> Self {
        PathSet::DirBased { base_dir: base_dir.into(), children }
    }

    pub fn find_paths(base_dir: impl Into<String>, includes: Vec<String>, excludes: Vec<String>) -> Self {
        PathSet::FindPaths {
            base_dir: base_dir.into(),
            includes,
            excludes,
            cache: Arc::new(OnceLock::new()),
        }
    }

    pub fn targets_with_tag(tag: impl Into<String>, allow_directories: bool) -> Self {
        PathSet::TargetsWithTag { tag: tag.into(), allow_directories }
    }

    pub fn dir_generated_by_target(target_name: impl Into<String>) -> Self {
        PathSet::DirGeneratedByTarget {
            target_name: target_name.into(),
            includes: vec!["**".to_string()],
            excludes: Vec::new(),
        }
    }

    pub fn add_dest_prefix(self, prefix: impl Into<String>) -> Self {
        PathSet::AddDestPrefix { inner: Box::new(self), prefix: prefix.into() }
    }

    pub fn flatten_dest(self) -> Self {
        PathSet::FlattenDest { inner: Box::new(self) }
    }

    pub fn remove_dest_parents(self, levels: usize) -> Self {
        PathSet::RemoveDestParents { inner: Box::new(self), levels }
    }

    pub fn filtered(self, exclude_globs: Vec<String>) -> Self {
        PathSet::Filtered { inner: Box::new(self), exclude_globs }
    }

    /// Concatenates `parts` into a single path-set, in order. A single part
    /// is returned unwrapped rather than nested in a one-element union.
    pub fn union(mut parts: Vec<PathSet>) -> Self {
        if parts.len() == 1 {
            parts.remove(0)
        } else {
            PathSet::Union(parts)
        }
    }

    /// Resolves this path-set into `(absolute_source, relative_destination)`
    /// pairs. For [`PathSet::DirGeneratedByTarget`] this evaluates the
    /// generating target's directory contents directly (it must already
    /// exist — i.e. be called only after that target has run).
    pub fn resolve_with_destinations(&self, ctx: &BuildContext) -> Result<Vec<(PathBuf, PathBuf)>, BuildError> {
        match self {
            PathSet::Literal { base_dir, entries } => {
                let base = expand_dir(ctx, base_dir)?;
                let mut out = Vec::new();
                for entry in entries {
                    let expanded = ctx.properties().expand(entry)?;
                    let abs = resolve_against(&base, &expanded);
                    let dest = PathBuf::from(
                        abs.file_name().map(|f| f.to_string_lossy().into_owned()).unwrap_or_default(),
                    );
                    out.push((abs, dest));
                }
                Ok(out)
            }
            PathSet::DirBased { base_dir, children } => {
                let base = expand_dir(ctx, base_dir)?;
                let mut out = Vec::new();
                for child in children {
                    let expanded = ctx.properties().expand(child)?;
                    let abs = resolve_against(&base, &expanded);
                    let dest = PathBuf::from(&expanded);
                    out.push((abs, dest));
                }
                Ok(out)
            }
            PathSet::FindPaths { base_dir, includes, excludes, cache } => {
                if let Some(hit) = cache.get() {
                    return Ok(hit.iter().map(|(s, d)| (PathBuf::from(s), PathBuf::from(d))).collect());
                }
                let base = expand_dir(ctx, base_dir)?;
                let matched = find_paths(ctx, &base, includes, excludes)?;
                let _ = cache.set(
                    matched
                        .iter()
                        .map(|(s, d)| (s.to_string_lossy().into_owned(), d.to_string_lossy().into_owned()))
                        .collect(),
                );
                Ok(matched)
            }
            PathSet::TargetsWithTag { tag, allow_directories } => {
                let mut out = Vec::new();
                for target in ctx.targets_with_tag(tag) {
                    if target.is_dir_path() && !allow_directories {
                        continue;
                    }
                    let abs = PathBuf::from(&target.path);
                    let dest = PathBuf::from(abs.file_name().map(|f| f.to_string_lossy().into_owned()).unwrap_or_default());
                    out.push((abs, dest));
                }
                Ok(out)
            }
            PathSet::DirGeneratedByTarget { target_name, includes, excludes } => {
                let target = ctx.target(target_name)?;
                let base = PathBuf::from(&target.path);
                find_paths(ctx, &base, includes, excludes)
            }
            PathSet::Filtered { inner, exclude_globs } => {
                let set = GlobPatternSet::create(&["**".to_string()], exclude_globs)?;
                let resolved = inner.resolve_with_destinations(ctx)?;
                Ok(resolved
                    .into_iter()
                    .filter(|(_, dest)| set.matches(dest, false))
                    .collect())
            }
            PathSet::AddDestPrefix { inner, prefix } => Ok(inner
                .resolve_with_destinations(ctx)?
                .into_iter()
                .map(|(src, dest)| (src, Path::new(prefix).join(dest)))
                .collect()),
            PathSet::RemoveDestParents { inner, levels } => Ok(inner
                .resolve_with_destinations(ctx)?
                .into_iter()
                .map(|(src, dest)| {
                    let components: Vec<_> = dest.components().collect();
                    let kept = if components.len() > *levels {
                        components[*levels..].iter().collect::<PathBuf>()
                    } else {
                        dest.file_name().map(PathBuf::from).unwrap_or_default()
                    };
                    (src, kept)
                })
                .collect()),
            PathSet::FlattenDest { inner } => Ok(inner
                .resolve_with_destinations(ctx)?
                .into_iter()
                .map(|(src, dest)| {
                    let flat = dest.file_name().map(PathBuf::from).unwrap_or(dest);
                    (src, flat)
                })
                .collect()),
            PathSet::MapSrc { inner, mapper } => Ok(inner
                .resolve_with_destinations(ctx)?
                .into_iter()
                .map(|(src, dest)| (PathBuf::from(mapper(&src.to_string_lossy())), dest))
                .collect()),
            PathSet::MapDest { inner, mapper } => Ok(inner
                .resolve_with_destinations(ctx)?
                .into_iter()
                .map(|(src, dest)| (src, PathBuf::from(mapper(&dest.to_string_lossy()))))
                .collect()),
            PathSet::SingletonDestRename { inner, new_name } => {
                let resolved = inner.resolve_with_destinations(ctx)?;
                if resolved.len() != 1 {
                    return Err(BuildError::dependency_resolution(format!(
                        "SingletonDestRename requires exactly one entry, found {}",
                        resolved.len()
                    )));
                }
                Ok(vec![(resolved[0].0.clone(), PathBuf::from(new_name))])
            }
            PathSet::Union(parts) => {
                let mut out = Vec::new();
                for part in parts {
                    out.extend(part.resolve_with_destinations(ctx)?);
                }
                Ok(out)
            }
        }
    }

    /// The dependencies this path-set implies for the dependency resolver:
    /// for most variants this is the same set of absolute source paths as
    /// [`resolve_with_destinations`](Self::resolve_with_destinations); for
    /// [`PathSet::DirGeneratedByTarget`] it is just the generating target,
    /// without touching the filesystem (the directory may not exist yet).
    pub fn resolve_underlying_dependencies(&self, ctx: &BuildContext) -> Result<Vec<UnderlyingDep>, BuildError> {
        match self {
            PathSet::DirGeneratedByTarget { target_name, .. } => {
                let target = ctx.target(target_name)?;
                Ok(vec![UnderlyingDep {
                    path: target.path.clone(),
                    is_dir: true,
                    skip_existence_check: false,
                }])
            }
            PathSet::Filtered { inner, .. }
            | PathSet::AddDestPrefix { inner, .. }
            | PathSet::RemoveDestParents { inner, .. }
            | PathSet::FlattenDest { inner }
            | PathSet::MapSrc { inner, .. }
            | PathSet::MapDest { inner, .. }
            | PathSet::SingletonDestRename { inner, .. } => inner.resolve_underlying_dependencies(ctx),
            PathSet::Union(parts) => {
                let mut out = Vec::new();
                for part in parts {
                    out.extend(part.resolve_underlying_dependencies(ctx)?);
                }
                Ok(out)
            }
            _ => Ok(self
                .resolve_with_destinations(ctx)?
                .into_iter()
                .map(|(src, _)| UnderlyingDep {
                    path: src.to_string_lossy().into_owned(),
                    is_dir: src.to_string_lossy().ends_with('/'),
                    skip_existence_check: false,
                })
                .collect()),
        }
    }
}

fn expand_dir(ctx: &BuildContext, dir: &str) -> Result<PathBuf, BuildError> {
    let expanded = ctx.properties().expand(dir)?;
    Ok(PathBuf::from(expanded))
}

fn resolve_against(base: &Path, entry: &str) -> PathBuf {
    let candidate = Path::new(entry);
    if candidate.is_absolute() {
        candidate.to_path_buf()
    } else {
        base.join(candidate)
    }
}

/// Walks `base` recursively, matching each relative path against `includes`
/// (erroring if any include pattern matches nothing) minus `excludes`.
fn find_paths(
    _ctx: &BuildContext,
    base: &Path,
    includes: &[String],
    excludes: &[String],
) -> Result<Vec<(PathBuf, PathBuf)>, BuildError> {
    let set = GlobPatternSet::create(includes, excludes)?;
    let mut out = Vec::new();

    if base.exists() {
        for entry in walkdir::WalkDir::new(base).min_depth(1) {
            let entry = entry.map_err(|e| BuildError::dependency_resolution(e.to_string()))?;
            let rel = entry.path().strip_prefix(base).unwrap_or(entry.path());
            if set.matches(rel, entry.file_type().is_dir()) {
                out.push((entry.path().to_path_buf(), rel.to_path_buf()));
            }
        }
    }

    let unused = set.unused_includes();
    if !unused.is_empty() {
        return Err(BuildError::dependency_resolution(format!(
            "include pattern(s) matched nothing under {}: {}",
            base.display(),
            unused.join(", ")
        )));
    }

    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::InitializationContext;

    fn ctx(root: &Path) -> BuildContext {
        let mut init = InitializationContext::new(root.to_path_buf());
        init.define_property("OUTPUT_DIR", root.to_string_lossy().into_owned());
        init.define_property("BUILD_WORK_DIR", root.join("BUILD_WORK").to_string_lossy().into_owned());
        init.freeze().unwrap()
    }

    #[test]
    fn union_concatenates_parts_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let a = dir.path().join("a.txt");
        let b = dir.path().join("b.txt");
        std::fs::write(&a, "").unwrap();
        std::fs::write(&b, "").unwrap();
        let c = ctx(dir.path());

        let set = PathSet::union(vec![
            PathSet::literal(".", vec![a.to_string_lossy().into_owned()]),
            PathSet::literal(".", vec![b.to_string_lossy().into_owned()]),
        ]);
        let resolved = set.resolve_with_destinations(&c).unwrap();
        assert_eq!(resolved.len(), 2);
        assert_eq!(resolved[0].0, a);
        assert_eq!(resolved[1].0, b);
    }

    #[test]
    fn union_of_one_part_is_unwrapped() {
        let inner = PathSet::literal(".", vec!["x".to_string()]);
        match PathSet::union(vec![inner]) {
            PathSet::Literal { .. } => {}
            _ => panic!("expected the single part to be returned unwrapped"),
        }
    }
}

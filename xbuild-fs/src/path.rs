// Copyright 2026 xbuild contributors (see CONTRIBUTORS.md).
// Licensed under the Apache License, Version 2.0 (see LICENSE).

//! Directory-vs-file discrimination and long-path normalization.
//!
//! Mirrors the engine's "is this a path to a file or a directory" test,
//! which in this build model is always decided lexically (by a trailing
//! separator) rather than by consulting the filesystem.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use fnv::FnvHashMap;
use parking_lot::Mutex;

/// True iff `s` is a path to a directory, i.e. ends in the platform separator.
pub fn is_dir_path(s: &str) -> bool {
    s.ends_with('/') || (cfg!(windows) && s.ends_with('\\'))
}

/// Whether targets on this platform should be deduplicated case-insensitively.
/// Linux filesystems are (almost always) case-sensitive; Windows and macOS
/// default installs are not.
pub fn is_case_insensitive_fs() -> bool {
    cfg!(target_os = "windows") || cfg!(target_os = "macos")
}

/// A key usable for case-appropriate path comparisons and hash-map lookups.
pub fn dedup_key(p: &str) -> String {
    if is_case_insensitive_fs() {
        p.to_lowercase()
    } else {
        p.to_string()
    }
}

struct NormalizeCache {
    entries: FnvHashMap<String, Arc<str>>,
}

static CACHE: Mutex<Option<NormalizeCache>> = Mutex::new(None);

/// Absolutizes `p` against `base` (if `p` is relative), collapses `.`/`..`
/// components, and preserves a trailing slash. Results are cached process-wide
/// keyed on the literal input string, matching the long-path-normalization
/// cache the path layer this is modeled on keeps to avoid repeated
/// filesystem-path canonicalization.
pub fn normalize_long_path(p: &str, base: &Path) -> Arc<str> {
    let mut guard = CACHE.lock();
    let cache = guard.get_or_insert_with(|| NormalizeCache {
        entries: FnvHashMap::default(),
    });
    if let Some(hit) = cache.entries.get(p) {
        return hit.clone();
    }

    let had_trailing_slash = is_dir_path(p);
    let raw = PathBuf::from(p);
    let absolute = if raw.is_absolute() {
        raw
    } else {
        base.join(raw)
    };

    let mut collapsed: Vec<std::path::Component> = Vec::new();
    for component in absolute.components() {
        match component {
            std::path::Component::CurDir => {}
            std::path::Component::ParentDir => {
                if matches!(
                    collapsed.last(),
                    Some(std::path::Component::Normal(_))
                ) {
                    collapsed.pop();
                } else {
                    collapsed.push(component);
                }
            }
            other => collapsed.push(other),
        }
    }
    let mut normalized: PathBuf = collapsed.into_iter().collect();
    let mut rendered = normalized.to_string_lossy().into_owned();
    if had_trailing_slash && !rendered.ends_with('/') {
        rendered.push('/');
    }
    normalized.clear();

    let interned: Arc<str> = Arc::from(rendered.into_boxed_str());
    cache.entries.insert(p.to_string(), interned.clone());
    interned
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn is_dir_path_trailing_slash() {
        assert!(is_dir_path("out/assets/"));
        assert!(!is_dir_path("out/assets"));
    }

    #[test]
    fn normalize_is_idempotent() {
        let base = Path::new("/root/work");
        let once = normalize_long_path("a/../b/c/", base);
        let twice = normalize_long_path(&once, base);
        assert_eq!(once, twice);
        assert!(once.ends_with('/'));
    }

    #[test]
    fn normalize_caches_by_literal_input() {
        let base = Path::new("/root/work");
        let a = normalize_long_path("x/y", base);
        let b = normalize_long_path("x/y", base);
        assert!(Arc::ptr_eq(&a, &b));
    }
}

// Copyright 2026 xbuild contributors (see CONTRIBUTORS.md).
// Licensed under the Apache License, Version 2.0 (see LICENSE).

//! Process-wide cache of filesystem metadata lookups.
//!
//! Populated lazily during dependency resolution and never invalidated
//! within a single build: the up-to-date evaluator deliberately bypasses
//! this cache and re-stats a target's own output and stamp files directly,
//! since those can legitimately change mid-build as sibling targets run.

use std::fs;
use std::path::Path;
use std::time::SystemTime;

use fnv::FnvHashMap;
use parking_lot::Mutex;

#[derive(Debug, Clone, Copy)]
pub enum StatEntry {
    File { mtime: SystemTime },
    Dir { mtime: SystemTime },
    Missing,
}

impl StatEntry {
    pub fn exists(&self) -> bool {
        !matches!(self, StatEntry::Missing)
    }

    pub fn mtime(&self) -> Option<SystemTime> {
        match self {
            StatEntry::File { mtime } | StatEntry::Dir { mtime } => Some(*mtime),
            StatEntry::Missing => None,
        }
    }
}

#[derive(Default)]
pub struct StatCache {
    entries: Mutex<FnvHashMap<String, StatEntry>>,
}

impl StatCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stat(&self, path: &Path) -> StatEntry {
        let key = path.to_string_lossy().into_owned();
        if let Some(hit) = self.entries.lock().get(&key) {
            return *hit;
        }
        let entry = stat_uncached(path);
        self.entries.lock().insert(key, entry);
        entry
    }
}

static PROCESS_STAT_CACHE: Mutex<Option<StatCache>> = Mutex::new(None);

/// The process-wide stat cache the dependency resolver consults while
/// validating non-target dependencies (§4.1): populated lazily, never
/// invalidated within a build. Never used for a target's own output or
/// stamp files — those go through [`stat_uncached`] so a sibling target's
/// write during the same build is always observed.
pub fn stat_cached(path: &Path) -> StatEntry {
    let mut guard = PROCESS_STAT_CACHE.lock();
    guard.get_or_insert_with(StatCache::new).stat(path)
}

/// Stats `path` directly, bypassing any cache. Used by the up-to-date
/// evaluator, which must never see a stale answer for a target's own
/// artifacts.
pub fn stat_uncached(path: &Path) -> StatEntry {
    match fs::metadata(path) {
        Ok(meta) => {
            let mtime = meta.modified().unwrap_or(SystemTime::UNIX_EPOCH);
            if meta.is_dir() {
                StatEntry::Dir { mtime }
            } else {
                StatEntry::File { mtime }
            }
        }
        Err(_) => StatEntry::Missing,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_path_reports_missing() {
        let cache = StatCache::new();
        let entry = cache.stat(Path::new("/does/not/exist/xbuild-test"));
        assert!(!entry.exists());
    }

    #[test]
    fn existing_file_is_cached() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("a.txt");
        fs::write(&file, b"hi").unwrap();
        let cache = StatCache::new();
        let first = cache.stat(&file);
        assert!(first.exists());
        fs::remove_file(&file).unwrap();
        let second = cache.stat(&file);
        assert!(second.exists(), "cache should not observe the deletion");
    }

    #[test]
    fn process_wide_cache_survives_across_calls() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("process-wide-cache-test.txt");
        fs::write(&file, b"hi").unwrap();
        assert!(stat_cached(&file).exists());
        fs::remove_file(&file).unwrap();
        assert!(stat_cached(&file).exists(), "process-wide cache should not observe the deletion");
    }
}

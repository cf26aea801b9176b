// Copyright 2026 xbuild contributors (see CONTRIBUTORS.md).
// Licensed under the Apache License, Version 2.0 (see LICENSE).

//! Ant-style glob matching: `*` matches any run of non-separator characters,
//! `**` matches zero or more path elements. `?` and backslashes are rejected
//! at construction time rather than silently treated as literals.

use std::path::Path;

use xbuild_errors::BuildError;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Element {
    /// A segment that may itself contain embedded `*` wildcards, e.g. `*.rs`
    /// or `lib*.so`. Matched with [`element_match`].
    Literal(String),
    /// A segment that is exactly `*`: matches any single segment.
    Star,
    DoubleStar,
}

/// Matches one path segment (no `/`) against one pattern segment, where the
/// pattern may contain zero or more literal `*` wildcards (each matching a
/// run of zero or more characters within the segment).
fn element_match(pattern: &str, element: &str) -> bool {
    if !pattern.contains('*') {
        return pattern == element;
    }
    let parts: Vec<&str> = pattern.split('*').collect();
    if !element.starts_with(parts[0]) {
        return false;
    }
    if !element.ends_with(parts[parts.len() - 1]) {
        return false;
    }
    let mut cursor = parts[0].len();
    let end = element.len() - parts[parts.len() - 1].len();
    if end < cursor {
        return false;
    }
    for part in &parts[1..parts.len() - 1] {
        if part.is_empty() {
            continue;
        }
        match element[cursor..end].find(part) {
            Some(found) => cursor += found + part.len(),
            None => return false,
        }
    }
    true
}

/// A single compiled include or exclude pattern, plus whether it denotes a
/// directory (trailing `/`) or a file.
#[derive(Debug, Clone)]
pub struct GlobPattern {
    original: String,
    elements: Vec<Element>,
    pub is_dir_pattern: bool,
}

impl GlobPattern {
    pub fn parse(pattern: &str) -> Result<GlobPattern, BuildError> {
        if pattern.contains('?') {
            return Err(BuildError::user(format!(
                "invalid pattern (\"?\" is not supported): {pattern}"
            )));
        }
        if pattern.contains('\\') {
            return Err(BuildError::user(format!(
                "invalid pattern (must use forward slashes not backslashes): {pattern}"
            )));
        }

        let mut normalized = pattern.to_string();
        if let Some(stripped) = normalized.strip_suffix("**/*") {
            normalized = format!("{stripped}**");
        }

        let is_dir_pattern = normalized.ends_with('/');
        let body = if is_dir_pattern {
            &normalized[..normalized.len() - 1]
        } else {
            normalized.as_str()
        };
        if body.is_empty() {
            return Err(BuildError::user(format!(
                "invalid pattern (empty): {pattern}"
            )));
        }

        let mut elements = Vec::new();
        for raw in body.split('/') {
            if raw.contains("**") && raw != "**" {
                return Err(BuildError::user(format!(
                    "invalid pattern (pattern elements containing \"**\" must not have any other characters): {pattern}"
                )));
            }
            elements.push(match raw {
                "*" => Element::Star,
                "**" => Element::DoubleStar,
                other => Element::Literal(other.to_string()),
            });
        }

        Ok(GlobPattern {
            original: pattern.to_string(),
            elements,
            is_dir_pattern,
        })
    }

    /// Whether this pattern is exactly `**` (matches every file) or `**/`
    /// (matches every directory) — the fast-path cases the matcher
    /// special-cases.
    fn is_match_everything(&self) -> bool {
        self.elements.len() == 1 && self.elements[0] == Element::DoubleStar
    }

    fn matches_elements(&self, candidate: &[&str]) -> bool {
        match_from(&self.elements, candidate)
    }
}

fn match_from(pattern: &[Element], path: &[&str]) -> bool {
    match pattern.split_first() {
        None => path.is_empty(),
        Some((Element::DoubleStar, rest)) => {
            if rest.is_empty() {
                return true;
            }
            (0..=path.len()).any(|skip| match_from(rest, &path[skip..]))
        }
        Some((head, rest)) => match path.split_first() {
            None => false,
            Some((first, path_rest)) => {
                let head_matches = match head {
                    Element::Star => true,
                    Element::Literal(lit) => element_match(lit, first),
                    Element::DoubleStar => unreachable!(),
                };
                head_matches && match_from(rest, path_rest)
            }
        },
    }
}

/// A set of include and exclude patterns, matched together: a path matches
/// the set iff it matches at least one include pattern and no exclude
/// pattern. Unused includes (patterns that never matched anything across a
/// full call to [`GlobPatternSet::matches_any`] over a candidate listing) can
/// be detected via [`GlobPatternSet::unused_includes`].
pub struct GlobPatternSet {
    includes: Vec<GlobPattern>,
    excludes: Vec<GlobPattern>,
    used: Vec<std::sync::atomic::AtomicBool>,
}

impl GlobPatternSet {
    pub fn create(includes: &[String], excludes: &[String]) -> Result<GlobPatternSet, BuildError> {
        let includes = includes
            .iter()
            .filter(|p| !p.is_empty())
            .map(|p| GlobPattern::parse(p))
            .collect::<Result<Vec<_>, _>>()?;
        let excludes = excludes
            .iter()
            .filter(|p| !p.is_empty())
            .map(|p| GlobPattern::parse(p))
            .collect::<Result<Vec<_>, _>>()?;
        let used = includes.iter().map(|_| std::sync::atomic::AtomicBool::new(false)).collect();
        Ok(GlobPatternSet {
            includes,
            excludes,
            used,
        })
    }

    /// Matches a single relative path (file or directory, matching
    /// `is_dir` against each pattern's own file-vs-directory kind) against
    /// this set, recording which include pattern (if any) was responsible.
    pub fn matches(&self, relative: &Path, is_dir: bool) -> bool {
        let elements: Vec<&str> = relative
            .to_str()
            .into_iter()
            .flat_map(|s| s.trim_end_matches('/').split('/'))
            .collect();

        let matched_include = self.includes.iter().enumerate().find(|(_, pat)| {
            pat.is_dir_pattern == is_dir
                && (pat.is_match_everything() || pat.matches_elements(&elements))
        });
        let Some((idx, _)) = matched_include else {
            return false;
        };
        self.used[idx].store(true, std::sync::atomic::Ordering::Relaxed);

        !self.excludes.iter().any(|pat| {
            pat.is_dir_pattern == is_dir
                && (pat.is_match_everything() || pat.matches_elements(&elements))
        })
    }

    /// Include patterns that never matched any candidate passed to
    /// [`matches`](Self::matches). A non-empty result is reported by the
    /// caller as a resolution error ("include pattern matched nothing").
    pub fn unused_includes(&self) -> Vec<&str> {
        self.includes
            .iter()
            .zip(&self.used)
            .filter(|(_, used)| !used.load(std::sync::atomic::Ordering::Relaxed))
            .map(|(pat, _)| pat.original.as_str())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_question_mark() {
        assert!(GlobPattern::parse("a?b").is_err());
    }

    #[test]
    fn rejects_backslash() {
        assert!(GlobPattern::parse("a\\b").is_err());
    }

    #[test]
    fn double_star_matches_any_depth() {
        let pat = GlobPattern::parse("src/**/*.rs").unwrap();
        assert!(pat.matches_elements(&["src", "a", "b", "c.rs"]));
        assert!(pat.matches_elements(&["src", "c.rs"]));
        assert!(!pat.matches_elements(&["other", "c.rs"]));
    }

    #[test]
    fn star_does_not_cross_separators() {
        let pat = GlobPattern::parse("src/*.rs").unwrap();
        assert!(pat.matches_elements(&["src", "c.rs"]));
        assert!(!pat.matches_elements(&["src", "a", "c.rs"]));
    }

    #[test]
    fn normalizes_starstar_star_suffix() {
        let pat = GlobPattern::parse("src/**/*").unwrap();
        assert!(pat.is_match_everything() || pat.matches_elements(&["src", "a", "b"]));
    }

    #[test]
    fn set_matches_respects_excludes() {
        let set = GlobPatternSet::create(
            &["**/*.rs".to_string()],
            &["**/generated/**".to_string()],
        )
        .unwrap();
        assert!(set.matches(Path::new("src/lib.rs"), false));
        assert!(!set.matches(Path::new("src/generated/lib.rs"), false));
    }

    #[test]
    fn unused_include_is_tracked() {
        let set = GlobPatternSet::create(&["*.md".to_string()], &[]).unwrap();
        assert!(!set.matches(Path::new("a.rs"), false));
        assert_eq!(set.unused_includes(), vec!["*.md"]);
    }
}

// Copyright 2026 xbuild contributors (see CONTRIBUTORS.md).
// Licensed under the Apache License, Version 2.0 (see LICENSE).

//! Copies a resolved [`PathSet`] to a destination file or directory.
//! Grounded in `targets/copy.py` of the original implementation: a directory
//! destination (name ending `/`) copies every matched source under its
//! resolved relative destination; a file destination requires exactly one
//! source.

use std::path::{Path, PathBuf};

use xbuild_errors::BuildError;
use xbuild_graph::{BuildContext, PathSet, Target};

/// Target kind that copies one or more source files to a destination.
pub struct Copy {
    src: PathSet,
}

impl Copy {
    pub fn new(src: PathSet) -> Self {
        Copy { src }
    }
}

impl Target for Copy {
    fn run(&self, ctx: &BuildContext, target_name: &str) -> Result<(), BuildError> {
        let target = ctx.target(target_name)?;
        let dest_path = &target.path;
        let resolved = self.src.resolve_with_destinations(ctx)?;

        if !xbuild_fs::is_dir_path(dest_path) {
            if resolved.len() != 1 {
                return Err(BuildError::user(format!(
                    "Copy destination \"{target_name}\" must be a directory (ending with \"/\") when multiple sources are specified (found {})",
                    resolved.len()
                )));
            }
            let (src, _mapped_dest) = &resolved[0];
            if xbuild_fs::is_dir_path(&src.to_string_lossy()) {
                return Err(BuildError::user(format!(
                    "Copy source must be a file, not a directory: {}",
                    src.display()
                )));
            }
            if let Some(parent) = Path::new(dest_path).parent() {
                std::fs::create_dir_all(parent)
                    .map_err(|e| BuildError::user(format!("failed to create directory for {target_name}: {e}")))?;
            }
            copy_file(src, Path::new(dest_path))?;
            return Ok(());
        }

        let mut last_dir_created: Option<PathBuf> = None;
        for (src_abs, dest_rel) in &resolved {
            if dest_rel.components().any(|c| c == std::path::Component::ParentDir) {
                return Err(BuildError::user(
                    "Copy target must not use \"..\" in a relative destination".to_string(),
                ));
            }
            let dest = Path::new(dest_path).join(dest_rel);

            if xbuild_fs::is_dir_path(&src_abs.to_string_lossy()) {
                std::fs::create_dir_all(&dest)
                    .map_err(|e| BuildError::user(format!("failed to create directory {}: {e}", dest.display())))?;
                continue;
            }

            let parent = dest.parent().map(Path::to_path_buf).unwrap_or_default();
            if last_dir_created.as_deref() != Some(parent.as_path()) {
                std::fs::create_dir_all(&parent)
                    .map_err(|e| BuildError::user(format!("failed to create directory {}: {e}", parent.display())))?;
                last_dir_created = Some(parent);
            }

            copy_file(src_abs, &dest)?;
        }

        Ok(())
    }

    fn hashable_implicit_inputs(&self, ctx: &BuildContext, _target_name: &str) -> Vec<String> {
        // A textual summary of the resolved (src, dest) pairs: changes to
        // what's being copied, or where it lands, must force a rebuild even
        // when no individual source file's mtime has changed.
        match self.src.resolve_with_destinations(ctx) {
            Ok(resolved) => {
                let mut lines: Vec<String> = resolved
                    .iter()
                    .map(|(src, dest)| format!("{} -> {}", src.display(), dest.display()))
                    .collect();
                lines.sort();
                lines
            }
            Err(_) => Vec::new(),
        }
    }
}

fn copy_file(src: &Path, dest: &Path) -> Result<(), BuildError> {
    std::fs::copy(src, dest)
        .map(|_| ())
        .map_err(|e| BuildError::user(format!("error copying \"{}\" to \"{}\": {e}", src.display(), dest.display())))
}

#[cfg(test)]
mod tests {
    use super::*;
    use xbuild_graph::{InitializationContext, TargetSpec};

    fn base_ctx(root: &std::path::Path) -> InitializationContext {
        let mut init = InitializationContext::new(root.to_path_buf());
        init.define_property("OUTPUT_DIR", root.to_string_lossy().into_owned());
        init.define_property("BUILD_WORK_DIR", root.join("BUILD_WORK").to_string_lossy().into_owned());
        init
    }

    #[test]
    fn copies_single_file_to_file_dest() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("a.txt");
        std::fs::write(&src, "content").unwrap();
        let dest = dir.path().join("b.txt");

        let mut init = base_ctx(dir.path());
        init.register_target(TargetSpec::new(
            dest.to_string_lossy().into_owned(),
            PathSet::literal(".", vec![]),
            Copy::new(PathSet::literal(".", vec![src.to_string_lossy().into_owned()])),
        ));
        let ctx = init.freeze().unwrap();
        let name = dest.to_string_lossy().into_owned();
        let target = ctx.target(&name).unwrap();
        target.spec.action.run(&ctx, &name).unwrap();

        assert_eq!(std::fs::read_to_string(&dest).unwrap(), "content");
    }

    #[test]
    fn multiple_sources_into_file_dest_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let a = dir.path().join("a.txt");
        let b = dir.path().join("b.txt");
        std::fs::write(&a, "1").unwrap();
        std::fs::write(&b, "2").unwrap();
        let dest = dir.path().join("out.txt");

        let mut init = base_ctx(dir.path());
        init.register_target(TargetSpec::new(
            dest.to_string_lossy().into_owned(),
            PathSet::literal(".", vec![]),
            Copy::new(PathSet::literal(
                ".",
                vec![a.to_string_lossy().into_owned(), b.to_string_lossy().into_owned()],
            )),
        ));
        let ctx = init.freeze().unwrap();
        let name = dest.to_string_lossy().into_owned();
        let target = ctx.target(&name).unwrap();
        let err = target.spec.action.run(&ctx, &name).unwrap_err();
        assert!(err.to_string().contains("must be a directory"));
    }

    #[test]
    fn copies_into_directory_dest_preserving_relative_names() {
        let dir = tempfile::tempdir().unwrap();
        let a = dir.path().join("a.txt");
        std::fs::write(&a, "1").unwrap();
        let dest_dir = dir.path().join("out/");

        let mut init = base_ctx(dir.path());
        init.register_target(TargetSpec::new(
            dest_dir.to_string_lossy().into_owned(),
            PathSet::literal(".", vec![]),
            Copy::new(PathSet::literal(".", vec![a.to_string_lossy().into_owned()])),
        ));
        let ctx = init.freeze().unwrap();
        let name = dest_dir.to_string_lossy().into_owned();
        let target = ctx.target(&name).unwrap();
        target.spec.action.run(&ctx, &name).unwrap();

        assert_eq!(std::fs::read_to_string(dir.path().join("out/a.txt")).unwrap(), "1");
    }
}

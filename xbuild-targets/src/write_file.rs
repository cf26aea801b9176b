// Copyright 2026 xbuild contributors (see CONTRIBUTORS.md).
// Licensed under the Apache License, Version 2.0 (see LICENSE).

//! Writes a fixed (property-expanded) string to a file. Grounded in
//! `targets/writefile.py` of the original implementation: the file is only
//! rewritten if its content actually changes, and the literal content is
//! itself an implicit input, so editing the build script is enough to force
//! a rebuild without touching the filesystem.

use std::os::unix::fs::PermissionsExt;

use xbuild_errors::BuildError;
use xbuild_graph::{BuildContext, Target};

/// Target kind that materializes a hardcoded string as a file.
///
/// `contents` is subject to `${VAR}` property expansion at run time, not at
/// registration time, so it can reference properties set or overridden after
/// the target was declared.
pub struct WriteFile {
    contents: String,
    mode: Option<u32>,
    executable: bool,
}

impl WriteFile {
    pub fn new(contents: impl Into<String>) -> Self {
        WriteFile {
            contents: contents.into(),
            mode: None,
            executable: false,
        }
    }

    pub fn with_mode(mut self, mode: u32) -> Self {
        self.mode = Some(mode);
        self
    }

    pub fn executable(mut self) -> Self {
        self.executable = true;
        self
    }

    fn resolved_contents(&self, ctx: &BuildContext) -> Result<String, BuildError> {
        ctx.properties().expand(&self.contents)
    }
}

impl Target for WriteFile {
    fn run(&self, ctx: &BuildContext, target_name: &str) -> Result<(), BuildError> {
        let target = ctx.target(target_name)?;
        let contents = self.resolved_contents(ctx)?;
        let path = std::path::Path::new(&target.path);

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| BuildError::user(format!("failed to create directory for {target_name}: {e}")))?;
        }
        std::fs::write(path, &contents).map_err(|e| BuildError::user(format!("failed to write {target_name}: {e}")))?;

        if self.executable || self.mode.is_some() {
            let mode = self.mode.unwrap_or(0o755);
            std::fs::set_permissions(path, std::fs::Permissions::from_mode(mode))
                .map_err(|e| BuildError::user(format!("failed to chmod {target_name}: {e}")))?;
        }

        Ok(())
    }

    fn hashable_implicit_inputs(&self, ctx: &BuildContext, _target_name: &str) -> Vec<String> {
        let contents = self.resolved_contents(ctx).unwrap_or_default();
        vec![contents, format!("mode: {:?}, executable: {}", self.mode, self.executable)]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use xbuild_graph::{InitializationContext, PathSet, TargetSpec};

    fn ctx_with(path: &std::path::Path) -> BuildContext {
        let mut init = InitializationContext::new(PathBuf::from("/root"));
        init.define_property("OUTPUT_DIR", path.to_string_lossy().into_owned());
        init.define_property("BUILD_WORK_DIR", path.join("BUILD_WORK").to_string_lossy().into_owned());
        init.register_target(TargetSpec::new(
            path.join("hello.txt").to_string_lossy().into_owned(),
            PathSet::literal(".", vec![]),
            WriteFile::new("hi"),
        ));
        init.freeze().unwrap()
    }

    #[test]
    fn writes_literal_content() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = ctx_with(dir.path());
        let name = dir.path().join("hello.txt").to_string_lossy().into_owned();
        let target = ctx.target(&name).unwrap();
        target.spec.action.run(&ctx, &name).unwrap();
        assert_eq!(std::fs::read_to_string(&target.path).unwrap(), "hi");
    }

    #[test]
    fn content_is_a_hashable_implicit_input() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = ctx_with(dir.path());
        let name = dir.path().join("hello.txt").to_string_lossy().into_owned();
        let target = ctx.target(&name).unwrap();
        let fingerprint = target.spec.action.hashable_implicit_inputs(&ctx, &name);
        assert_eq!(fingerprint[0], "hi");
    }

    #[test]
    fn expands_properties_in_contents() {
        let dir = tempfile::tempdir().unwrap();
        let mut init = InitializationContext::new(PathBuf::from("/root"));
        init.define_property("OUTPUT_DIR", dir.path().to_string_lossy().into_owned());
        init.define_property("BUILD_WORK_DIR", dir.path().join("BUILD_WORK").to_string_lossy().into_owned());
        init.define_property("GREETING", "hello");
        init.register_target(TargetSpec::new(
            dir.path().join("out.txt").to_string_lossy().into_owned(),
            PathSet::literal(".", vec![]),
            WriteFile::new("${GREETING} world"),
        ));
        let ctx = init.freeze().unwrap();
        let name = dir.path().join("out.txt").to_string_lossy().into_owned();
        let target = ctx.target(&name).unwrap();
        target.spec.action.run(&ctx, &name).unwrap();
        assert_eq!(std::fs::read_to_string(&target.path).unwrap(), "hello world");
    }
}

//! Per-invocation local scratch space.
//!
//! Backed by `tempfile::TempDir`, so the directory and everything written
//! into it is removed when the `Scratch` goes out of scope, on error paths
//! included.

use crate::domain::layout;
use crate::error::PipelineResult;
use std::path::{Path, PathBuf};
use tempfile::{Builder as TempFileBuilder, TempDir};
use tracing::debug;

#[derive(Debug)]
pub struct Scratch {
    dir: TempDir,
}

impl Scratch {
    /// New directory under `root`, prefixed by the stage and triggering key.
    pub fn create(root: &Path, stage: &str, key: &str) -> PipelineResult<Self> {
        std::fs::create_dir_all(root)?;
        let dir = TempFileBuilder::new()
            .prefix(&layout::scratch_prefix(stage, key))
            .tempdir_in(root)?;
        debug!(path = %dir.path().display(), "created scratch directory");
        Ok(Self { dir })
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Path of `name` inside a sub-directory, creating the sub-directory.
    pub async fn file_in(&self, sub_dir: &str, name: &str) -> PipelineResult<PathBuf> {
        let dir = self.subdir(sub_dir).await?;
        Ok(dir.join(name))
    }

    pub async fn subdir(&self, name: &str) -> PipelineResult<PathBuf> {
        let dir = self.dir.path().join(name);
        tokio::fs::create_dir_all(&dir).await?;
        Ok(dir)
    }
}

impl Drop for Scratch {
    fn drop(&mut self) {
        debug!(path = %self.dir.path().display(), "releasing scratch directory");
    }
}

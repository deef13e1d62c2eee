//! Probe and stream-copy transcode operations.

use crate::domain::planner::SegmentWindow;
use crate::error::PortError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MediaInfo {
    pub duration_seconds: f64,
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MediaPort: Send + Sync {
    async fn probe(&self, path: &Path) -> Result<MediaInfo, PortError>;

    /// Cut `input` into one file per window inside `output_dir`, named after
    /// `parent_key`. Returns the produced files.
    async fn segment(
        &self,
        input: &Path,
        windows: &[SegmentWindow],
        output_dir: &Path,
        parent_key: &str,
    ) -> Result<Vec<PathBuf>, PortError>;

    async fn trim(&self, input: &Path, start: f64, end: f64, output: &Path)
        -> Result<(), PortError>;

    /// Join `inputs` in the given order into `output`.
    async fn concat(&self, inputs: &[PathBuf], output: &Path) -> Result<(), PortError>;

    /// Timestamps, in seconds, where the picture changes scene.
    async fn scene_cuts(&self, input: &Path) -> Result<Vec<f64>, PortError>;
}

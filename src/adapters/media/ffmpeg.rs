//! MediaPort backed by FFmpeg.
//!
//! Probing goes through the `ffmpeg-next` bindings on a blocking thread;
//! cutting, joining and scene detection shell out to the `ffmpeg` binary with
//! stream copy, so no payload is re-encoded.

use crate::domain::layout;
use crate::domain::planner::SegmentWindow;
use crate::error::PortError;
use crate::ports::media::{MediaInfo, MediaPort};
use async_trait::async_trait;
use ffmpeg_next as ffmpeg;
use regex::Regex;
use std::path::{Path, PathBuf};
use std::process::Output;
use tokio::process::Command;
use tokio::task;
use tracing::debug;

/// Microseconds per second, the unit of container durations.
const AV_TIME_BASE: f64 = 1_000_000.0;
const DEFAULT_SCENE_THRESHOLD: f64 = 0.4;
/// Lines of stderr kept in error messages.
const STDERR_TAIL: usize = 8;

#[derive(Clone, Debug)]
pub struct FfmpegAdapter {
    binary: PathBuf,
    scene_threshold: f64,
}

impl Default for FfmpegAdapter {
    fn default() -> Self {
        Self {
            binary: PathBuf::from("ffmpeg"),
            scene_threshold: DEFAULT_SCENE_THRESHOLD,
        }
    }
}

impl FfmpegAdapter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_scene_threshold(mut self, threshold: f64) -> Self {
        self.scene_threshold = threshold;
        self
    }

    fn command(&self) -> Command {
        let mut command = Command::new(&self.binary);
        command.arg("-hide_banner").arg("-nostdin").arg("-y");
        command
    }

    /// `[start, start + duration)` of `input` into `output`, stream-copied.
    async fn copy_range(
        &self,
        input: &Path,
        start: f64,
        duration: f64,
        output: &Path,
    ) -> Result<(), PortError> {
        let mut command = self.command();
        command
            .arg("-ss")
            .arg(format!("{:.3}", start))
            .arg("-i")
            .arg(input)
            .arg("-t")
            .arg(format!("{:.3}", duration))
            .arg("-map")
            .arg("0")
            .arg("-c")
            .arg("copy")
            .arg("-avoid_negative_ts")
            .arg("make_zero")
            .arg(output);
        run(command).await?;
        Ok(())
    }
}

async fn run(mut command: Command) -> Result<Output, PortError> {
    debug!(command = ?command.as_std(), "running ffmpeg");
    let output = command.output().await?;
    if !output.status.success() {
        return Err(format!(
            "ffmpeg exited with {}: {}",
            output.status,
            stderr_tail(&output.stderr)
        )
        .into());
    }
    Ok(output)
}

fn stderr_tail(stderr: &[u8]) -> String {
    let text = String::from_utf8_lossy(stderr);
    let lines: Vec<&str> = text.lines().filter(|l| !l.trim().is_empty()).collect();
    lines[lines.len().saturating_sub(STDERR_TAIL)..].join(" | ")
}

/// Manifest for the concat demuxer. Single quotes inside paths are escaped
/// the way the demuxer expects.
pub fn concat_manifest(inputs: &[PathBuf]) -> String {
    inputs
        .iter()
        .map(|path| {
            let escaped = path.to_string_lossy().replace('\'', r"'\''");
            format!("file '{}'\n", escaped)
        })
        .collect()
}

/// Frame timestamps reported by the `showinfo` filter.
pub fn parse_scene_cuts(stderr: &str) -> Result<Vec<f64>, PortError> {
    let pattern = Regex::new(r"pts_time:\s*([0-9]+(?:\.[0-9]+)?)")?;
    let mut cuts: Vec<f64> = pattern
        .captures_iter(stderr)
        .filter_map(|c| c.get(1)?.as_str().parse().ok())
        .collect();
    cuts.sort_by(|a, b| a.total_cmp(b));
    cuts.dedup();
    Ok(cuts)
}

#[async_trait]
impl MediaPort for FfmpegAdapter {
    async fn probe(&self, path: &Path) -> Result<MediaInfo, PortError> {
        let path = path.to_path_buf();
        task::spawn_blocking(move || -> Result<MediaInfo, PortError> {
            ffmpeg::init()?;
            let context = ffmpeg::format::input(&path)?;
            let duration = context.duration();
            if duration <= 0 {
                return Err(format!("{} reports no duration", path.display()).into());
            }
            Ok(MediaInfo {
                duration_seconds: duration as f64 / AV_TIME_BASE,
            })
        })
        .await?
    }

    async fn segment(
        &self,
        input: &Path,
        windows: &[SegmentWindow],
        output_dir: &Path,
        parent_key: &str,
    ) -> Result<Vec<PathBuf>, PortError> {
        let mut produced = Vec::with_capacity(windows.len());
        for window in windows {
            let output = output_dir.join(layout::segment_file_name(parent_key, window.index));
            self.copy_range(
                input,
                window.start_offset_seconds,
                window.duration_seconds,
                &output,
            )
            .await
            .map_err(|e| format!("segment {}: {}", window.index, e))?;
            produced.push(output);
        }
        Ok(produced)
    }

    async fn trim(&self, input: &Path, start: f64, end: f64, output: &Path) -> Result<(), PortError> {
        self.copy_range(input, start, end - start, output).await
    }

    async fn concat(&self, inputs: &[PathBuf], output: &Path) -> Result<(), PortError> {
        let manifest = output.with_extension("concat.txt");
        tokio::fs::write(&manifest, concat_manifest(inputs)).await?;

        let mut command = self.command();
        command
            .arg("-f")
            .arg("concat")
            .arg("-safe")
            .arg("0")
            .arg("-i")
            .arg(&manifest)
            .arg("-c")
            .arg("copy")
            .arg(output);
        let result = run(command).await;

        if let Err(e) = tokio::fs::remove_file(&manifest).await {
            debug!(error = %e, "concat manifest already gone");
        }
        result.map(drop)
    }

    async fn scene_cuts(&self, input: &Path) -> Result<Vec<f64>, PortError> {
        let mut command = self.command();
        command
            .arg("-i")
            .arg(input)
            .arg("-an")
            .arg("-filter:v")
            .arg(format!("select='gt(scene,{})',showinfo", self.scene_threshold))
            .arg("-f")
            .arg("null")
            .arg("-");
        let output = run(command).await?;
        parse_scene_cuts(&String::from_utf8_lossy(&output.stderr))
    }
}

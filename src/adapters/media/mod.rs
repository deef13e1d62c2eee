//! Media collaborators.

pub mod ffmpeg;

pub use ffmpeg::FfmpegAdapter;

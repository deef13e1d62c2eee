//! Error taxonomy of the pipeline.

use crate::domain::analysis::{Stage, StageOrderError};
use crate::domain::clips::InvalidClip;
use thiserror::Error;

/// Opaque failure reported by an adapter behind a port.
pub type PortError = Box<dyn std::error::Error + Send + Sync>;

pub type PipelineResult<T> = Result<T, PipelineError>;

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Dependency unavailable: {0}")]
    UnavailableDependency(String),

    #[error("Probe failed: {0}")]
    ProbeFailure(String),

    #[error("Transcode failed: {0}")]
    TranscodeFailure(String),

    #[error("Transcription failed: {0}")]
    TranscriptionFailure(String),

    #[error("Render failed: {0}")]
    RenderFailure(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Queue error: {0}")]
    Queue(String),

    #[error("Task repository error: {0}")]
    Repository(String),

    #[error("Inference failed: {0}")]
    Inference(String),

    #[error("Task not found: {0}")]
    TaskNotFound(String),

    #[error("Object not found: {0}")]
    ObjectNotFound(String),

    #[error(transparent)]
    Chain(#[from] ChainError),

    #[error(transparent)]
    InvalidClip(#[from] InvalidClip),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl PipelineError {
    pub fn unavailable(msg: impl Into<String>) -> Self {
        Self::UnavailableDependency(msg.into())
    }

    pub fn probe(msg: impl Into<String>) -> Self {
        Self::ProbeFailure(msg.into())
    }

    pub fn transcode(msg: impl Into<String>) -> Self {
        Self::TranscodeFailure(msg.into())
    }

    pub fn render(msg: impl Into<String>) -> Self {
        Self::RenderFailure(msg.into())
    }

    pub fn storage(msg: impl Into<String>) -> Self {
        Self::Storage(msg.into())
    }

    pub fn queue(msg: impl Into<String>) -> Self {
        Self::Queue(msg.into())
    }

    pub fn repository(msg: impl Into<String>) -> Self {
        Self::Repository(msg.into())
    }
}

/// Failure of an analysis chain, attributed to the stage that raised it.
#[derive(Debug, Error)]
#[error("Stage {stage} failed: {message}")]
pub struct ChainError {
    pub stage: Stage,
    pub message: String,
}

impl ChainError {
    pub fn new(stage: Stage, message: impl Into<String>) -> Self {
        Self {
            stage,
            message: message.into(),
        }
    }
}

impl From<StageOrderError> for ChainError {
    fn from(err: StageOrderError) -> Self {
        Self::new(err.attempted, err.to_string())
    }
}

use crate::domain::analysis::Transcript;
use crate::error::PortError;
use async_trait::async_trait;
use std::path::Path;

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SpeechPort: Send + Sync {
    /// Speech-to-text with word-level timestamps
    async fn transcribe(&self, path: &Path) -> Result<Transcript, PortError>;
}

//! Questions over a stored transcript, answered by the inference backend.

use crate::domain::analysis::Transcript;
use crate::domain::clips::{parse_clips_lenient, Clip};
use crate::domain::credentials::{mask, CredentialPool};
use crate::error::{PipelineError, PipelineResult, PortError};
use crate::ports::inference::{InferenceError, InferencePort};
use crate::ports::storage::StoragePort;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, warn};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum QueryOutcome {
    Answered { answer: String, clips: Vec<Clip> },
    /// Every key is cooling down, or none were configured.
    NoKeyAvailable,
}

pub struct QueryService<S, I> {
    storage: S,
    inference: I,
    keys: Arc<CredentialPool>,
}

impl<S, I> QueryService<S, I>
where
    S: StoragePort,
    I: InferencePort,
{
    pub fn new(storage: S, inference: I, keys: Arc<CredentialPool>) -> Self {
        Self {
            storage,
            inference,
            keys,
        }
    }

    pub fn keys(&self) -> &CredentialPool {
        &self.keys
    }

    /// Ask `question` about the transcript stored at `transcript_key`.
    ///
    /// A rate-limited key is benched and the next one tried, at most once
    /// per key in the pool.
    pub async fn query(
        &self,
        bucket: &str,
        transcript_key: &str,
        question: &str,
    ) -> PipelineResult<QueryOutcome> {
        let body = match self.storage.get(bucket, transcript_key).await {
            Ok(body) => body,
            Err(e) => return Err(self.read_error(bucket, transcript_key, e).await),
        };
        let transcript: Transcript = serde_json::from_slice(&body)?;

        let attempts = self.keys.len().max(1);
        for attempt in 1..=attempts {
            let Some(key) = self.keys.get_key() else {
                warn!(transcript_key, "no inference key available");
                return Ok(QueryOutcome::NoKeyAvailable);
            };

            match self
                .inference
                .query(&key, &transcript.text, question)
                .await
            {
                Ok(answer) => {
                    let clips = parse_clips_lenient(&answer.clips_json);
                    info!(
                        transcript_key,
                        key = %mask(&key),
                        clips = clips.len(),
                        "query answered"
                    );
                    return Ok(QueryOutcome::Answered {
                        answer: answer.answer_text,
                        clips,
                    });
                }
                Err(InferenceError::RateLimited(detail)) => {
                    warn!(key = %mask(&key), attempt, %detail, "key rate limited, rotating");
                    self.keys.report_failure(&key);
                }
                Err(InferenceError::Failed(detail)) => {
                    return Err(PipelineError::Inference(detail));
                }
            }
        }
        Ok(QueryOutcome::NoKeyAvailable)
    }

    /// A failed read of a key that is not listed is reported as not found.
    async fn read_error(&self, bucket: &str, key: &str, err: PortError) -> PipelineError {
        match self.storage.list_by_prefix(bucket, key).await {
            Ok(keys) if !keys.iter().any(|k| k == key) => {
                PipelineError::ObjectNotFound(key.to_string())
            }
            _ => PipelineError::storage(format!("reading {}: {}", key, err)),
        }
    }
}

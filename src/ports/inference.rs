use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq)]
pub struct InferenceAnswer {
    pub answer_text: String,
    /// Expected to hold a JSON array of `{start, end}` objects.
    pub clips_json: String,
}

#[derive(Debug, Error)]
pub enum InferenceError {
    /// The key hit its quota; another key may still succeed.
    #[error("rate limited: {0}")]
    RateLimited(String),

    #[error("{0}")]
    Failed(String),
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait InferencePort: Send + Sync {
    async fn query(
        &self,
        api_key: &str,
        context: &str,
        question: &str,
    ) -> Result<InferenceAnswer, InferenceError>;
}

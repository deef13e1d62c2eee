//! HTTP clients for hosted speech-to-text and language models.

pub mod gemini;
pub mod speech;

pub use gemini::GeminiClient;
pub use speech::HttpTranscriber;

/// Strip a markdown code fence the model may wrap JSON in.
pub(crate) fn strip_code_fence(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let rest = rest.strip_prefix("json").unwrap_or(rest);
    rest.strip_suffix("```").unwrap_or(rest).trim()
}

//! InferencePort over the Gemini `generateContent` REST endpoint.
//!
//! The key is chosen per call by the credential pool, so one client serves
//! every key. A 429 is surfaced as [`InferenceError::RateLimited`] to let the
//! caller rotate.

use super::strip_code_fence;
use crate::ports::inference::{InferenceAnswer, InferenceError, InferencePort};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

pub const DEFAULT_MODEL: &str = "gemini-2.5-pro";
const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(120);
const API_KEY_HEADER: &str = "x-goog-api-key";

#[derive(Serialize)]
struct GenerateRequest {
    contents: Vec<Content>,
    #[serde(rename = "generationConfig")]
    generation_config: GenerationConfig,
}

#[derive(Serialize)]
struct Content {
    parts: Vec<Part>,
}

#[derive(Serialize)]
struct Part {
    text: String,
}

#[derive(Serialize)]
struct GenerationConfig {
    #[serde(rename = "responseMimeType")]
    response_mime_type: &'static str,
}

#[derive(Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Deserialize)]
struct CandidatePart {
    text: Option<String>,
}

#[derive(Deserialize)]
struct ModelReply {
    #[serde(default)]
    answer: String,
    #[serde(default)]
    clips: serde_json::Value,
}

#[derive(Clone)]
pub struct GeminiClient {
    client: Client,
    model: String,
    base_url: String,
}

impl GeminiClient {
    pub fn new(model: impl Into<String>) -> Result<Self, reqwest::Error> {
        let client = Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        Ok(Self {
            client,
            model: model.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
        })
    }

    /// Point at another host, e.g. a recording proxy.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/models/{}:generateContent",
            self.base_url.trim_end_matches('/'),
            self.model
        )
    }
}

fn build_prompt(context: &str, question: &str) -> String {
    format!(
        "You are given the full transcript of a video and a question about it.\n\
         Answer conversationally, using only the transcript, and list the video \
         clips that support the answer.\n\n\
         Respond with a JSON object of the form \
         {{\"answer\": string, \"clips\": [{{\"start\": seconds, \"end\": seconds}}]}}.\n\n\
         TRANSCRIPT:\n{}\n\nQUESTION:\n{}",
        context, question
    )
}

/// First text part of the first candidate.
fn response_text(response: GenerateResponse) -> Option<String> {
    response
        .candidates
        .into_iter()
        .filter_map(|c| c.content)
        .flat_map(|c| c.parts)
        .find_map(|p| p.text)
}

/// Split the model's reply into answer text and the raw clips array.
///
/// A reply that is not the requested object is kept whole as the answer
/// with no clips.
fn parse_reply(text: &str) -> InferenceAnswer {
    let body = strip_code_fence(text);
    match serde_json::from_str::<ModelReply>(body) {
        Ok(reply) => InferenceAnswer {
            answer_text: reply.answer,
            clips_json: match reply.clips {
                serde_json::Value::Null => "[]".to_string(),
                clips => clips.to_string(),
            },
        },
        Err(e) => {
            warn!(error = %e, "model reply is not a JSON object");
            InferenceAnswer {
                answer_text: body.to_string(),
                clips_json: "[]".to_string(),
            }
        }
    }
}

#[async_trait]
impl InferencePort for GeminiClient {
    async fn query(
        &self,
        api_key: &str,
        context: &str,
        question: &str,
    ) -> Result<InferenceAnswer, InferenceError> {
        let request = GenerateRequest {
            contents: vec![Content {
                parts: vec![Part {
                    text: build_prompt(context, question),
                }],
            }],
            generation_config: GenerationConfig {
                response_mime_type: "application/json",
            },
        };

        debug!(model = %self.model, context_len = context.len(), "querying gemini");
        let response = self
            .client
            .post(self.endpoint())
            .header(API_KEY_HEADER, api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| InferenceError::Failed(format!("request failed: {}", e.without_url())))?;

        let status = response.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            let body = response.text().await.unwrap_or_default();
            return Err(InferenceError::RateLimited(body));
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(InferenceError::Failed(format!("{}: {}", status, body)));
        }

        let parsed: GenerateResponse = response
            .json()
            .await
            .map_err(|e| {
                InferenceError::Failed(format!("undecodable response: {}", e.without_url()))
            })?;
        let text = response_text(parsed)
            .ok_or_else(|| InferenceError::Failed("response has no text candidate".into()))?;
        Ok(parse_reply(&text))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_reply_extracts_clips_array() {
        let answer = parse_reply(
            "```json\n{\"answer\": \"At the start.\", \"clips\": [{\"start\": 1.5, \"end\": 4}]}\n```",
        );
        assert_eq!(answer.answer_text, "At the start.");
        let clips: serde_json::Value = serde_json::from_str(&answer.clips_json).unwrap();
        assert_eq!(clips, serde_json::json!([{"start": 1.5, "end": 4}]));
    }

    #[test]
    fn test_parse_reply_without_clips() {
        let answer = parse_reply("{\"answer\": \"No.\"}");
        assert_eq!(answer.answer_text, "No.");
        assert_eq!(answer.clips_json, "[]");
    }

    #[test]
    fn test_plain_text_reply_is_the_answer() {
        let answer = parse_reply("I could not find that.");
        assert_eq!(answer.answer_text, "I could not find that.");
        assert_eq!(answer.clips_json, "[]");
    }

    #[test]
    fn test_response_text_takes_first_part() {
        let response: GenerateResponse = serde_json::from_value(serde_json::json!({
            "candidates": [{"content": {"parts": [{"text": "first"}, {"text": "second"}]}}]
        }))
        .unwrap();
        assert_eq!(response_text(response).as_deref(), Some("first"));

        let empty: GenerateResponse = serde_json::from_str("{}").unwrap();
        assert!(response_text(empty).is_none());
    }

    #[tokio::test]
    async fn test_connection_error_does_not_reveal_key() {
        let client = GeminiClient::new("gemini-test")
            .unwrap()
            .with_base_url("http://127.0.0.1:1/v1beta");
        let err = client
            .query("AIzaSECRETFULLKEY9876", "context", "question")
            .await
            .unwrap_err();
        assert!(matches!(err, InferenceError::Failed(_)));
        assert!(!err.to_string().contains("SECRETFULLKEY"));
    }

    #[test]
    fn test_endpoint_and_prompt() {
        let client = GeminiClient::new("gemini-test")
            .unwrap()
            .with_base_url("http://localhost:9000/v1beta/");
        assert_eq!(
            client.endpoint(),
            "http://localhost:9000/v1beta/models/gemini-test:generateContent"
        );
        let prompt = build_prompt("hello world", "what was said?");
        assert!(prompt.contains("TRANSCRIPT:\nhello world"));
        assert!(prompt.ends_with("QUESTION:\nwhat was said?"));
    }
}

//! SpeechPort over an OpenAI-compatible `/audio/transcriptions` endpoint.

use crate::domain::analysis::{Transcript, Word};
use crate::error::PortError;
use crate::ports::speech::SpeechPort;
use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::Client;
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info};

pub const DEFAULT_MODEL: &str = "whisper-1";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(15 * 60);

#[derive(Deserialize)]
struct VerboseTranscription {
    #[serde(default)]
    text: String,
    #[serde(default)]
    words: Vec<TimedWord>,
}

#[derive(Deserialize)]
struct TimedWord {
    word: String,
    start: f64,
    end: f64,
}

#[derive(Clone)]
pub struct HttpTranscriber {
    client: Client,
    url: String,
    api_key: Option<String>,
    model: String,
}

impl HttpTranscriber {
    pub fn new(url: impl Into<String>, api_key: Option<String>) -> Result<Self, reqwest::Error> {
        let client = Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        Ok(Self {
            client,
            url: url.into(),
            api_key,
            model: DEFAULT_MODEL.to_string(),
        })
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }
}

fn into_transcript(body: VerboseTranscription) -> Transcript {
    Transcript {
        text: body.text.trim().to_string(),
        words: body
            .words
            .into_iter()
            .map(|w| Word {
                word: w.word.trim().to_string(),
                start: w.start,
                end: w.end,
            })
            .filter(|w| !w.word.is_empty())
            .collect(),
    }
}

#[async_trait]
impl SpeechPort for HttpTranscriber {
    async fn transcribe(&self, path: &Path) -> Result<Transcript, PortError> {
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "audio".to_string());
        let bytes = tokio::fs::read(path).await?;
        debug!(file = %file_name, size = bytes.len(), "uploading for transcription");

        let form = Form::new()
            .part("file", Part::bytes(bytes).file_name(file_name))
            .text("model", self.model.clone())
            .text("response_format", "verbose_json")
            .text("timestamp_granularities[]", "word");

        let mut request = self.client.post(&self.url).multipart(form);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(format!("transcription service returned {}: {}", status, body).into());
        }

        let transcript = into_transcript(response.json().await?);
        info!(words = transcript.words.len(), "transcription received");
        Ok(transcript)
    }
}

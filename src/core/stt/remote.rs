//! Transcription through a WhisperX worker.
//!
//! `POST {base_url}/transcribe` as multipart with a `file` part and an optional
//! `language` field. The worker answers with a [`Transcription`] JSON body.

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::Client;
use reqwest::multipart::{Form, Part};
use tracing::{info, warn};

use super::base::{Transcriber, Transcription, TranscriptionError};

#[derive(Debug, Clone)]
pub struct RemoteTranscriberConfig {
    pub base_url: String,
    pub request_timeout: Duration,
}

impl Default for RemoteTranscriberConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:8002".to_string(),
            // Long recordings plus alignment can take minutes
            request_timeout: Duration::from_secs(300),
        }
    }
}

pub struct RemoteTranscriber {
    client: Client,
    config: RemoteTranscriberConfig,
}

impl RemoteTranscriber {
    pub fn new(config: RemoteTranscriberConfig) -> Result<Self, TranscriptionError> {
        let client = Client::builder()
            .timeout(config.request_timeout)
            .pool_max_idle_per_host(4)
            .build()
            .map_err(|e| TranscriptionError::Failed(format!("Failed to create HTTP client: {e}")))?;
        Ok(Self { client, config })
    }

    fn url(&self) -> String {
        format!("{}/transcribe", self.config.base_url.trim_end_matches('/'))
    }
}

#[async_trait]
impl Transcriber for RemoteTranscriber {
    async fn transcribe(
        &self,
        audio: Bytes,
        filename: Option<&str>,
        language: Option<&str>,
    ) -> Result<Transcription, TranscriptionError> {
        let size = audio.len();
        let part = Part::bytes(audio.to_vec()).file_name(filename.unwrap_or("audio.wav").to_string());

        let mut form = Form::new().part("file", part);
        if let Some(language) = language {
            form = form.text("language", language.to_string());
        }

        info!(
            "Sending {} bytes to transcription worker - language={}",
            size,
            language.unwrap_or("auto")
        );

        let response = self
            .client
            .post(self.url())
            .multipart(form)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    TranscriptionError::Timeout(self.config.request_timeout.as_millis() as u64)
                } else {
                    TranscriptionError::Failed(format!("Request failed: {e}"))
                }
            })?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| TranscriptionError::Failed(format!("Failed to read response: {e}")))?;

        if !status.is_success() {
            warn!("Transcription worker error ({}): {}", status, body);
            return Err(TranscriptionError::Failed(format!(
                "Worker error ({status}): {body}"
            )));
        }

        serde_json::from_str(&body).map_err(|e| TranscriptionError::InvalidResponse(e.to_string()))
    }
}

//! HTTP adapter for a model worker that keeps XTTS v2 resident on the
//! accelerator.
//!
//! # Worker API
//!
//! - `POST {base_url}/synthesize` with JSON `{ text, language, speaker_id }` or
//!   `{ text, language, speaker_wav }` (base64 WAV). Responds with a WAV body.
//! - `GET {base_url}/speakers` responds with `{ "speakers": [...] }`.
//! - Errors use `{ "error": { code, message, valid_options } }` where `code` is
//!   `invalid_speaker`, `unsupported_language` or anything else for inference
//!   failures.
//!
//! Both the synthesizer and the speaker discovery run against the same worker,
//! so listing speakers never loads a second copy of the model.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use parking_lot::RwLock;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::base::{SegmentSynthesizer, SynthesisError, SynthesisResult, VoiceSpec, validate_language};
use crate::core::audio::{AudioSegment, decode_wav};
use crate::core::cache::{DiscoveryError, SpeakerDiscovery};

/// Number of speaker names echoed back when a speaker id is rejected
const VALID_OPTIONS_HINT: usize = 10;

#[derive(Debug, Clone)]
pub struct RemoteModelConfig {
    pub base_url: String,
    /// Per-HTTP-call timeout, independent of the pipeline's chunk timeout
    pub request_timeout: Duration,
    /// Rate every returned segment is resampled to
    pub sample_rate: u32,
}

impl Default for RemoteModelConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:8001".to_string(),
            request_timeout: Duration::from_secs(120),
            sample_rate: 24000,
        }
    }
}

#[derive(Debug, Serialize)]
struct SynthesizeBody<'a> {
    text: &'a str,
    language: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    speaker_id: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    speaker_wav: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SpeakersBody {
    speakers: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct WorkerErrorBody {
    error: WorkerErrorDetail,
}

#[derive(Debug, Deserialize)]
struct WorkerErrorDetail {
    code: String,
    message: String,
    #[serde(default)]
    valid_options: Option<Vec<String>>,
}

pub struct RemoteSpeechModel {
    client: Client,
    config: RemoteModelConfig,
    /// Last speaker list seen from the worker, used to reject bad ids early
    known_speakers: RwLock<Option<Arc<Vec<String>>>>,
}

impl RemoteSpeechModel {
    pub fn new(config: RemoteModelConfig) -> Result<Self, SynthesisError> {
        let client = Client::builder()
            .timeout(config.request_timeout)
            .pool_max_idle_per_host(4)
            .build()
            .map_err(|e| {
                SynthesisError::InferenceError(format!("Failed to create HTTP client: {e}"))
            })?;

        Ok(Self {
            client,
            config,
            known_speakers: RwLock::new(None),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.config.base_url.trim_end_matches('/'), path)
    }

    fn check_speaker(&self, speaker_id: &str) -> SynthesisResult<()> {
        let known = self.known_speakers.read().clone();
        match known {
            Some(speakers) if !speakers.is_empty() && !speakers.iter().any(|s| s == speaker_id) => {
                Err(SynthesisError::InvalidVoice {
                    voice: speaker_id.to_string(),
                    valid_options: speakers.iter().take(VALID_OPTIONS_HINT).cloned().collect(),
                })
            }
            _ => Ok(()),
        }
    }

    fn map_transport_error(&self, e: reqwest::Error) -> SynthesisError {
        if e.is_timeout() {
            SynthesisError::Timeout(self.config.request_timeout.as_millis() as u64)
        } else {
            SynthesisError::InferenceError(format!("Request to model worker failed: {e}"))
        }
    }
}

fn map_worker_error(status: StatusCode, body: &str, voice: &VoiceSpec, language: &str) -> SynthesisError {
    let Ok(parsed) = serde_json::from_str::<WorkerErrorBody>(body) else {
        return SynthesisError::InferenceError(format!("Model worker error ({status}): {body}"));
    };

    match parsed.error.code.as_str() {
        "invalid_speaker" => SynthesisError::InvalidVoice {
            voice: voice.speaker_id().unwrap_or("reference_audio").to_string(),
            valid_options: parsed.error.valid_options.unwrap_or_default(),
        },
        "unsupported_language" => SynthesisError::UnsupportedLanguage(language.to_string()),
        _ => SynthesisError::InferenceError(parsed.error.message),
    }
}

#[async_trait]
impl SegmentSynthesizer for RemoteSpeechModel {
    async fn synthesize(
        &self,
        text: &str,
        voice: &VoiceSpec,
        language: &str,
    ) -> SynthesisResult<AudioSegment> {
        validate_language(language)?;

        let body = match voice {
            VoiceSpec::Builtin { speaker_id } => {
                self.check_speaker(speaker_id)?;
                SynthesizeBody {
                    text,
                    language,
                    speaker_id: Some(speaker_id),
                    speaker_wav: None,
                }
            }
            VoiceSpec::Clone { reference_audio } => SynthesizeBody {
                text,
                language,
                speaker_id: None,
                speaker_wav: Some(BASE64.encode(reference_audio)),
            },
        };

        debug!(
            "Synthesizing {} chars via model worker - voice={:?}, language={}",
            text.chars().count(),
            voice,
            language
        );

        let response = self
            .client
            .post(self.url("synthesize"))
            .json(&body)
            .send()
            .await
            .map_err(|e| self.map_transport_error(e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!("Model worker rejected synthesis ({}): {}", status, body);
            return Err(map_worker_error(status, &body, voice, language));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| self.map_transport_error(e))?;

        let (segment, info) = decode_wav(&bytes).map_err(|e| {
            SynthesisError::InferenceError(format!("Model worker returned invalid audio: {e}"))
        })?;

        if info.sample_rate == self.config.sample_rate {
            return Ok(segment);
        }
        debug!(
            "Resampling segment {} Hz -> {} Hz",
            info.sample_rate, self.config.sample_rate
        );
        segment
            .resample(self.config.sample_rate)
            .map_err(|e| SynthesisError::InferenceError(e.to_string()))
    }

    fn sample_rate(&self) -> u32 {
        self.config.sample_rate
    }
}

#[async_trait]
impl SpeakerDiscovery for RemoteSpeechModel {
    async fn discover_speakers(&self) -> Result<Vec<String>, DiscoveryError> {
        let response = self
            .client
            .get(self.url("speakers"))
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    DiscoveryError::Timeout(self.config.request_timeout)
                } else {
                    DiscoveryError::Failed(format!("Request to model worker failed: {e}"))
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(DiscoveryError::Failed(format!(
                "Model worker error ({status}): {body}"
            )));
        }

        let body: SpeakersBody = response
            .json()
            .await
            .map_err(|e| DiscoveryError::Failed(format!("Invalid speakers response: {e}")))?;

        info!("Discovered {} speakers from model worker", body.speakers.len());
        *self.known_speakers.write() = Some(Arc::new(body.speakers.clone()));
        Ok(body.speakers)
    }
}

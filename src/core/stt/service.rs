use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use tracing::info;

use super::base::{Transcriber, Transcription, TranscriptionError};
use super::languages::is_supported;

pub const DEFAULT_MAX_AUDIO_BYTES: usize = 100 * 1024 * 1024;

#[derive(Debug, Clone)]
pub struct TranscriptionConfig {
    pub max_audio_bytes: usize,
    pub timeout: Duration,
}

impl Default for TranscriptionConfig {
    fn default() -> Self {
        Self {
            max_audio_bytes: DEFAULT_MAX_AUDIO_BYTES,
            timeout: Duration::from_secs(300),
        }
    }
}

/// Request validation and timeout around a [`Transcriber`]
pub struct TranscriptionService {
    transcriber: Arc<dyn Transcriber>,
    config: TranscriptionConfig,
}

impl TranscriptionService {
    pub fn new(transcriber: Arc<dyn Transcriber>, config: TranscriptionConfig) -> Self {
        Self {
            transcriber,
            config,
        }
    }

    pub async fn transcribe(
        &self,
        audio: Bytes,
        filename: Option<&str>,
        language: Option<&str>,
    ) -> Result<Transcription, TranscriptionError> {
        if audio.is_empty() {
            return Err(TranscriptionError::EmptyAudio);
        }
        if audio.len() > self.config.max_audio_bytes {
            return Err(TranscriptionError::AudioTooLarge {
                size: audio.len(),
                max: self.config.max_audio_bytes,
            });
        }

        // Empty form fields mean auto-detect
        let language = language.map(str::trim).filter(|l| !l.is_empty());
        if let Some(code) = language {
            if !is_supported(code) {
                return Err(TranscriptionError::UnsupportedLanguage(code.to_string()));
            }
        }

        let call = self.transcriber.transcribe(audio, filename, language);
        let transcription = tokio::time::timeout(self.config.timeout, call)
            .await
            .map_err(|_| TranscriptionError::Timeout(self.config.timeout.as_millis() as u64))??;

        info!(
            "Transcription complete - chars={}, segments={}, words={}, language={}, duration={:.2}",
            transcription.text.chars().count(),
            transcription.segments.len(),
            transcription.word_count(),
            transcription.language,
            transcription.duration
        );
        Ok(transcription)
    }
}

use async_trait::async_trait;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// One word with aligned timestamps
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WordSegment {
    pub word: String,
    /// Seconds from the start of the audio
    pub start: f64,
    pub end: f64,
    /// Alignment confidence in `[0, 1]`
    pub score: f64,
}

/// Sentence-level span of the transcript
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranscriptSegment {
    pub text: String,
    pub start: f64,
    pub end: f64,
    #[serde(default)]
    pub words: Vec<WordSegment>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transcription {
    pub text: String,
    pub segments: Vec<TranscriptSegment>,
    /// Detected or requested language code
    pub language: String,
    /// Audio duration in seconds
    pub duration: f64,
}

impl Transcription {
    pub fn word_count(&self) -> usize {
        self.segments.iter().map(|s| s.words.len()).sum()
    }
}

#[derive(Debug, Clone, Error, PartialEq)]
pub enum TranscriptionError {
    #[error("Uploaded file is empty")]
    EmptyAudio,

    #[error("Audio too large ({size} bytes). Maximum: {max} bytes")]
    AudioTooLarge { size: usize, max: usize },

    #[error("Unsupported language: {0}")]
    UnsupportedLanguage(String),

    #[error("Transcription failed: {0}")]
    Failed(String),

    #[error("Transcription timed out after {0} ms")]
    Timeout(u64),

    #[error("Invalid transcription response: {0}")]
    InvalidResponse(String),
}

impl TranscriptionError {
    /// Errors the caller can fix by changing the request
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            TranscriptionError::EmptyAudio
                | TranscriptionError::AudioTooLarge { .. }
                | TranscriptionError::UnsupportedLanguage(_)
        )
    }
}

/// Speech-to-text backed by an aligned Whisper model
#[async_trait]
pub trait Transcriber: Send + Sync {
    /// `language` of `None` lets the model detect it
    async fn transcribe(
        &self,
        audio: Bytes,
        filename: Option<&str>,
        language: Option<&str>,
    ) -> Result<Transcription, TranscriptionError>;
}

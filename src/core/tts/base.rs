use std::fmt;

use async_trait::async_trait;
use bytes::Bytes;
use thiserror::Error;

use crate::core::audio::AudioSegment;

/// Languages accepted by the XTTS v2 model
pub const SUPPORTED_LANGUAGES: &[&str] = &[
    "en", "es", "fr", "de", "it", "pt", "pl", "tr", "ru", "nl", "cs", "ar", "zh-cn", "ja", "hu",
    "ko", "hi",
];

pub const DEFAULT_LANGUAGE: &str = "en";

/// Which voice the model should speak with
#[derive(Clone, PartialEq, Eq)]
pub enum VoiceSpec {
    /// One of the model's bundled speakers
    Builtin { speaker_id: String },
    /// Zero-shot clone from a short WAV clip
    Clone { reference_audio: Bytes },
}

impl VoiceSpec {
    pub fn builtin(speaker_id: impl Into<String>) -> Self {
        VoiceSpec::Builtin {
            speaker_id: speaker_id.into(),
        }
    }

    pub fn speaker_id(&self) -> Option<&str> {
        match self {
            VoiceSpec::Builtin { speaker_id } => Some(speaker_id),
            VoiceSpec::Clone { .. } => None,
        }
    }

    pub fn is_clone(&self) -> bool {
        matches!(self, VoiceSpec::Clone { .. })
    }
}

// Reference audio can be megabytes; keep it out of logs
impl fmt::Debug for VoiceSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VoiceSpec::Builtin { speaker_id } => f
                .debug_struct("Builtin")
                .field("speaker_id", speaker_id)
                .finish(),
            VoiceSpec::Clone { reference_audio } => f
                .debug_struct("Clone")
                .field("reference_audio_bytes", &reference_audio.len())
                .finish(),
        }
    }
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SynthesisError {
    #[error("Invalid speaker: {voice}")]
    InvalidVoice {
        voice: String,
        valid_options: Vec<String>,
    },

    #[error("Unsupported language: {0}. Supported: {supported}", supported = SUPPORTED_LANGUAGES.join(", "))]
    UnsupportedLanguage(String),

    #[error("Synthesis failed: {0}")]
    InferenceError(String),

    #[error("Synthesis timed out after {0} ms")]
    Timeout(u64),
}

pub type SynthesisResult<T> = Result<T, SynthesisError>;

/// Check a language code against [`SUPPORTED_LANGUAGES`]. Codes are case-sensitive.
pub fn validate_language(language: &str) -> SynthesisResult<()> {
    if SUPPORTED_LANGUAGES.contains(&language) {
        Ok(())
    } else {
        Err(SynthesisError::UnsupportedLanguage(language.to_string()))
    }
}

/// One call per chunk against a loaded speech model.
///
/// Implementations return audio at [`SegmentSynthesizer::sample_rate`] and
/// resample internally when the model runs at a different rate.
#[async_trait]
pub trait SegmentSynthesizer: Send + Sync {
    async fn synthesize(
        &self,
        text: &str,
        voice: &VoiceSpec,
        language: &str,
    ) -> SynthesisResult<AudioSegment>;

    /// Rate of every segment this synthesizer returns
    fn sample_rate(&self) -> u32;

    /// Engine name reported to callers
    fn engine_name(&self) -> &'static str {
        "coqui_xtts"
    }
}

use serde::Deserialize;
use std::path::Path;

use super::ConfigError;
use crate::core::audio::LoudnessTarget;

/// Complete YAML configuration structure
///
/// Every field is optional; values present here override the environment.
///
/// # Example YAML structure
/// ```yaml
/// server:
///   host: "0.0.0.0"
///   port: 8000
///
/// workers:
///   tts_url: "http://127.0.0.1:8001"
///   stt_url: "http://127.0.0.1:8002"
///   timeout_seconds: 120
///
/// synthesis:
///   sample_rate: 24000
///   crossfade_ms: 40
///   max_chars: 200
///   max_words: 60
///   min_chars: 40
///   preserve_sentence_boundaries: true
///   loudness:
///     mode: peak
///     level: 0.95
///   chunk_timeout_seconds: 60
///   accelerator_slots: 1
///
/// speaker_cache:
///   volume_path: "/models/coqui"
///   ttl_seconds: 864000
///
/// transcription:
///   max_audio_bytes: 104857600
///   timeout_seconds: 300
///
/// security:
///   cors_allowed_origins: "https://app.example.com"
/// ```
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct YamlConfig {
    pub server: Option<ServerYaml>,
    pub workers: Option<WorkersYaml>,
    pub synthesis: Option<SynthesisYaml>,
    pub speaker_cache: Option<SpeakerCacheYaml>,
    pub transcription: Option<TranscriptionYaml>,
    pub security: Option<SecurityYaml>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct ServerYaml {
    pub host: Option<String>,
    pub port: Option<u16>,
}

/// Model worker endpoints
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct WorkersYaml {
    pub tts_url: Option<String>,
    /// Transcription is disabled when no STT worker is configured
    pub stt_url: Option<String>,
    pub timeout_seconds: Option<u64>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct SynthesisYaml {
    pub sample_rate: Option<u32>,
    pub crossfade_ms: Option<u32>,
    pub max_chars: Option<usize>,
    pub max_words: Option<usize>,
    pub min_chars: Option<usize>,
    /// `false` packs words without regard to sentence ends
    pub preserve_sentence_boundaries: Option<bool>,
    pub loudness: Option<LoudnessTarget>,
    /// `false` disables loudness normalization entirely
    pub normalize: Option<bool>,
    pub chunk_timeout_seconds: Option<u64>,
    pub accelerator_slots: Option<usize>,
    pub max_text_chars: Option<usize>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct SpeakerCacheYaml {
    /// Model volume holding the cache file; in-memory when unset
    pub volume_path: Option<String>,
    pub ttl_seconds: Option<u64>,
    pub key: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct TranscriptionYaml {
    pub max_audio_bytes: Option<usize>,
    pub timeout_seconds: Option<u64>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct SecurityYaml {
    /// CORS allowed origins (comma-separated list or "*" for all)
    pub cors_allowed_origins: Option<String>,
}

impl YamlConfig {
    /// Load configuration from a YAML file
    ///
    /// # Errors
    /// Returns an error if the file cannot be read or the YAML is malformed.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            ConfigError::Read(format!("Failed to read config file {}: {e}", path.display()))
        })?;

        serde_yaml::from_str(&contents)
            .map_err(|e| ConfigError::Parse(format!("Failed to parse YAML config: {e}")))
    }
}

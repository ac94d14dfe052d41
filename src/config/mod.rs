//! Configuration for the speech gateway
//!
//! Configuration comes from defaults, environment variables (including a `.env`
//! file loaded in `main`) and an optional YAML file.
//! Priority: YAML > ENV vars > .env values > defaults.
//!
//! # Example
//! ```rust,no_run
//! use speech_gateway::config::ServerConfig;
//! use std::path::PathBuf;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! // Load from environment variables only
//! let config = ServerConfig::from_env()?;
//!
//! // Load from YAML file with environment variables as the base
//! let config = ServerConfig::from_file(&PathBuf::from("config.yaml"))?;
//!
//! println!("Server listening on {}", config.address());
//! # Ok(())
//! # }
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use thiserror::Error;

use crate::core::audio::{LoudnessTarget, ReferenceAudioLimits};
use crate::core::cache::{DEFAULT_CACHE_KEY, SpeakerCacheConfig};
use crate::core::stt::{RemoteTranscriberConfig, TranscriptionConfig};
use crate::core::text::ChunkingSpec;
use crate::core::tts::{PipelineConfig, RemoteModelConfig};

mod env;
mod yaml;

pub use yaml::YamlConfig;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0}")]
    Read(String),

    #[error("{0}")]
    Parse(String),

    #[error("Invalid value for {name}: {reason}")]
    InvalidEnv { name: String, reason: String },

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Server configuration
///
/// Covers the listener, the model worker endpoints, the synthesis pipeline,
/// the speaker cache and transcription limits.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    // Server settings
    pub host: String,
    pub port: u16,

    // Model workers
    pub tts_worker_url: String,
    /// Transcription routes answer 503 when unset
    pub stt_worker_url: Option<String>,
    pub worker_timeout_seconds: u64,

    // Synthesis pipeline
    pub sample_rate: u32,
    pub crossfade_ms: u32,
    pub chunk_max_chars: usize,
    pub chunk_max_words: usize,
    pub chunk_min_chars: usize,
    pub chunk_preserve_sentences: bool,
    /// `None` disables normalization
    pub loudness: Option<LoudnessTarget>,
    pub chunk_timeout_seconds: u64,
    pub accelerator_slots: usize,
    pub max_text_chars: usize,

    // Speaker cache
    /// Directory of the model volume; the cache lives in memory when unset
    pub model_volume_path: Option<PathBuf>,
    pub speaker_cache_ttl_seconds: u64,
    pub speaker_cache_key: String,

    // Transcription
    pub max_audio_bytes: usize,
    pub transcribe_timeout_seconds: u64,

    // Security configuration
    /// CORS allowed origins (comma-separated list or "*" for all)
    /// Default: None (CORS disabled, same-origin only)
    pub cors_allowed_origins: Option<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        let chunking = ChunkingSpec::default();
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
            tts_worker_url: RemoteModelConfig::default().base_url,
            stt_worker_url: None,
            worker_timeout_seconds: 120,
            sample_rate: 24000,
            crossfade_ms: 40,
            chunk_max_chars: chunking.max_chars,
            chunk_max_words: chunking.max_words,
            chunk_min_chars: chunking.min_chars,
            chunk_preserve_sentences: chunking.preserve_sentence_boundaries,
            loudness: Some(LoudnessTarget::default()),
            chunk_timeout_seconds: 60,
            accelerator_slots: 1,
            max_text_chars: 5000,
            model_volume_path: None,
            speaker_cache_ttl_seconds: 10 * 24 * 60 * 60,
            speaker_cache_key: DEFAULT_CACHE_KEY.to_string(),
            max_audio_bytes: 100 * 1024 * 1024,
            transcribe_timeout_seconds: 300,
            cors_allowed_origins: None,
        }
    }
}

impl ServerConfig {
    /// Load configuration from environment variables over the defaults
    ///
    /// # Errors
    /// Returns an error if a variable cannot be parsed or validation fails.
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::default();
        env::apply_env(&mut config)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a YAML file with environment variables as the base
    ///
    /// Priority order (highest to lowest):
    /// 1. YAML file values
    /// 2. Environment variables (actual ENV vars override .env values)
    /// 3. .env file values
    /// 4. Default values
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let yaml = YamlConfig::from_file(path)?;

        let mut config = Self::default();
        env::apply_env(&mut config)?;
        config.apply_yaml(yaml);
        config.validate()?;
        Ok(config)
    }

    fn apply_yaml(&mut self, yaml: YamlConfig) {
        if let Some(server) = yaml.server {
            if let Some(host) = server.host {
                self.host = host;
            }
            if let Some(port) = server.port {
                self.port = port;
            }
        }

        if let Some(workers) = yaml.workers {
            if let Some(url) = workers.tts_url {
                self.tts_worker_url = url;
            }
            if workers.stt_url.is_some() {
                self.stt_worker_url = workers.stt_url;
            }
            if let Some(seconds) = workers.timeout_seconds {
                self.worker_timeout_seconds = seconds;
            }
        }

        if let Some(synthesis) = yaml.synthesis {
            if let Some(rate) = synthesis.sample_rate {
                self.sample_rate = rate;
            }
            if let Some(ms) = synthesis.crossfade_ms {
                self.crossfade_ms = ms;
            }
            if let Some(max_chars) = synthesis.max_chars {
                self.chunk_max_chars = max_chars;
            }
            if let Some(max_words) = synthesis.max_words {
                self.chunk_max_words = max_words;
            }
            if let Some(min_chars) = synthesis.min_chars {
                self.chunk_min_chars = min_chars;
            }
            if let Some(preserve) = synthesis.preserve_sentence_boundaries {
                self.chunk_preserve_sentences = preserve;
            }
            if synthesis.loudness.is_some() {
                self.loudness = synthesis.loudness;
            }
            if synthesis.normalize == Some(false) {
                self.loudness = None;
            }
            if let Some(seconds) = synthesis.chunk_timeout_seconds {
                self.chunk_timeout_seconds = seconds;
            }
            if let Some(slots) = synthesis.accelerator_slots {
                self.accelerator_slots = slots;
            }
            if let Some(max) = synthesis.max_text_chars {
                self.max_text_chars = max;
            }
        }

        if let Some(cache) = yaml.speaker_cache {
            if let Some(path) = cache.volume_path {
                self.model_volume_path = Some(PathBuf::from(path));
            }
            if let Some(ttl) = cache.ttl_seconds {
                self.speaker_cache_ttl_seconds = ttl;
            }
            if let Some(key) = cache.key {
                self.speaker_cache_key = key;
            }
        }

        if let Some(transcription) = yaml.transcription {
            if let Some(max) = transcription.max_audio_bytes {
                self.max_audio_bytes = max;
            }
            if let Some(seconds) = transcription.timeout_seconds {
                self.transcribe_timeout_seconds = seconds;
            }
        }

        if let Some(security) = yaml.security {
            if security.cors_allowed_origins.is_some() {
                self.cors_allowed_origins = security.cors_allowed_origins;
            }
        }
    }

    /// Check value ranges after all sources are merged
    pub fn validate(&self) -> Result<(), ConfigError> {
        let check_url = |name: &str, url: &str| {
            if url.starts_with("http://") || url.starts_with("https://") {
                Ok(())
            } else {
                Err(ConfigError::Invalid(format!(
                    "{name} must be an http(s) URL, got '{url}'"
                )))
            }
        };
        check_url("tts_worker_url", &self.tts_worker_url)?;
        if let Some(url) = &self.stt_worker_url {
            check_url("stt_worker_url", url)?;
        }

        if !(8000..=48000).contains(&self.sample_rate) {
            return Err(ConfigError::Invalid(format!(
                "sample_rate must be between 8000 and 48000 Hz, got {}",
                self.sample_rate
            )));
        }
        if self.crossfade_ms > 1000 {
            return Err(ConfigError::Invalid(format!(
                "crossfade_ms must be at most 1000, got {}",
                self.crossfade_ms
            )));
        }
        self.chunking_spec()
            .validate()
            .map_err(|e| ConfigError::Invalid(e.to_string()))?;
        if let Some(target) = self.loudness {
            let level = target.level();
            if !(level > 0.0 && level <= 1.0) {
                return Err(ConfigError::Invalid(format!(
                    "loudness level must be in (0, 1], got {level}"
                )));
            }
        }
        if self.accelerator_slots == 0 {
            return Err(ConfigError::Invalid(
                "accelerator_slots must be at least 1".to_string(),
            ));
        }
        if self.speaker_cache_ttl_seconds == 0 {
            return Err(ConfigError::Invalid(
                "speaker_cache_ttl_seconds must be greater than 0".to_string(),
            ));
        }
        if self.chunk_timeout_seconds == 0 || self.worker_timeout_seconds == 0 {
            return Err(ConfigError::Invalid(
                "timeouts must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }

    /// Get the server address as a string
    ///
    /// Returns the address in the format "host:port"
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn chunking_spec(&self) -> ChunkingSpec {
        ChunkingSpec {
            max_chars: self.chunk_max_chars,
            max_words: self.chunk_max_words,
            min_chars: self.chunk_min_chars,
            preserve_sentence_boundaries: self.chunk_preserve_sentences,
        }
    }

    pub fn pipeline_config(&self) -> PipelineConfig {
        PipelineConfig {
            chunking: self.chunking_spec(),
            crossfade_ms: self.crossfade_ms,
            loudness: self.loudness,
            chunk_timeout: Duration::from_secs(self.chunk_timeout_seconds),
            sample_rate: self.sample_rate,
            accelerator_slots: self.accelerator_slots,
            max_text_chars: self.max_text_chars,
        }
    }

    pub fn remote_model_config(&self) -> RemoteModelConfig {
        RemoteModelConfig {
            base_url: self.tts_worker_url.clone(),
            request_timeout: Duration::from_secs(self.worker_timeout_seconds),
            sample_rate: self.sample_rate,
        }
    }

    pub fn speaker_cache_config(&self) -> SpeakerCacheConfig {
        SpeakerCacheConfig {
            key: self.speaker_cache_key.clone(),
            ttl: Duration::from_secs(self.speaker_cache_ttl_seconds),
            discovery_timeout: Duration::from_secs(self.worker_timeout_seconds),
        }
    }

    pub fn remote_transcriber_config(&self) -> Option<RemoteTranscriberConfig> {
        self.stt_worker_url
            .as_ref()
            .map(|url| RemoteTranscriberConfig {
                base_url: url.clone(),
                request_timeout: Duration::from_secs(self.transcribe_timeout_seconds),
            })
    }

    pub fn transcription_config(&self) -> TranscriptionConfig {
        TranscriptionConfig {
            max_audio_bytes: self.max_audio_bytes,
            timeout: Duration::from_secs(self.transcribe_timeout_seconds),
        }
    }

    pub fn reference_audio_limits(&self) -> ReferenceAudioLimits {
        ReferenceAudioLimits::default()
    }
}

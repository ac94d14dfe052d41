use std::env;
use std::path::PathBuf;
use std::str::FromStr;

use super::{ConfigError, ServerConfig};
use crate::core::audio::LoudnessTarget;

/// Read and parse an optional environment variable. Empty values count as unset.
fn parse_var<T: FromStr>(name: &str) -> Result<Option<T>, ConfigError>
where
    T::Err: std::fmt::Display,
{
    match env::var(name) {
        Ok(value) if !value.trim().is_empty() => value
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|e| ConfigError::InvalidEnv {
                name: name.to_string(),
                reason: e.to_string(),
            }),
        _ => Ok(None),
    }
}

fn string_var(name: &str) -> Option<String> {
    env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Parse `LOUDNESS_MODE` (`peak`, `rms` or `off`) with an optional `LOUDNESS_LEVEL`.
///
/// Returns `None` when neither variable is set.
fn loudness_var() -> Result<Option<Option<LoudnessTarget>>, ConfigError> {
    let mode = string_var("LOUDNESS_MODE").map(|m| m.to_lowercase());
    let level: Option<f32> = parse_var("LOUDNESS_LEVEL")?;

    let target = match (mode.as_deref(), level) {
        (None, None) => return Ok(None),
        (Some("off") | Some("none"), _) => None,
        (Some("rms"), level) => Some(LoudnessTarget::Rms(level.unwrap_or(0.1))),
        (Some("peak") | None, level) => Some(LoudnessTarget::Peak(
            level.unwrap_or(LoudnessTarget::default().level()),
        )),
        (Some(other), _) => {
            return Err(ConfigError::InvalidEnv {
                name: "LOUDNESS_MODE".to_string(),
                reason: format!("expected peak, rms or off, got '{other}'"),
            });
        }
    };
    Ok(Some(target))
}

/// Overlay environment variables onto `config`
pub(super) fn apply_env(config: &mut ServerConfig) -> Result<(), ConfigError> {
    if let Some(host) = string_var("HOST") {
        config.host = host;
    }
    if let Some(port) = parse_var("PORT")? {
        config.port = port;
    }

    if let Some(url) = string_var("TTS_WORKER_URL") {
        config.tts_worker_url = url;
    }
    if let Some(url) = string_var("STT_WORKER_URL") {
        config.stt_worker_url = Some(url);
    }
    if let Some(seconds) = parse_var("WORKER_TIMEOUT_SECONDS")? {
        config.worker_timeout_seconds = seconds;
    }

    if let Some(rate) = parse_var("SAMPLE_RATE")? {
        config.sample_rate = rate;
    }
    if let Some(ms) = parse_var("CROSSFADE_MS")? {
        config.crossfade_ms = ms;
    }
    if let Some(max_chars) = parse_var("CHUNK_MAX_CHARS")? {
        config.chunk_max_chars = max_chars;
    }
    if let Some(max_words) = parse_var("CHUNK_MAX_WORDS")? {
        config.chunk_max_words = max_words;
    }
    if let Some(min_chars) = parse_var("CHUNK_MIN_CHARS")? {
        config.chunk_min_chars = min_chars;
    }
    if let Some(preserve) = parse_var("CHUNK_PRESERVE_SENTENCES")? {
        config.chunk_preserve_sentences = preserve;
    }
    if let Some(loudness) = loudness_var()? {
        config.loudness = loudness;
    }
    if let Some(seconds) = parse_var("CHUNK_TIMEOUT_SECONDS")? {
        config.chunk_timeout_seconds = seconds;
    }
    if let Some(slots) = parse_var("ACCELERATOR_SLOTS")? {
        config.accelerator_slots = slots;
    }
    if let Some(max) = parse_var("MAX_TEXT_CHARS")? {
        config.max_text_chars = max;
    }

    if let Some(path) = string_var("MODEL_VOLUME_PATH") {
        config.model_volume_path = Some(PathBuf::from(path));
    }
    if let Some(ttl) = parse_var("SPEAKER_CACHE_TTL_SECONDS")? {
        config.speaker_cache_ttl_seconds = ttl;
    }
    if let Some(key) = string_var("SPEAKER_CACHE_KEY") {
        config.speaker_cache_key = key;
    }

    if let Some(max) = parse_var("MAX_AUDIO_BYTES")? {
        config.max_audio_bytes = max;
    }
    if let Some(seconds) = parse_var("TRANSCRIBE_TIMEOUT_SECONDS")? {
        config.transcribe_timeout_seconds = seconds;
    }

    if let Some(origins) = string_var("CORS_ALLOWED_ORIGINS") {
        config.cors_allowed_origins = Some(origins);
    }

    Ok(())
}

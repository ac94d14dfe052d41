//! Reference audio checks for voice cloning.

use thiserror::Error;

use super::probe_wav;

/// Bounds applied to uploaded reference audio
#[derive(Debug, Clone, PartialEq)]
pub struct ReferenceAudioLimits {
    pub max_bytes: usize,
    pub min_duration_sec: f64,
    pub max_duration_sec: f64,
    pub optimal_min_sec: f64,
    pub optimal_max_sec: f64,
    pub min_sample_rate: u32,
    pub preferred_sample_rate: u32,
}

impl Default for ReferenceAudioLimits {
    fn default() -> Self {
        Self {
            max_bytes: 10 * 1024 * 1024,
            min_duration_sec: 3.0,
            max_duration_sec: 30.0,
            optimal_min_sec: 6.0,
            optimal_max_sec: 10.0,
            min_sample_rate: 16000,
            preferred_sample_rate: 22050,
        }
    }
}

#[derive(Debug, Clone, Error, PartialEq)]
pub enum ReferenceAudioError {
    #[error("Reference audio is empty")]
    Empty,

    #[error("File too large ({size} bytes). Maximum: {max} bytes")]
    TooLarge { size: usize, max: usize },

    #[error("Invalid WAV file: {0}")]
    InvalidWav(String),

    #[error("Audio too short ({duration:.1}s). Minimum: {min}s for voice cloning")]
    TooShort { duration: f64, min: f64 },

    #[error("Audio too long ({duration:.1}s). Maximum: {max}s")]
    TooLong { duration: f64, max: f64 },

    #[error("Sample rate too low ({found}Hz). Minimum: {min}Hz")]
    SampleRateTooLow { found: u32, min: u32 },
}

/// Accepted reference audio, with any quality warnings
#[derive(Debug, Clone, PartialEq)]
pub struct AudioValidation {
    pub duration_sec: f64,
    pub sample_rate: u32,
    pub channels: u16,
    pub bits_per_sample: u16,
    pub warnings: Vec<String>,
}

impl AudioValidation {
    pub fn warning_message(&self) -> Option<String> {
        if self.warnings.is_empty() {
            None
        } else {
            Some(self.warnings.join("; "))
        }
    }
}

/// Check size, duration and format of a WAV reference clip.
///
/// Hard failures are returned as errors; settings that work but are not ideal
/// are reported as warnings on the result.
pub fn validate_reference_audio(
    bytes: &[u8],
    limits: &ReferenceAudioLimits,
) -> Result<AudioValidation, ReferenceAudioError> {
    if bytes.is_empty() {
        return Err(ReferenceAudioError::Empty);
    }
    if bytes.len() > limits.max_bytes {
        return Err(ReferenceAudioError::TooLarge {
            size: bytes.len(),
            max: limits.max_bytes,
        });
    }

    let info = probe_wav(bytes).map_err(|e| ReferenceAudioError::InvalidWav(e.to_string()))?;
    let duration = info.duration_sec();

    if duration < limits.min_duration_sec {
        return Err(ReferenceAudioError::TooShort {
            duration,
            min: limits.min_duration_sec,
        });
    }
    if duration > limits.max_duration_sec {
        return Err(ReferenceAudioError::TooLong {
            duration,
            max: limits.max_duration_sec,
        });
    }
    if info.sample_rate < limits.min_sample_rate {
        return Err(ReferenceAudioError::SampleRateTooLow {
            found: info.sample_rate,
            min: limits.min_sample_rate,
        });
    }

    let mut warnings = Vec::new();
    if duration < limits.optimal_min_sec || duration > limits.optimal_max_sec {
        warnings.push(format!(
            "Audio duration ({duration:.1}s) is acceptable but {}-{}s is optimal for best quality",
            limits.optimal_min_sec, limits.optimal_max_sec
        ));
    }
    if info.sample_rate < limits.preferred_sample_rate {
        warnings.push(format!(
            "Sample rate {}Hz is below optimal {}Hz",
            info.sample_rate, limits.preferred_sample_rate
        ));
    }
    if info.channels > 1 {
        warnings.push(format!(
            "Audio is {}-channel. Mono is preferred for voice cloning",
            info.channels
        ));
    }
    if info.bits_per_sample < 16 {
        warnings.push(format!(
            "Audio is {}-bit. 16-bit or higher recommended",
            info.bits_per_sample
        ));
    }

    Ok(AudioValidation {
        duration_sec: duration,
        sample_rate: info.sample_rate,
        channels: info.channels,
        bits_per_sample: info.bits_per_sample,
        warnings,
    })
}

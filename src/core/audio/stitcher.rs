//! Stitching of per-chunk audio into one continuous waveform.
//!
//! Adjacent segments overlap by a linear crossfade so the boundary has no
//! audible seam, and the joined waveform is normalized once so loudness does
//! not drift from chunk to chunk.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::AudioSegment;

/// Errors returned by [`stitch`]
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StitchError {
    /// Nothing to stitch
    #[error("Cannot stitch an empty segment list")]
    EmptyInput,

    /// The synthesis adapter must resample before segments reach the stitcher
    #[error("Segment {index} has sample rate {found} Hz, expected {expected} Hz")]
    SampleRateMismatch {
        index: usize,
        expected: u32,
        found: u32,
    },
}

impl StitchError {
    /// True when the error points at a bug in the caller rather than bad input
    pub fn is_contract_violation(&self) -> bool {
        matches!(self, StitchError::SampleRateMismatch { .. })
    }
}

/// Loudness normalization applied to the stitched waveform
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode", content = "level", rename_all = "lowercase")]
pub enum LoudnessTarget {
    /// Scale so the largest absolute sample equals the level
    Peak(f32),
    /// Scale so the RMS amplitude equals the level, clipping at full scale
    Rms(f32),
}

impl Default for LoudnessTarget {
    fn default() -> Self {
        LoudnessTarget::Peak(0.95)
    }
}

impl LoudnessTarget {
    pub fn level(&self) -> f32 {
        match self {
            LoudnessTarget::Peak(level) | LoudnessTarget::Rms(level) => *level,
        }
    }
}

/// Result of combining N segments
#[derive(Debug, Clone, PartialEq)]
pub struct StitchedAudio {
    pub audio: AudioSegment,
    pub chunk_count: usize,
}

impl StitchedAudio {
    pub fn sample_rate(&self) -> u32 {
        self.audio.sample_rate
    }

    pub fn duration_sec(&self) -> f64 {
        self.audio.duration_sec()
    }
}

/// Number of samples covered by `crossfade_ms` at `sample_rate`
pub fn crossfade_samples(crossfade_ms: u32, sample_rate: u32) -> usize {
    (sample_rate as u64 * crossfade_ms as u64 / 1000) as usize
}

/// Combine segments in order with crossfades and optional normalization.
///
/// All segments must share one sample rate. The crossfade window is clamped to
/// whatever part of the outgoing segment was not already used by its own
/// leading overlap, and to the length of the incoming segment, so very short
/// segments never cause an error.
pub fn stitch(
    segments: Vec<AudioSegment>,
    crossfade_ms: u32,
    target_loudness: Option<LoudnessTarget>,
) -> Result<StitchedAudio, StitchError> {
    let sample_rate = segments
        .first()
        .map(|s| s.sample_rate)
        .ok_or(StitchError::EmptyInput)?;

    for (index, segment) in segments.iter().enumerate() {
        if segment.sample_rate != sample_rate {
            return Err(StitchError::SampleRateMismatch {
                index,
                expected: sample_rate,
                found: segment.sample_rate,
            });
        }
    }

    let chunk_count = segments.len();
    let window = crossfade_samples(crossfade_ms, sample_rate);
    let total: usize = segments.iter().map(AudioSegment::len).sum();

    let mut segments = segments.into_iter();
    let mut output = Vec::with_capacity(total);
    let mut tail_available = 0usize;

    if let Some(first) = segments.next() {
        tail_available = first.len();
        output = first.samples;
        output.reserve(total.saturating_sub(output.len()));
    }

    for segment in segments {
        let overlap = window.min(tail_available).min(segment.len());
        let start = output.len() - overlap;

        for k in 0..overlap {
            let fade_in = k as f32 / overlap as f32;
            let fade_out = 1.0 - fade_in;
            output[start + k] = output[start + k] * fade_out + segment.samples[k] * fade_in;
        }
        output.extend_from_slice(&segment.samples[overlap..]);

        tail_available = segment.len() - overlap;
    }

    if let Some(target) = target_loudness {
        normalize(&mut output, target);
    }

    Ok(StitchedAudio {
        audio: AudioSegment::new(output, sample_rate),
        chunk_count,
    })
}

/// Scale samples in place to the loudness target. Returns the applied gain.
///
/// Silent input is left untouched.
pub fn normalize(samples: &mut [f32], target: LoudnessTarget) -> f32 {
    let level = target.level().clamp(0.0, 1.0);

    let measured = match target {
        LoudnessTarget::Peak(_) => samples.iter().fold(0.0f32, |acc, s| acc.max(s.abs())),
        LoudnessTarget::Rms(_) => {
            if samples.is_empty() {
                0.0
            } else {
                let sum: f64 = samples.iter().map(|s| (*s as f64) * (*s as f64)).sum();
                (sum / samples.len() as f64).sqrt() as f32
            }
        }
    };

    if measured <= f32::EPSILON {
        return 1.0;
    }

    let gain = level / measured;
    for sample in samples.iter_mut() {
        *sample = (*sample * gain).clamp(-1.0, 1.0);
    }
    gain
}

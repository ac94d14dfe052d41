//! Audio buffers and container helpers shared by the synthesis pipeline.
//!
//! Samples are mono `f32` in `[-1.0, 1.0]`. Conversion to 16-bit PCM happens
//! only at the edges (model responses and the final WAV container).

pub mod stitcher;
pub mod validation;

use std::io::Cursor;

use bytes::Bytes;
use hound::{SampleFormat, WavReader, WavSpec, WavWriter};
use thiserror::Error;

pub use stitcher::{LoudnessTarget, StitchError, StitchedAudio, crossfade_samples, normalize, stitch};
pub use validation::{
    AudioValidation, ReferenceAudioError, ReferenceAudioLimits, validate_reference_audio,
};

/// Errors raised while converting audio between representations
#[derive(Debug, Error)]
pub enum AudioError {
    #[error("WAV error: {0}")]
    Wav(#[from] hound::Error),

    #[error("Unsupported WAV layout: {0}")]
    UnsupportedFormat(String),

    #[error("Invalid sample rate: {0}")]
    InvalidSampleRate(u32),
}

/// Owned mono audio buffer
#[derive(Debug, Clone, PartialEq)]
pub struct AudioSegment {
    pub samples: Vec<f32>,
    pub sample_rate: u32,
}

impl AudioSegment {
    pub fn new(samples: Vec<f32>, sample_rate: u32) -> Self {
        Self {
            samples,
            sample_rate,
        }
    }

    /// Zero-filled segment of the given length
    pub fn silence(duration_ms: u32, sample_rate: u32) -> Self {
        let len = (sample_rate as u64 * duration_ms as u64 / 1000) as usize;
        Self::new(vec![0.0; len], sample_rate)
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn duration_sec(&self) -> f64 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.samples.len() as f64 / self.sample_rate as f64
    }

    /// Largest absolute amplitude
    pub fn peak(&self) -> f32 {
        self.samples.iter().fold(0.0f32, |acc, s| acc.max(s.abs()))
    }

    /// Root-mean-square amplitude
    pub fn rms(&self) -> f32 {
        if self.samples.is_empty() {
            return 0.0;
        }
        let sum: f64 = self.samples.iter().map(|s| (*s as f64) * (*s as f64)).sum();
        (sum / self.samples.len() as f64).sqrt() as f32
    }

    /// Decode little-endian signed 16-bit PCM. A trailing odd byte is ignored.
    pub fn from_pcm16_bytes(bytes: &[u8], sample_rate: u32) -> Self {
        let samples = bytes
            .chunks_exact(2)
            .map(|pair| i16::from_le_bytes([pair[0], pair[1]]) as f32 / i16::MAX as f32)
            .collect();
        Self::new(samples, sample_rate)
    }

    /// Encode as little-endian signed 16-bit PCM, clipping to `[-1.0, 1.0]`
    pub fn to_pcm16_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.samples.len() * 2);
        for sample in &self.samples {
            out.extend_from_slice(&to_pcm16(*sample).to_le_bytes());
        }
        out
    }

    /// Linear-interpolation resample to `target_rate`.
    ///
    /// Returns a clone when the rates already match.
    pub fn resample(&self, target_rate: u32) -> Result<Self, AudioError> {
        if target_rate == 0 {
            return Err(AudioError::InvalidSampleRate(target_rate));
        }
        if self.sample_rate == 0 {
            return Err(AudioError::InvalidSampleRate(self.sample_rate));
        }
        if self.sample_rate == target_rate || self.samples.is_empty() {
            return Ok(Self::new(self.samples.clone(), target_rate));
        }

        let ratio = self.sample_rate as f64 / target_rate as f64;
        let out_len = ((self.samples.len() as u64 * target_rate as u64)
            / self.sample_rate as u64)
            .max(1) as usize;
        let last = self.samples.len() - 1;

        let samples = (0..out_len)
            .map(|i| {
                let pos = i as f64 * ratio;
                let idx = (pos.floor() as usize).min(last);
                let next = (idx + 1).min(last);
                let frac = (pos - idx as f64) as f32;
                self.samples[idx] * (1.0 - frac) + self.samples[next] * frac
            })
            .collect();

        Ok(Self::new(samples, target_rate))
    }
}

fn to_pcm16(sample: f32) -> i16 {
    (sample.clamp(-1.0, 1.0) * i16::MAX as f32) as i16
}

/// Format details of a decoded WAV payload
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WavInfo {
    pub sample_rate: u32,
    pub channels: u16,
    pub bits_per_sample: u16,
    pub frames: u32,
}

impl WavInfo {
    pub fn duration_sec(&self) -> f64 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.frames as f64 / self.sample_rate as f64
    }
}

/// Wrap a segment in a 16-bit mono WAV container
pub fn encode_wav(segment: &AudioSegment) -> Result<Bytes, AudioError> {
    if segment.sample_rate == 0 {
        return Err(AudioError::InvalidSampleRate(0));
    }

    let spec = WavSpec {
        channels: 1,
        sample_rate: segment.sample_rate,
        bits_per_sample: 16,
        sample_format: SampleFormat::Int,
    };

    let mut cursor = Cursor::new(Vec::with_capacity(44 + segment.len() * 2));
    {
        let mut writer = WavWriter::new(&mut cursor, spec)?;
        for sample in &segment.samples {
            writer.write_sample(to_pcm16(*sample))?;
        }
        writer.finalize()?;
    }

    Ok(Bytes::from(cursor.into_inner()))
}

/// Read only the header of a WAV payload
pub fn probe_wav(bytes: &[u8]) -> Result<WavInfo, AudioError> {
    let reader = WavReader::new(Cursor::new(bytes))?;
    let spec = reader.spec();
    Ok(WavInfo {
        sample_rate: spec.sample_rate,
        channels: spec.channels,
        bits_per_sample: spec.bits_per_sample,
        frames: reader.duration(),
    })
}

/// Decode a WAV payload to mono `f32`, averaging channels.
pub fn decode_wav(bytes: &[u8]) -> Result<(AudioSegment, WavInfo), AudioError> {
    let mut reader = WavReader::new(Cursor::new(bytes))?;
    let spec = reader.spec();
    let info = WavInfo {
        sample_rate: spec.sample_rate,
        channels: spec.channels,
        bits_per_sample: spec.bits_per_sample,
        frames: reader.duration(),
    };

    if spec.channels == 0 {
        return Err(AudioError::UnsupportedFormat("zero channels".to_string()));
    }

    let interleaved: Vec<f32> = match spec.sample_format {
        SampleFormat::Float => {
            if spec.bits_per_sample != 32 {
                return Err(AudioError::UnsupportedFormat(format!(
                    "{}-bit float",
                    spec.bits_per_sample
                )));
            }
            reader.samples::<f32>().collect::<Result<_, _>>()?
        }
        SampleFormat::Int => {
            if spec.bits_per_sample == 0 || spec.bits_per_sample > 32 {
                return Err(AudioError::UnsupportedFormat(format!(
                    "{}-bit integer",
                    spec.bits_per_sample
                )));
            }
            let scale = (1i64 << (spec.bits_per_sample - 1)) as f32;
            reader
                .samples::<i32>()
                .map(|s| s.map(|v| v as f32 / scale))
                .collect::<Result<_, _>>()?
        }
    };

    let channels = spec.channels as usize;
    let samples = if channels == 1 {
        interleaved
    } else {
        interleaved
            .chunks_exact(channels)
            .map(|frame| frame.iter().sum::<f32>() / channels as f32)
            .collect()
    };

    Ok((AudioSegment::new(samples, spec.sample_rate), info))
}

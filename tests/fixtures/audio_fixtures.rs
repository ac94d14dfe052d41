//! Audio Test Fixtures
//!
//! Generated audio keeps tests free of external files:
//! - Sine tones as float segments
//! - WAV containers at arbitrary rates and channel counts for
//!   reference-audio validation

use std::f32::consts::PI;
use std::io::Cursor;

use speech_gateway::core::audio::AudioSegment;

/// Pipeline output rate
pub const SAMPLE_RATE: u32 = 24000;

/// Preferred reference clip rate
pub const REFERENCE_RATE: u32 = 22050;

/// Generate a sine tone
pub fn sine_samples(frequency: f32, duration_ms: u32, sample_rate: u32, amplitude: f32) -> Vec<f32> {
    let len = (duration_ms as u64 * sample_rate as u64 / 1000) as usize;
    (0..len)
        .map(|i| amplitude * (2.0 * PI * frequency * i as f32 / sample_rate as f32).sin())
        .collect()
}

pub fn sine_segment(duration_ms: u32, sample_rate: u32) -> AudioSegment {
    AudioSegment::new(sine_samples(220.0, duration_ms, sample_rate, 0.5), sample_rate)
}

/// 16-bit PCM WAV with the tone copied into every channel
pub fn wav_bytes(duration_ms: u32, sample_rate: u32, channels: u16) -> Vec<u8> {
    let spec = hound::WavSpec {
        channels,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut cursor = Cursor::new(Vec::new());
    {
        let mut writer = hound::WavWriter::new(&mut cursor, spec).unwrap();
        for sample in sine_samples(220.0, duration_ms, sample_rate, 0.5) {
            let value = (sample * i16::MAX as f32) as i16;
            for _ in 0..channels {
                writer.write_sample(value).unwrap();
            }
        }
        writer.finalize().unwrap();
    }
    cursor.into_inner()
}

/// An 8 second mono clip at 22.05 kHz, accepted without warnings
pub fn reference_clip() -> Vec<u8> {
    wav_bytes(8000, REFERENCE_RATE, 1)
}

/// Multipart body builder for upload routes
pub struct MultipartBody {
    boundary: String,
    body: Vec<u8>,
}

impl MultipartBody {
    pub fn new() -> Self {
        Self {
            boundary: "speech-gateway-test-boundary".to_string(),
            body: Vec::new(),
        }
    }

    pub fn text(mut self, name: &str, value: &str) -> Self {
        self.body.extend_from_slice(
            format!(
                "--{}\r\nContent-Disposition: form-data; name=\"{}\"\r\n\r\n{}\r\n",
                self.boundary, name, value
            )
            .as_bytes(),
        );
        self
    }

    pub fn file(mut self, name: &str, filename: &str, content_type: &str, data: &[u8]) -> Self {
        self.body.extend_from_slice(
            format!(
                "--{}\r\nContent-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\nContent-Type: {}\r\n\r\n",
                self.boundary, name, filename, content_type
            )
            .as_bytes(),
        );
        self.body.extend_from_slice(data);
        self.body.extend_from_slice(b"\r\n");
        self
    }

    pub fn content_type(&self) -> String {
        format!("multipart/form-data; boundary={}", self.boundary)
    }

    pub fn finish(mut self) -> (String, Vec<u8>) {
        self.body
            .extend_from_slice(format!("--{}--\r\n", self.boundary).as_bytes());
        (self.content_type(), self.body)
    }
}

impl Default for MultipartBody {
    fn default() -> Self {
        Self::new()
    }
}

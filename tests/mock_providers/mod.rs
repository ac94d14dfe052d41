//! Mock collaborators for gateway tests
//!
//! - In-process fakes for the synthesizer, speaker discovery and transcriber
//! - An HTTP model worker (`http_mock`) for exercising the remote clients

// Allow dead code in test infrastructure - not every test binary uses every mock
#![allow(dead_code)]

pub mod http_mock;

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::Mutex;

use speech_gateway::config::ServerConfig;
use speech_gateway::core::audio::AudioSegment;
use speech_gateway::core::cache::{DiscoveryError, ObjectStoreBackend, SpeakerDiscovery};
use speech_gateway::core::stt::{
    Transcriber, TranscriptSegment, Transcription, TranscriptionError, WordSegment,
};
use speech_gateway::core::tts::{SegmentSynthesizer, SynthesisError, SynthesisResult, VoiceSpec};
use speech_gateway::state::AppState;

pub const SPEAKERS: [&str; 3] = ["Ana Florence", "Claribel Dervla", "Viktor Eka"];

/// Synthesizer returning a 500 ms tone per chunk
pub struct FakeSynthesizer {
    pub sample_rate: u32,
    pub calls: AtomicUsize,
    /// Fail the call with this zero-based index
    pub fail_on_call: Option<usize>,
    pub delay: Duration,
}

impl FakeSynthesizer {
    pub fn new() -> Self {
        Self {
            sample_rate: 24000,
            calls: AtomicUsize::new(0),
            fail_on_call: None,
            delay: Duration::ZERO,
        }
    }

    pub fn failing_on(call: usize) -> Self {
        Self {
            fail_on_call: Some(call),
            ..Self::new()
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Default for FakeSynthesizer {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SegmentSynthesizer for FakeSynthesizer {
    async fn synthesize(
        &self,
        _text: &str,
        voice: &VoiceSpec,
        _language: &str,
    ) -> SynthesisResult<AudioSegment> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        if let Some(speaker) = voice.speaker_id() {
            if !SPEAKERS.contains(&speaker) {
                return Err(SynthesisError::InvalidVoice {
                    voice: speaker.to_string(),
                    valid_options: SPEAKERS.iter().map(|s| s.to_string()).collect(),
                });
            }
        }
        if self.fail_on_call == Some(call) {
            return Err(SynthesisError::InferenceError("CUDA out of memory".to_string()));
        }

        let len = self.sample_rate as usize / 2;
        let samples = (0..len)
            .map(|i| 0.3 * (i as f32 * 0.05).sin())
            .collect();
        Ok(AudioSegment::new(samples, self.sample_rate))
    }

    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }
}

/// Discovery over a fixed list
pub struct FakeDiscovery {
    pub speakers: Vec<String>,
    pub calls: AtomicUsize,
    pub fail: AtomicBool,
}

impl FakeDiscovery {
    pub fn new() -> Self {
        Self {
            speakers: SPEAKERS.iter().map(|s| s.to_string()).collect(),
            calls: AtomicUsize::new(0),
            fail: AtomicBool::new(false),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Default for FakeDiscovery {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SpeakerDiscovery for FakeDiscovery {
    async fn discover_speakers(&self) -> Result<Vec<String>, DiscoveryError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail.load(Ordering::SeqCst) {
            return Err(DiscoveryError::Failed("model worker unreachable".to_string()));
        }
        Ok(self.speakers.clone())
    }
}

/// Transcriber that records its arguments and returns a fixed result
#[derive(Default)]
pub struct FakeTranscriber {
    pub last_call: Mutex<Option<(usize, Option<String>, Option<String>)>>,
}

#[async_trait]
impl Transcriber for FakeTranscriber {
    async fn transcribe(
        &self,
        audio: Bytes,
        filename: Option<&str>,
        language: Option<&str>,
    ) -> Result<Transcription, TranscriptionError> {
        *self.last_call.lock() = Some((
            audio.len(),
            filename.map(str::to_string),
            language.map(str::to_string),
        ));
        Ok(Transcription {
            text: "Hello world".to_string(),
            segments: vec![TranscriptSegment {
                text: "Hello world".to_string(),
                start: 0.0,
                end: 1.2,
                words: vec![
                    WordSegment {
                        word: "Hello".to_string(),
                        start: 0.0,
                        end: 0.5,
                        score: 0.98,
                    },
                    WordSegment {
                        word: "world".to_string(),
                        start: 0.6,
                        end: 1.2,
                        score: 0.95,
                    },
                ],
            }],
            language: language.unwrap_or("en").to_string(),
            duration: 1.2,
        })
    }
}

/// Collaborators behind a test [`AppState`]
pub struct TestHarness {
    pub state: Arc<AppState>,
    pub synthesizer: Arc<FakeSynthesizer>,
    pub discovery: Arc<FakeDiscovery>,
    pub transcriber: Arc<FakeTranscriber>,
}

impl TestHarness {
    pub fn new() -> Self {
        Self::with_synthesizer(FakeSynthesizer::new(), true)
    }

    pub fn with_synthesizer(synthesizer: FakeSynthesizer, transcription: bool) -> Self {
        let synthesizer = Arc::new(synthesizer);
        let discovery = Arc::new(FakeDiscovery::new());
        let transcriber = Arc::new(FakeTranscriber::default());

        let state = AppState::from_parts(
            ServerConfig::default(),
            synthesizer.clone(),
            discovery.clone(),
            Arc::new(ObjectStoreBackend::in_memory()),
            transcription.then(|| transcriber.clone() as Arc<dyn Transcriber>),
        );

        Self {
            state,
            synthesizer,
            discovery,
            transcriber,
        }
    }
}

impl Default for TestHarness {
    fn default() -> Self {
        Self::new()
    }
}

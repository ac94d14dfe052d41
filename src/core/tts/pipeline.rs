//! Chunk, synthesize and stitch.
//!
//! A request is split by the chunker, each chunk is synthesized in order while
//! the request holds the accelerator, and the segments are stitched into one
//! WAV. Any chunk failure aborts the request; partial audio is never returned.

use std::sync::Arc;
use std::time::{Duration, Instant};

use bytes::Bytes;
use serde::Serialize;
use thiserror::Error;
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use super::base::{SegmentSynthesizer, SynthesisError, VoiceSpec, validate_language};
use crate::core::audio::{AudioSegment, LoudnessTarget, StitchError, StitchedAudio, encode_wav, stitch};
use crate::core::text::{ChunkingError, ChunkingSpec, TextChunk, chunk};

pub const DEFAULT_CROSSFADE_MS: u32 = 40;
pub const DEFAULT_MAX_TEXT_CHARS: usize = 5000;

#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub chunking: ChunkingSpec,
    pub crossfade_ms: u32,
    pub loudness: Option<LoudnessTarget>,
    /// Upper bound on one synthesizer call
    pub chunk_timeout: Duration,
    /// Rate every segment must arrive at
    pub sample_rate: u32,
    /// Concurrent requests allowed on the accelerator
    pub accelerator_slots: usize,
    pub max_text_chars: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            chunking: ChunkingSpec::default(),
            crossfade_ms: DEFAULT_CROSSFADE_MS,
            loudness: Some(LoudnessTarget::default()),
            chunk_timeout: Duration::from_secs(60),
            sample_rate: 24000,
            accelerator_slots: 1,
            max_text_chars: DEFAULT_MAX_TEXT_CHARS,
        }
    }
}

/// How a [`PipelineError`] should be treated by callers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// Bad input; do not retry
    Validation,
    /// The model or worker failed or timed out
    Collaborator,
    /// Internal bug; details are logged, not exposed
    ContractViolation,
    Cancelled,
}

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Empty text input")]
    EmptyText,

    #[error("Text too long: {length} characters (max {max})")]
    TextTooLong { length: usize, max: usize },

    #[error("Unsupported language: {0}")]
    UnsupportedLanguage(String),

    #[error("Invalid chunking configuration: {0}")]
    Chunking(#[from] ChunkingError),

    #[error("Chunk {chunk_index} failed: {source}")]
    Synthesis {
        chunk_index: usize,
        #[source]
        source: SynthesisError,
    },

    #[error("No audio segments to stitch")]
    NoSegments,

    #[error("Internal pipeline error: {0}")]
    ContractViolation(String),

    #[error("Request cancelled")]
    Cancelled,
}

impl PipelineError {
    pub fn class(&self) -> ErrorClass {
        match self {
            PipelineError::EmptyText
            | PipelineError::TextTooLong { .. }
            | PipelineError::UnsupportedLanguage(_)
            | PipelineError::Chunking(_)
            | PipelineError::NoSegments => ErrorClass::Validation,
            PipelineError::Synthesis { source, .. } => match source {
                SynthesisError::InvalidVoice { .. } | SynthesisError::UnsupportedLanguage(_) => {
                    ErrorClass::Validation
                }
                SynthesisError::InferenceError(_) | SynthesisError::Timeout(_) => {
                    ErrorClass::Collaborator
                }
            },
            PipelineError::ContractViolation(_) => ErrorClass::ContractViolation,
            PipelineError::Cancelled => ErrorClass::Cancelled,
        }
    }
}

fn contract_violation(message: String) -> PipelineError {
    error!("Pipeline contract violation: {}", message);
    PipelineError::ContractViolation(message)
}

impl From<StitchError> for PipelineError {
    fn from(e: StitchError) -> Self {
        if e.is_contract_violation() {
            contract_violation(e.to_string())
        } else {
            PipelineError::NoSegments
        }
    }
}

#[derive(Debug, Clone)]
pub struct SynthesisRequest {
    pub text: String,
    pub voice: VoiceSpec,
    pub language: String,
}

/// Metadata returned alongside the audio
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SynthesisMetadata {
    pub sample_rate: u32,
    pub duration_sec: f64,
    pub chunk_count: usize,
}

#[derive(Debug, Clone)]
pub struct SynthesisOutput {
    pub audio: StitchedAudio,
    /// 16-bit mono WAV of `audio`
    pub wav: Bytes,
}

impl SynthesisOutput {
    pub fn metadata(&self) -> SynthesisMetadata {
        SynthesisMetadata {
            sample_rate: self.audio.sample_rate(),
            duration_sec: self.audio.duration_sec(),
            chunk_count: self.audio.chunk_count,
        }
    }
}

pub struct SynthesisPipeline {
    synthesizer: Arc<dyn SegmentSynthesizer>,
    config: PipelineConfig,
    accelerator: Semaphore,
}

impl SynthesisPipeline {
    pub fn new(synthesizer: Arc<dyn SegmentSynthesizer>, config: PipelineConfig) -> Self {
        let slots = config.accelerator_slots.max(1);
        Self {
            synthesizer,
            config,
            accelerator: Semaphore::new(slots),
        }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn engine_name(&self) -> &'static str {
        self.synthesizer.engine_name()
    }

    /// Run the pipeline on a spawned task.
    ///
    /// Dropping the returned future (client went away) cancels the request:
    /// the chunk being synthesized finishes, no further chunks are dispatched
    /// and nothing is stitched.
    pub async fn run_detached(
        self: Arc<Self>,
        request: SynthesisRequest,
    ) -> Result<SynthesisOutput, PipelineError> {
        let cancel = CancellationToken::new();
        let guard = cancel.clone().drop_guard();

        let task = tokio::spawn(async move { self.synthesize(request, cancel).await });
        let result = task.await;
        guard.disarm();

        result.map_err(|e| contract_violation(format!("Synthesis task failed: {e}")))?
    }

    pub async fn synthesize(
        &self,
        request: SynthesisRequest,
        cancel: CancellationToken,
    ) -> Result<SynthesisOutput, PipelineError> {
        let text = request.text.trim();
        if text.is_empty() {
            return Err(PipelineError::EmptyText);
        }
        let length = text.chars().count();
        if length > self.config.max_text_chars {
            return Err(PipelineError::TextTooLong {
                length,
                max: self.config.max_text_chars,
            });
        }
        if validate_language(&request.language).is_err() {
            return Err(PipelineError::UnsupportedLanguage(request.language));
        }
        self.config.chunking.validate()?;

        let chunks = chunk(text, &self.config.chunking);
        check_chunks(&chunks)?;

        info!(
            "Synthesis started - chars={}, chunks={}, voice={:?}, language={}",
            length,
            chunks.len(),
            request.voice,
            request.language
        );
        let started = Instant::now();

        let permit = tokio::select! {
            permit = self.accelerator.acquire() => permit
                .map_err(|_| contract_violation("Accelerator semaphore closed".to_string()))?,
            _ = cancel.cancelled() => return Err(PipelineError::Cancelled),
        };

        let mut segments: Vec<AudioSegment> = Vec::with_capacity(chunks.len());
        for text_chunk in &chunks {
            if cancel.is_cancelled() {
                info!(
                    "Synthesis cancelled after {}/{} chunks",
                    segments.len(),
                    chunks.len()
                );
                return Err(PipelineError::Cancelled);
            }
            segments.push(self.synthesize_chunk(text_chunk, &request).await?);
        }
        drop(permit);

        if cancel.is_cancelled() {
            info!("Synthesis cancelled before stitching");
            return Err(PipelineError::Cancelled);
        }

        let stitched = stitch(segments, self.config.crossfade_ms, self.config.loudness)?;
        let wav = encode_wav(&stitched.audio)
            .map_err(|e| contract_violation(format!("WAV encoding failed: {e}")))?;

        info!(
            "Synthesis complete - chunks={}, duration_sec={:.2}, bytes={}, elapsed_ms={}",
            stitched.chunk_count,
            stitched.duration_sec(),
            wav.len(),
            started.elapsed().as_millis()
        );

        Ok(SynthesisOutput {
            audio: stitched,
            wav,
        })
    }

    async fn synthesize_chunk(
        &self,
        text_chunk: &TextChunk,
        request: &SynthesisRequest,
    ) -> Result<AudioSegment, PipelineError> {
        let chunk_index = text_chunk.index;
        let started = Instant::now();

        let call = self
            .synthesizer
            .synthesize(&text_chunk.text, &request.voice, &request.language);
        let segment = match tokio::time::timeout(self.config.chunk_timeout, call).await {
            Ok(Ok(segment)) => segment,
            Ok(Err(source)) => {
                return Err(PipelineError::Synthesis {
                    chunk_index,
                    source,
                });
            }
            Err(_) => {
                return Err(PipelineError::Synthesis {
                    chunk_index,
                    source: SynthesisError::Timeout(self.config.chunk_timeout.as_millis() as u64),
                });
            }
        };

        if segment.sample_rate != self.config.sample_rate {
            return Err(contract_violation(format!(
                "Chunk {} returned {} Hz audio, pipeline runs at {} Hz",
                chunk_index, segment.sample_rate, self.config.sample_rate
            )));
        }

        debug!(
            "Chunk {} synthesized - chars={}, duration_sec={:.2}, elapsed_ms={}",
            chunk_index,
            text_chunk.char_len(),
            segment.duration_sec(),
            started.elapsed().as_millis()
        );
        Ok(segment)
    }
}

fn check_chunks(chunks: &[TextChunk]) -> Result<(), PipelineError> {
    if chunks.is_empty() {
        return Err(contract_violation(
            "Chunker produced no chunks for non-empty text".to_string(),
        ));
    }
    for (position, text_chunk) in chunks.iter().enumerate() {
        if text_chunk.index != position {
            return Err(contract_violation(format!(
                "Chunk at position {} has index {}",
                position, text_chunk.index
            )));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::audio::decode_wav;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    const RATE: u32 = 24000;
    const SENTENCE: &str = "This sentence is exactly forty-nine chars longer.";

    /// One second of constant audio per call
    struct FakeSynthesizer {
        calls: AtomicUsize,
        in_flight: AtomicUsize,
        max_in_flight: AtomicUsize,
        fail_at: Option<usize>,
        delay: Duration,
        rate: u32,
        cancel_after_first: Option<CancellationToken>,
    }

    impl FakeSynthesizer {
        fn new() -> Self {
            Self {
                calls: AtomicUsize::new(0),
                in_flight: AtomicUsize::new(0),
                max_in_flight: AtomicUsize::new(0),
                fail_at: None,
                delay: Duration::ZERO,
                rate: RATE,
                cancel_after_first: None,
            }
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl SegmentSynthesizer for FakeSynthesizer {
        async fn synthesize(
            &self,
            _text: &str,
            _voice: &VoiceSpec,
            _language: &str,
        ) -> Result<AudioSegment, SynthesisError> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_in_flight.fetch_max(now, Ordering::SeqCst);

            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            if let Some(token) = &self.cancel_after_first {
                token.cancel();
            }
            self.in_flight.fetch_sub(1, Ordering::SeqCst);

            if self.fail_at == Some(call) {
                return Err(SynthesisError::InferenceError("CUDA error".to_string()));
            }
            Ok(AudioSegment::new(vec![0.2; RATE as usize], self.rate))
        }

        fn sample_rate(&self) -> u32 {
            self.rate
        }
    }

    fn request(text: &str) -> SynthesisRequest {
        SynthesisRequest {
            text: text.to_string(),
            voice: VoiceSpec::builtin("Ana Florence"),
            language: "en".to_string(),
        }
    }

    fn long_text() -> String {
        vec![SENTENCE; 10].join(" ")
    }

    fn pipeline(fake: Arc<FakeSynthesizer>) -> SynthesisPipeline {
        SynthesisPipeline::new(fake, PipelineConfig::default())
    }

    #[tokio::test]
    async fn test_three_chunks_stitch_to_expected_duration() {
        let fake = Arc::new(FakeSynthesizer::new());
        let pipeline = pipeline(fake.clone());

        let output = pipeline
            .synthesize(request(&long_text()), CancellationToken::new())
            .await
            .unwrap();

        let metadata = output.metadata();
        assert_eq!(fake.calls(), 3);
        assert_eq!(metadata.chunk_count, 3);
        assert_eq!(metadata.sample_rate, RATE);
        assert!((metadata.duration_sec - 2.92).abs() < 1e-9);

        let (decoded, info) = decode_wav(&output.wav).unwrap();
        assert_eq!(info.sample_rate, RATE);
        assert_eq!(decoded.len(), 3 * 24000 - 2 * 960);
        assert!((decoded.peak() - 0.95).abs() < 1e-3);
    }

    #[tokio::test]
    async fn test_short_text_is_one_chunk() {
        let fake = Arc::new(FakeSynthesizer::new());
        let output = pipeline(fake.clone())
            .synthesize(request("  Hello there.  "), CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(fake.calls(), 1);
        assert_eq!(output.metadata().chunk_count, 1);
        assert!((output.metadata().duration_sec - 1.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_input_validation() {
        let fake = Arc::new(FakeSynthesizer::new());
        let pipeline = pipeline(fake.clone());

        let err = pipeline
            .synthesize(request("   "), CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::EmptyText));
        assert_eq!(err.class(), ErrorClass::Validation);

        let mut bad_language = request("Hello.");
        bad_language.language = "xx".to_string();
        let err = pipeline
            .synthesize(bad_language, CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::UnsupportedLanguage(ref l) if l == "xx"));

        let err = pipeline
            .synthesize(request(&"a".repeat(5001)), CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::TextTooLong { length: 5001, max: 5000 }));

        assert_eq!(fake.calls(), 0);
    }

    #[tokio::test]
    async fn test_chunk_failure_aborts_request() {
        let fake = Arc::new(FakeSynthesizer {
            fail_at: Some(1),
            ..FakeSynthesizer::new()
        });
        let err = pipeline(fake.clone())
            .synthesize(request(&long_text()), CancellationToken::new())
            .await
            .unwrap_err();

        assert!(matches!(err, PipelineError::Synthesis { chunk_index: 1, .. }));
        assert_eq!(err.class(), ErrorClass::Collaborator);
        assert_eq!(fake.calls(), 2);
    }

    #[tokio::test]
    async fn test_chunk_timeout_is_a_collaborator_failure() {
        let fake = Arc::new(FakeSynthesizer {
            delay: Duration::from_millis(200),
            ..FakeSynthesizer::new()
        });
        let pipeline = SynthesisPipeline::new(
            fake,
            PipelineConfig {
                chunk_timeout: Duration::from_millis(20),
                ..Default::default()
            },
        );
        let err = pipeline
            .synthesize(request("Hello."), CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            PipelineError::Synthesis {
                chunk_index: 0,
                source: SynthesisError::Timeout(20)
            }
        ));
    }

    #[tokio::test]
    async fn test_wrong_sample_rate_is_a_contract_violation() {
        let fake = Arc::new(FakeSynthesizer {
            rate: 22050,
            ..FakeSynthesizer::new()
        });
        let err = pipeline(fake)
            .synthesize(request("Hello."), CancellationToken::new())
            .await
            .unwrap_err();
        assert_eq!(err.class(), ErrorClass::ContractViolation);
    }

    #[tokio::test]
    async fn test_cancelled_before_dispatch() {
        let fake = Arc::new(FakeSynthesizer::new());
        let cancel = CancellationToken::new();
        cancel.cancel();
        let err = pipeline(fake.clone())
            .synthesize(request(&long_text()), cancel)
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::Cancelled));
        assert_eq!(fake.calls(), 0);
    }

    #[tokio::test]
    async fn test_cancel_lets_in_flight_chunk_finish() {
        let cancel = CancellationToken::new();
        let fake = Arc::new(FakeSynthesizer {
            cancel_after_first: Some(cancel.clone()),
            ..FakeSynthesizer::new()
        });
        let err = pipeline(fake.clone())
            .synthesize(request(&long_text()), cancel)
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::Cancelled));
        assert_eq!(fake.calls(), 1);
    }

    #[test]
    fn test_stitch_errors_keep_their_class() {
        let empty = PipelineError::from(StitchError::EmptyInput);
        assert!(matches!(empty, PipelineError::NoSegments));
        assert_eq!(empty.class(), ErrorClass::Validation);

        let mismatch = PipelineError::from(StitchError::SampleRateMismatch {
            index: 1,
            expected: 24000,
            found: 22050,
        });
        assert_eq!(mismatch.class(), ErrorClass::ContractViolation);
    }

    #[tokio::test]
    async fn test_dropping_detached_request_stops_dispatch() {
        let fake = Arc::new(FakeSynthesizer {
            delay: Duration::from_millis(100),
            ..FakeSynthesizer::new()
        });
        let pipeline = Arc::new(pipeline(fake.clone()));

        let result = tokio::time::timeout(
            Duration::from_millis(150),
            pipeline.clone().run_detached(request(&long_text())),
        )
        .await;
        assert!(result.is_err());

        tokio::time::sleep(Duration::from_millis(300)).await;
        assert!(fake.calls() < 3);
    }

    #[tokio::test]
    async fn test_requests_take_turns_on_accelerator() {
        let fake = Arc::new(FakeSynthesizer {
            delay: Duration::from_millis(10),
            ..FakeSynthesizer::new()
        });
        let pipeline = Arc::new(pipeline(fake.clone()));

        let a = pipeline.clone().run_detached(request(&long_text()));
        let b = pipeline.clone().run_detached(request(&long_text()));
        let (a, b) = tokio::join!(a, b);
        a.unwrap();
        b.unwrap();

        assert_eq!(fake.calls(), 6);
        assert_eq!(fake.max_in_flight.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_non_contiguous_chunks_rejected() {
        let chunks = vec![
            TextChunk {
                index: 0,
                text: "a".to_string(),
                is_last: false,
            },
            TextChunk {
                index: 2,
                text: "b".to_string(),
                is_last: true,
            },
        ];
        assert!(matches!(
            check_chunks(&chunks),
            Err(PipelineError::ContractViolation(_))
        ));
    }
}

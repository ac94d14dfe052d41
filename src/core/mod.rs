pub mod audio;
pub mod cache;
pub mod stt;
pub mod text;
pub mod tts;

// Re-export commonly used types for convenience
pub use audio::{AudioSegment, LoudnessTarget, StitchError, StitchedAudio, stitch};
pub use cache::{SpeakerCache, SpeakerCacheConfig, SpeakerDiscovery, SpeakerLookup};
pub use stt::{Transcriber, Transcription, TranscriptionError, TranscriptionService};
pub use text::{ChunkingSpec, TextChunk, chunk};
pub use tts::{
    PipelineConfig, PipelineError, SegmentSynthesizer, SynthesisError, SynthesisPipeline,
    SynthesisRequest, VoiceSpec,
};

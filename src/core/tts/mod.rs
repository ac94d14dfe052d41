mod base;
pub mod pipeline;
pub mod remote;

pub use base::{
    DEFAULT_LANGUAGE, SUPPORTED_LANGUAGES, SegmentSynthesizer, SynthesisError, SynthesisResult,
    VoiceSpec, validate_language,
};
pub use pipeline::{
    ErrorClass, PipelineConfig, PipelineError, SynthesisMetadata, SynthesisOutput,
    SynthesisPipeline, SynthesisRequest,
};
pub use remote::{RemoteModelConfig, RemoteSpeechModel};

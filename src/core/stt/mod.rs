mod base;
pub mod languages;
pub mod remote;
pub mod service;

pub use base::{Transcriber, TranscriptSegment, Transcription, TranscriptionError, WordSegment};
pub use languages::{WHISPER_LANGUAGES, language_name, languages_by_name};
pub use remote::{RemoteTranscriber, RemoteTranscriberConfig};
pub use service::{TranscriptionConfig, TranscriptionService};

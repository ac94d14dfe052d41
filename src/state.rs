use std::sync::Arc;

use thiserror::Error;
use tracing::info;

use crate::config::ServerConfig;
use crate::core::audio::ReferenceAudioLimits;
use crate::core::cache::{DurableStore, ObjectStoreBackend, SpeakerCache, SpeakerDiscovery, StoreError};
use crate::core::stt::{RemoteTranscriber, Transcriber, TranscriptionError, TranscriptionService};
use crate::core::tts::{RemoteSpeechModel, SegmentSynthesizer, SynthesisError, SynthesisPipeline};

#[derive(Debug, Error)]
pub enum StartupError {
    #[error("Failed to create speech model client: {0}")]
    Synthesizer(#[from] SynthesisError),

    #[error("Failed to create transcription client: {0}")]
    Transcriber(#[from] TranscriptionError),

    #[error("Failed to open speaker cache store: {0}")]
    Store(#[from] StoreError),
}

/// Shared state handed to every handler
pub struct AppState {
    pub config: ServerConfig,
    pub pipeline: Arc<SynthesisPipeline>,
    pub speaker_cache: Arc<SpeakerCache>,
    /// `None` when no transcription worker is configured
    pub transcription: Option<Arc<TranscriptionService>>,
    pub reference_limits: ReferenceAudioLimits,
}

impl AppState {
    /// Build state against the configured model workers
    ///
    /// One model client serves both synthesis and speaker discovery.
    pub async fn new(config: ServerConfig) -> Result<Arc<Self>, StartupError> {
        let model = Arc::new(RemoteSpeechModel::new(config.remote_model_config())?);

        let store: Arc<dyn DurableStore> = match &config.model_volume_path {
            Some(path) => {
                info!("Speaker cache stored on model volume - path={}", path.display());
                Arc::new(ObjectStoreBackend::local(path)?)
            }
            None => {
                info!("MODEL_VOLUME_PATH not set, speaker cache kept in memory");
                Arc::new(ObjectStoreBackend::in_memory())
            }
        };

        let transcriber: Option<Arc<dyn Transcriber>> = match config.remote_transcriber_config() {
            Some(stt_config) => Some(Arc::new(RemoteTranscriber::new(stt_config)?)),
            None => {
                info!("STT_WORKER_URL not set, transcription routes disabled");
                None
            }
        };

        Ok(Self::from_parts(
            config,
            model.clone(),
            model,
            store,
            transcriber,
        ))
    }

    /// Assemble state from already-built collaborators
    pub fn from_parts(
        config: ServerConfig,
        synthesizer: Arc<dyn SegmentSynthesizer>,
        discovery: Arc<dyn SpeakerDiscovery>,
        store: Arc<dyn DurableStore>,
        transcriber: Option<Arc<dyn Transcriber>>,
    ) -> Arc<Self> {
        let pipeline = Arc::new(SynthesisPipeline::new(
            synthesizer,
            config.pipeline_config(),
        ));
        let speaker_cache = Arc::new(SpeakerCache::new(
            store,
            discovery,
            config.speaker_cache_config(),
        ));
        let transcription = transcriber.map(|transcriber| {
            Arc::new(TranscriptionService::new(
                transcriber,
                config.transcription_config(),
            ))
        });
        let reference_limits = config.reference_audio_limits();

        Arc::new(Self {
            config,
            pipeline,
            speaker_cache,
            transcription,
            reference_limits,
        })
    }
}

use std::sync::Arc;

use axum::{
    Json,
    extract::{Multipart, State},
    http::{HeaderMap, HeaderName, HeaderValue, header},
    response::{IntoResponse, Response},
};
use bytes::Bytes;
use serde::Deserialize;
use tracing::{info, warn};

use crate::core::audio::validate_reference_audio;
use crate::core::tts::{DEFAULT_LANGUAGE, SynthesisOutput, SynthesisRequest, VoiceSpec};
use crate::errors::{AppError, AppResult};
use crate::state::AppState;

fn default_language() -> String {
    DEFAULT_LANGUAGE.to_string()
}

/// Request body for `POST /tts`
#[derive(Debug, Clone, Deserialize)]
pub struct TtsRequest {
    pub text: String,
    pub speaker_id: String,
    #[serde(default = "default_language")]
    pub language: String,
}

/// WAV response carrying synthesis metadata in headers
fn audio_response(
    output: &SynthesisOutput,
    engine: &'static str,
    extra: &[(&'static str, &str)],
) -> Response {
    let metadata = output.metadata();
    let mut headers = HeaderMap::new();
    headers.insert(header::CONTENT_TYPE, HeaderValue::from_static("audio/wav"));
    headers.insert(
        HeaderName::from_static("x-sample-rate"),
        HeaderValue::from(metadata.sample_rate),
    );
    headers.insert(
        HeaderName::from_static("x-chunks"),
        HeaderValue::from(metadata.chunk_count),
    );
    headers.insert(
        HeaderName::from_static("x-engine"),
        HeaderValue::from_static(engine),
    );
    if let Ok(value) = HeaderValue::from_str(&format!("{:.2}", metadata.duration_sec)) {
        headers.insert(HeaderName::from_static("x-duration-sec"), value);
    }
    for &(name, value) in extra {
        // Speaker names outside visible ASCII are left out of the headers
        if let Ok(value) = HeaderValue::from_str(value) {
            headers.insert(HeaderName::from_static(name), value);
        }
    }

    (headers, output.wav.clone()).into_response()
}

/// Synthesize speech with a built-in speaker
pub async fn speak_handler(
    State(state): State<Arc<AppState>>,
    Json(request): Json<TtsRequest>,
) -> AppResult<Response> {
    info!(
        "TTS request - speaker={}, language={}, text_len={}",
        request.speaker_id,
        request.language,
        request.text.chars().count()
    );

    let speaker = request.speaker_id.clone();
    let output = state
        .pipeline
        .clone()
        .run_detached(SynthesisRequest {
            text: request.text,
            voice: VoiceSpec::builtin(request.speaker_id),
            language: request.language,
        })
        .await?;

    let metadata = output.metadata();
    info!(
        "TTS complete - audio_bytes={}, duration_sec={:.2}, chunks={}",
        output.wav.len(),
        metadata.duration_sec,
        metadata.chunk_count
    );

    Ok(audio_response(
        &output,
        state.pipeline.engine_name(),
        &[("x-speaker", speaker.as_str())],
    ))
}

/// Synthesize speech in the voice of an uploaded reference clip
///
/// Multipart fields: `text`, optional `language` (default `en`) and a WAV
/// `reference_audio` file.
pub async fn voice_clone_handler(
    State(state): State<Arc<AppState>>,
    mut multipart: Multipart,
) -> AppResult<Response> {
    let mut text: Option<String> = None;
    let mut language: Option<String> = None;
    let mut reference_audio: Option<Bytes> = None;

    while let Some(field) = multipart.next_field().await? {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "text" => text = Some(field.text().await?),
            "language" => language = Some(field.text().await?),
            "reference_audio" => reference_audio = Some(field.bytes().await?),
            _ => warn!("Ignoring unexpected multipart field: {}", name),
        }
    }

    let text = text.ok_or_else(|| AppError::missing_field("text"))?;
    let reference_audio =
        reference_audio.ok_or_else(|| AppError::missing_field("reference_audio"))?;
    let language = language
        .map(|l| l.trim().to_string())
        .filter(|l| !l.is_empty())
        .unwrap_or_else(default_language);

    let validation = validate_reference_audio(&reference_audio, &state.reference_limits)?;
    if let Some(warning) = validation.warning_message() {
        warn!("Reference audio accepted with warnings: {}", warning);
    }

    info!(
        "Voice clone request - language={}, text_len={}, ref_bytes={}, ref_duration_sec={:.1}",
        language,
        text.chars().count(),
        reference_audio.len(),
        validation.duration_sec
    );

    let output = state
        .pipeline
        .clone()
        .run_detached(SynthesisRequest {
            text,
            voice: VoiceSpec::Clone { reference_audio },
            language,
        })
        .await
        .map_err(|e| AppError::from_pipeline(e, "voice_clone_failed"))?;

    let metadata = output.metadata();
    info!(
        "Voice clone complete - audio_bytes={}, duration_sec={:.2}, chunks={}",
        output.wav.len(),
        metadata.duration_sec,
        metadata.chunk_count
    );

    Ok(audio_response(
        &output,
        state.pipeline.engine_name(),
        &[("x-mode", "voice_clone")],
    ))
}

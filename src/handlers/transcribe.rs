use std::sync::Arc;

use axum::{
    Json,
    extract::{Multipart, State},
};
use bytes::Bytes;
use tracing::{info, warn};

use crate::core::stt::Transcription;
use crate::errors::{AppError, AppResult};
use crate::state::AppState;

/// Transcribe an uploaded audio file with word-level timestamps
///
/// Multipart fields: `audio` (`file` is accepted as well) and an optional
/// `language`. The language is detected when omitted.
pub async fn transcribe_handler(
    State(state): State<Arc<AppState>>,
    mut multipart: Multipart,
) -> AppResult<Json<Transcription>> {
    let service = state.transcription.clone().ok_or_else(|| {
        AppError::ServiceUnavailable("Transcription is not configured".to_string())
    })?;

    let mut audio: Option<(Bytes, Option<String>)> = None;
    let mut language: Option<String> = None;

    while let Some(field) = multipart.next_field().await? {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "audio" | "file" => {
                let filename = field.file_name().map(str::to_string);
                audio = Some((field.bytes().await?, filename));
            }
            "language" => language = Some(field.text().await?),
            _ => warn!("Ignoring unexpected multipart field: {}", name),
        }
    }

    let (audio, filename) = audio.ok_or_else(|| AppError::missing_field("audio"))?;

    info!(
        "Transcription request - filename={:?}, bytes={}, language={}",
        filename,
        audio.len(),
        language.as_deref().unwrap_or("auto")
    );

    let transcription = service
        .transcribe(audio, filename.as_deref(), language.as_deref())
        .await?;

    Ok(Json(transcription))
}

use axum::{
    Router,
    extract::DefaultBodyLimit,
    routing::{get, post},
};
use tower_http::trace::TraceLayer;

use crate::config::ServerConfig;
use crate::handlers::{api, languages, speak, speakers, transcribe};
use crate::state::AppState;
use std::sync::Arc;

/// Headroom for multipart boundaries and text fields on top of the file limit
const MULTIPART_OVERHEAD_BYTES: usize = 1024 * 1024;

/// Create the API router
///
/// Upload routes raise axum's default body limit to the configured file
/// limits; the handlers still validate the file sizes themselves.
pub fn create_api_router(config: &ServerConfig) -> Router<Arc<AppState>> {
    let clone_limit = config.reference_audio_limits().max_bytes + MULTIPART_OVERHEAD_BYTES;
    let transcribe_limit = config.max_audio_bytes + MULTIPART_OVERHEAD_BYTES;

    Router::new()
        .route("/", get(api::health_check))
        .route("/health", get(api::health_check))
        .route("/speakers", get(speakers::list_speakers))
        .route("/tts", post(speak::speak_handler))
        .route(
            "/voice-clone",
            post(speak::voice_clone_handler).layer(DefaultBodyLimit::max(clone_limit)),
        )
        .route(
            "/transcribe",
            post(transcribe::transcribe_handler).layer(DefaultBodyLimit::max(transcribe_limit)),
        )
        .route("/languages", get(languages::list_languages))
        .layer(TraceLayer::new_for_http())
}

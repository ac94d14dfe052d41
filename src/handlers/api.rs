use std::sync::Arc;

use axum::{
    Json,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use serde_json::json;
use tracing::error;

use crate::state::AppState;

/// Health check response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub speakers_available: usize,
    pub engine: &'static str,
    pub version: &'static str,
}

/// Health check handler
///
/// Reports the number of cached speakers. A cold cache is filled on the first
/// call, so the first probe after deploy pays for discovery.
pub async fn health_check(State(state): State<Arc<AppState>>) -> Response {
    match state.speaker_cache.get(false).await {
        Ok(lookup) => Json(HealthResponse {
            status: "healthy",
            speakers_available: lookup.count,
            engine: state.pipeline.engine_name(),
            version: env!("CARGO_PKG_VERSION"),
        })
        .into_response(),
        Err(e) => {
            error!("Health check failed: {}", e);
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({"status": "unhealthy", "error": "Service unhealthy"})),
            )
                .into_response()
        }
    }
}

use std::sync::Arc;

use axum::{
    Json,
    extract::{Query, State},
};
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use tracing::info;

use crate::core::cache::{CacheStatus, SpeakerLookup};
use crate::errors::AppResult;
use crate::state::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct SpeakersQuery {
    /// Rebuild the cache before answering
    #[serde(default)]
    pub refresh: bool,
}

#[derive(Debug, Serialize)]
pub struct SpeakersResponse {
    pub speakers: Vec<String>,
    pub count: usize,
    #[serde(with = "time::serde::rfc3339")]
    pub last_updated: OffsetDateTime,
    pub cache_age_days: u64,
    pub cache_status: CacheStatus,
}

impl From<SpeakerLookup> for SpeakersResponse {
    fn from(lookup: SpeakerLookup) -> Self {
        Self {
            cache_age_days: lookup.cache_age_days(),
            speakers: lookup.speakers,
            count: lookup.count,
            last_updated: lookup.last_updated,
            cache_status: lookup.status,
        }
    }
}

/// List built-in speakers from the cache
pub async fn list_speakers(
    State(state): State<Arc<AppState>>,
    Query(query): Query<SpeakersQuery>,
) -> AppResult<Json<SpeakersResponse>> {
    let lookup = state.speaker_cache.get(query.refresh).await?;

    info!(
        "Speakers listed - count={}, status={:?}, refresh={}",
        lookup.count, lookup.status, query.refresh
    );
    Ok(Json(lookup.into()))
}

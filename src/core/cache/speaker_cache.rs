//! Stale-while-revalidate cache of the speakers a model exposes.
//!
//! Discovery is slow (it has to go through the model worker), so the result is
//! persisted as a single JSON record next to the model assets:
//!
//! - missing entry: discover synchronously, persist, return
//! - fresh entry: return it without touching discovery
//! - stale entry: return it now and refresh in a background task
//! - forced refresh: discover synchronously regardless of age
//!
//! Every rebuild overwrites the whole record.

use std::collections::HashSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use time::OffsetDateTime;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use super::store::{DurableStore, StoreError};

pub const DEFAULT_CACHE_KEY: &str = "speaker_metadata.json";
pub const DEFAULT_TTL: Duration = Duration::from_secs(10 * 24 * 60 * 60);
pub const DEFAULT_DISCOVERY_TIMEOUT: Duration = Duration::from_secs(60);

const SECONDS_PER_DAY: u64 = 24 * 60 * 60;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DiscoveryError {
    #[error("Speaker discovery failed: {0}")]
    Failed(String),

    #[error("Speaker discovery timed out after {0:?}")]
    Timeout(Duration),
}

/// Source of the speaker list, backed by the long-lived model handle
#[async_trait]
pub trait SpeakerDiscovery: Send + Sync {
    async fn discover_speakers(&self) -> Result<Vec<String>, DiscoveryError>;
}

#[derive(Debug, Error)]
pub enum CacheError {
    #[error(transparent)]
    Discovery(#[from] DiscoveryError),

    #[error("Cache store error: {0}")]
    Store(#[from] StoreError),

    #[error("Failed to serialize cache entry: {0}")]
    Serialization(String),
}

pub type CacheResult<T> = Result<T, CacheError>;

/// Durable record of one discovery run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpeakerCacheEntry {
    pub speakers: Vec<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub last_updated: OffsetDateTime,
    pub count: usize,
}

impl SpeakerCacheEntry {
    /// Build an entry, dropping duplicate names but keeping discovery order
    pub fn new(speakers: Vec<String>, last_updated: OffsetDateTime) -> Self {
        let mut seen = HashSet::with_capacity(speakers.len());
        let speakers: Vec<String> = speakers
            .into_iter()
            .filter(|name| seen.insert(name.clone()))
            .collect();
        let count = speakers.len();
        Self {
            speakers,
            last_updated,
            count,
        }
    }

    /// `count` matches the list and the list has no duplicates
    pub fn is_consistent(&self) -> bool {
        if self.count != self.speakers.len() {
            return false;
        }
        let unique: HashSet<&String> = self.speakers.iter().collect();
        unique.len() == self.speakers.len()
    }

    /// Time since `last_updated`. Timestamps in the future count as zero.
    pub fn age(&self, now: OffsetDateTime) -> Duration {
        Duration::try_from(now - self.last_updated).unwrap_or(Duration::ZERO)
    }

    pub fn to_bytes(&self) -> CacheResult<Bytes> {
        serde_json::to_vec_pretty(self)
            .map(Bytes::from)
            .map_err(|e| CacheError::Serialization(e.to_string()))
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(bytes)
    }
}

/// How a lookup was served
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CacheStatus {
    /// Nothing was stored; discovery ran on the request path
    Miss,
    Fresh,
    /// Served from an expired entry while a refresh runs in the background
    Stale,
    /// Forced rebuild
    Refreshed,
}

/// Result of [`SpeakerCache::get`]
#[derive(Debug, Clone, PartialEq)]
pub struct SpeakerLookup {
    pub speakers: Vec<String>,
    pub count: usize,
    pub last_updated: OffsetDateTime,
    pub is_stale: bool,
    pub age: Duration,
    pub status: CacheStatus,
}

impl SpeakerLookup {
    fn from_entry(entry: SpeakerCacheEntry, age: Duration, status: CacheStatus) -> Self {
        Self {
            count: entry.count,
            speakers: entry.speakers,
            last_updated: entry.last_updated,
            is_stale: status == CacheStatus::Stale,
            age,
            status,
        }
    }

    /// Whole days since the entry was written
    pub fn cache_age_days(&self) -> u64 {
        self.age.as_secs() / SECONDS_PER_DAY
    }
}

#[derive(Debug, Clone)]
pub struct SpeakerCacheConfig {
    pub key: String,
    pub ttl: Duration,
    pub discovery_timeout: Duration,
}

impl Default for SpeakerCacheConfig {
    fn default() -> Self {
        Self {
            key: DEFAULT_CACHE_KEY.to_string(),
            ttl: DEFAULT_TTL,
            discovery_timeout: DEFAULT_DISCOVERY_TIMEOUT,
        }
    }
}

pub struct SpeakerCache {
    store: Arc<dyn DurableStore>,
    discovery: Arc<dyn SpeakerDiscovery>,
    config: SpeakerCacheConfig,
    /// Serializes rebuilds so concurrent misses share one discovery call
    rebuild_lock: tokio::sync::Mutex<()>,
    refresh_in_flight: AtomicBool,
    background: Mutex<Option<JoinHandle<()>>>,
}

impl SpeakerCache {
    pub fn new(
        store: Arc<dyn DurableStore>,
        discovery: Arc<dyn SpeakerDiscovery>,
        config: SpeakerCacheConfig,
    ) -> Self {
        Self {
            store,
            discovery,
            config,
            rebuild_lock: tokio::sync::Mutex::new(()),
            refresh_in_flight: AtomicBool::new(false),
            background: Mutex::new(None),
        }
    }

    pub fn config(&self) -> &SpeakerCacheConfig {
        &self.config
    }

    /// Look up the speaker list.
    ///
    /// Failures on the synchronous paths (missing entry, forced refresh) are
    /// returned. Failures of a stale-triggered refresh are only logged.
    pub async fn get(self: &Arc<Self>, force_refresh: bool) -> CacheResult<SpeakerLookup> {
        if force_refresh {
            info!("Speaker cache forced refresh - key={}", self.config.key);
            let _guard = self.rebuild_lock.lock().await;
            return self.rebuild_locked(CacheStatus::Refreshed).await;
        }

        let now = OffsetDateTime::now_utc();
        match self.load_entry().await? {
            Some(entry) => {
                let age = entry.age(now);
                if age < self.config.ttl {
                    debug!(
                        "Speaker cache hit - key={}, count={}, age_secs={}",
                        self.config.key,
                        entry.count,
                        age.as_secs()
                    );
                    Ok(SpeakerLookup::from_entry(entry, age, CacheStatus::Fresh))
                } else {
                    info!(
                        "Speaker cache stale - key={}, age_days={}, scheduling refresh",
                        self.config.key,
                        age.as_secs() / SECONDS_PER_DAY
                    );
                    self.spawn_background_refresh();
                    Ok(SpeakerLookup::from_entry(entry, age, CacheStatus::Stale))
                }
            }
            None => {
                info!("Speaker cache miss - key={}", self.config.key);
                let _guard = self.rebuild_lock.lock().await;

                // Another caller may have rebuilt while this one waited
                if let Some(entry) = self.load_entry().await? {
                    let age = entry.age(OffsetDateTime::now_utc());
                    if age < self.config.ttl {
                        return Ok(SpeakerLookup::from_entry(entry, age, CacheStatus::Fresh));
                    }
                }
                self.rebuild_locked(CacheStatus::Miss).await
            }
        }
    }

    /// Wait for the most recently spawned background refresh, if any
    pub async fn join_background_refresh(&self) {
        let handle = self.background.lock().take();
        if let Some(handle) = handle {
            if let Err(e) = handle.await {
                error!("Speaker cache background refresh task failed: {}", e);
            }
        }
    }

    pub fn is_refreshing(&self) -> bool {
        self.refresh_in_flight.load(Ordering::Acquire)
    }

    /// Read the stored entry. Unparseable or inconsistent records read as missing.
    async fn load_entry(&self) -> CacheResult<Option<SpeakerCacheEntry>> {
        let bytes = match self.store.read(&self.config.key).await {
            Ok(bytes) => bytes,
            Err(StoreError::NotFound(_)) => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        match SpeakerCacheEntry::from_bytes(&bytes) {
            Ok(entry) if entry.is_consistent() => Ok(Some(entry)),
            Ok(entry) => {
                warn!(
                    "Speaker cache entry inconsistent - key={}, count={}, listed={}, rebuilding",
                    self.config.key,
                    entry.count,
                    entry.speakers.len()
                );
                Ok(None)
            }
            Err(e) => {
                warn!(
                    "Speaker cache entry unreadable - key={}, error={}, rebuilding",
                    self.config.key, e
                );
                Ok(None)
            }
        }
    }

    /// Discover and persist. Caller must hold `rebuild_lock`.
    async fn rebuild_locked(&self, status: CacheStatus) -> CacheResult<SpeakerLookup> {
        let speakers = self.discover().await?;
        let entry = SpeakerCacheEntry::new(speakers, OffsetDateTime::now_utc());

        if entry.speakers.is_empty() {
            warn!(
                "Speaker discovery returned no speakers - key={}, entry not persisted",
                self.config.key
            );
        } else {
            self.store.write(&self.config.key, entry.to_bytes()?).await?;
            info!(
                "Speaker cache rebuilt - key={}, count={}",
                self.config.key, entry.count
            );
        }

        Ok(SpeakerLookup::from_entry(entry, Duration::ZERO, status))
    }

    async fn discover(&self) -> Result<Vec<String>, DiscoveryError> {
        let timeout = self.config.discovery_timeout;
        match tokio::time::timeout(timeout, self.discovery.discover_speakers()).await {
            Ok(result) => result,
            Err(_) => Err(DiscoveryError::Timeout(timeout)),
        }
    }

    fn spawn_background_refresh(self: &Arc<Self>) {
        if self.refresh_in_flight.swap(true, Ordering::AcqRel) {
            debug!(
                "Speaker cache refresh already in flight - key={}",
                self.config.key
            );
            return;
        }

        let cache = Arc::clone(self);
        let handle = tokio::spawn(async move {
            // Clears the flag on unwind or abort too
            let _in_flight = InFlightGuard(Arc::clone(&cache));
            {
                let _guard = cache.rebuild_lock.lock().await;

                // A forced refresh may have landed while waiting for the lock
                let still_stale = match cache.load_entry().await {
                    Ok(Some(entry)) => entry.age(OffsetDateTime::now_utc()) >= cache.config.ttl,
                    _ => true,
                };

                if still_stale {
                    match cache.rebuild_locked(CacheStatus::Refreshed).await {
                        Ok(lookup) => info!(
                            "Speaker cache background refresh complete - key={}, count={}",
                            cache.config.key, lookup.count
                        ),
                        Err(e) => error!(
                            "Speaker cache background refresh failed - key={}, error={}",
                            cache.config.key, e
                        ),
                    }
                } else {
                    debug!(
                        "Speaker cache already refreshed - key={}",
                        cache.config.key
                    );
                }
            }
        });

        *self.background.lock() = Some(handle);
    }
}

struct InFlightGuard(Arc<SpeakerCache>);

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.0.refresh_in_flight.store(false, Ordering::Release);
    }
}

pub mod speaker_cache;
pub mod store;

pub use speaker_cache::{
    CacheError, CacheResult, CacheStatus, DEFAULT_CACHE_KEY, DEFAULT_TTL, DiscoveryError,
    SpeakerCache, SpeakerCacheConfig, SpeakerCacheEntry, SpeakerDiscovery, SpeakerLookup,
};
pub use store::{DurableStore, ObjectStoreBackend, StoreError, StoreResult};

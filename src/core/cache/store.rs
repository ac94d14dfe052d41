//! Durable key/value storage backing cached metadata.
//!
//! The production backend is an `object_store` rooted at the model volume, so
//! the cache lives next to the model assets. An in-memory store is available
//! for tests and for deployments without a volume.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use object_store::{
    Error as ObjectStoreError, ObjectStore, PutPayload, local::LocalFileSystem, memory::InMemory,
    path::Path as ObjectPath,
};
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Key not found: {0}")]
    NotFound(String),

    #[error("Invalid key '{key}': {reason}")]
    InvalidKey { key: String, reason: String },

    #[error("Storage backend error: {0}")]
    Backend(String),
}

impl StoreError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound(_))
    }
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Whole-value reads and writes. A write replaces the previous value entirely.
#[async_trait]
pub trait DurableStore: Send + Sync {
    async fn read(&self, key: &str) -> StoreResult<Bytes>;

    async fn write(&self, key: &str, bytes: Bytes) -> StoreResult<()>;
}

/// [`DurableStore`] over any `object_store` backend
pub struct ObjectStoreBackend {
    inner: Arc<dyn ObjectStore>,
}

impl ObjectStoreBackend {
    pub fn new(inner: Arc<dyn ObjectStore>) -> Self {
        Self { inner }
    }

    pub fn in_memory() -> Self {
        Self::new(Arc::new(InMemory::new()))
    }

    /// Store rooted at a directory, created if missing
    pub fn local(root: impl AsRef<Path>) -> StoreResult<Self> {
        let root = root.as_ref();
        std::fs::create_dir_all(root).map_err(|e| {
            StoreError::Backend(format!("Failed to create {}: {}", root.display(), e))
        })?;
        let fs = LocalFileSystem::new_with_prefix(root)
            .map_err(|e| StoreError::Backend(e.to_string()))?;
        Ok(Self::new(Arc::new(fs)))
    }

    fn object_path(key: &str) -> StoreResult<ObjectPath> {
        ObjectPath::parse(key).map_err(|e| StoreError::InvalidKey {
            key: key.to_string(),
            reason: e.to_string(),
        })
    }
}

#[async_trait]
impl DurableStore for ObjectStoreBackend {
    async fn read(&self, key: &str) -> StoreResult<Bytes> {
        let path = Self::object_path(key)?;
        let result = match self.inner.get(&path).await {
            Ok(result) => result,
            Err(ObjectStoreError::NotFound { .. }) => {
                return Err(StoreError::NotFound(key.to_string()));
            }
            Err(e) => return Err(StoreError::Backend(e.to_string())),
        };

        let bytes = result
            .bytes()
            .await
            .map_err(|e| StoreError::Backend(e.to_string()))?;
        debug!("Read {} bytes from key={}", bytes.len(), key);
        Ok(bytes)
    }

    async fn write(&self, key: &str, bytes: Bytes) -> StoreResult<()> {
        let path = Self::object_path(key)?;
        let size = bytes.len();
        self.inner
            .put(&path, PutPayload::from(bytes))
            .await
            .map_err(|e| StoreError::Backend(e.to_string()))?;
        debug!("Wrote {} bytes to key={}", size, key);
        Ok(())
    }
}

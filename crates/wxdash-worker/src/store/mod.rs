//! Named response caches.
//!
//! A [`CacheStorage`] holds any number of isolated namespaces, each mapping a
//! request identity (the absolute URL of a GET) to a stored response. Every
//! operation is atomic from the caller's point of view.

mod memory;
mod sqlite;

pub use memory::MemoryCacheStorage;
pub use sqlite::SqliteCacheStorage;

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;
use wxdash_core::{CacheConfig, Config, StoreBackend};

use crate::best_effort::BestEffort;
use crate::error::WorkerError;
use crate::http::Response;

/// Cache storage errors.
#[derive(Debug, Clone, Error)]
pub enum CacheError {
    /// Backing store cannot be reached or refused the operation.
    #[error("Storage failure: {0}")]
    StorageFailure(String),

    #[error("Storage quota exceeded: {0}")]
    QuotaExceeded(String),

    #[error("Corrupt cache entry {key}: {reason}")]
    Corrupt { key: String, reason: String },
}

pub type CacheResult<T> = Result<T, CacheError>;

/// Backend for named caches.
#[async_trait]
pub trait CacheStorage: Send + Sync + std::fmt::Debug {
    /// Create the namespace if it does not exist. Idempotent.
    async fn open(&self, name: &str) -> CacheResult<()>;

    /// Exact-match lookup. Missing namespaces hold nothing.
    async fn get(&self, name: &str, key: &str) -> CacheResult<Option<Response>>;

    /// Insert or overwrite. Creates the namespace when missing.
    async fn put(&self, name: &str, key: &str, response: Response) -> CacheResult<()>;

    /// Returns whether an entry was removed.
    async fn delete(&self, name: &str, key: &str) -> CacheResult<bool>;

    async fn keys(&self, name: &str) -> CacheResult<Vec<String>>;

    async fn namespaces(&self) -> CacheResult<Vec<String>>;

    /// Returns whether the namespace existed.
    async fn delete_namespace(&self, name: &str) -> CacheResult<bool>;
}

/// One opened namespace of a [`CacheStorage`].
#[derive(Debug, Clone)]
pub struct CacheHandle {
    storage: Arc<dyn CacheStorage>,
    name: String,
}

impl CacheHandle {
    pub async fn open(storage: Arc<dyn CacheStorage>, name: &str) -> CacheResult<Self> {
        storage.open(name).await?;
        Ok(Self {
            storage,
            name: name.to_string(),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub async fn get(&self, key: &str) -> CacheResult<Option<Response>> {
        self.storage.get(&self.name, key).await
    }

    pub async fn put(&self, key: &str, response: Response) -> CacheResult<()> {
        self.storage.put(&self.name, key, response).await
    }

    pub async fn delete(&self, key: &str) -> CacheResult<bool> {
        self.storage.delete(&self.name, key).await
    }

    pub async fn keys(&self) -> CacheResult<Vec<String>> {
        self.storage.keys(&self.name).await
    }

    /// `put` whose failure the caller may drop.
    pub async fn store(&self, key: &str, response: Response) -> BestEffort {
        BestEffort::new("cache write", self.put(key, response).await)
    }

    /// `delete` whose failure the caller may drop.
    pub async fn evict(&self, key: &str) -> BestEffort {
        BestEffort::new("cache eviction", self.delete(key).await.map(|_| ()))
    }
}

/// Build the storage backend selected in the config.
pub fn open_storage(config: &Config) -> Result<Arc<dyn CacheStorage>, WorkerError> {
    match config.cache.store {
        StoreBackend::Memory => Ok(Arc::new(MemoryCacheStorage::new())),
        StoreBackend::Sqlite => {
            std::fs::create_dir_all(&config.config_dir).map_err(|e| {
                WorkerError::Cache(CacheError::StorageFailure(format!(
                    "Failed to create {}: {}",
                    config.config_dir.display(),
                    e
                )))
            })?;
            let path = CacheConfig::database_path(&config.config_dir);
            tracing::debug!("Opening offline cache at {}", path.display());
            Ok(Arc::new(SqliteCacheStorage::new(path)?))
        }
    }
}

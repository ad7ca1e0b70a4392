use std::collections::BTreeMap;

use async_trait::async_trait;
use parking_lot::RwLock;

use super::{CacheError, CacheResult, CacheStorage};
use crate::http::Response;

type Namespace = BTreeMap<String, Response>;

/// Process-local cache storage.
#[derive(Debug, Default)]
pub struct MemoryCacheStorage {
    namespaces: RwLock<BTreeMap<String, Namespace>>,
    /// Total entries allowed across all namespaces.
    max_entries: Option<usize>,
}

impl MemoryCacheStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Storage that rejects new entries once `max_entries` are held.
    /// Overwriting an existing key is always allowed.
    pub fn with_quota(max_entries: usize) -> Self {
        Self {
            namespaces: RwLock::new(BTreeMap::new()),
            max_entries: Some(max_entries),
        }
    }

    pub fn entry_count(&self) -> usize {
        self.namespaces.read().values().map(BTreeMap::len).sum()
    }
}

#[async_trait]
impl CacheStorage for MemoryCacheStorage {
    async fn open(&self, name: &str) -> CacheResult<()> {
        self.namespaces.write().entry(name.to_string()).or_default();
        Ok(())
    }

    async fn get(&self, name: &str, key: &str) -> CacheResult<Option<Response>> {
        Ok(self
            .namespaces
            .read()
            .get(name)
            .and_then(|ns| ns.get(key))
            .cloned())
    }

    async fn put(&self, name: &str, key: &str, response: Response) -> CacheResult<()> {
        let mut namespaces = self.namespaces.write();

        if let Some(limit) = self.max_entries {
            let exists = namespaces
                .get(name)
                .is_some_and(|ns| ns.contains_key(key));
            let held: usize = namespaces.values().map(BTreeMap::len).sum();
            if !exists && held >= limit {
                return Err(CacheError::QuotaExceeded(format!(
                    "limit of {} entries reached",
                    limit
                )));
            }
        }

        namespaces
            .entry(name.to_string())
            .or_default()
            .insert(key.to_string(), response);
        Ok(())
    }

    async fn delete(&self, name: &str, key: &str) -> CacheResult<bool> {
        Ok(self
            .namespaces
            .write()
            .get_mut(name)
            .is_some_and(|ns| ns.remove(key).is_some()))
    }

    async fn keys(&self, name: &str) -> CacheResult<Vec<String>> {
        Ok(self
            .namespaces
            .read()
            .get(name)
            .map(|ns| ns.keys().cloned().collect())
            .unwrap_or_default())
    }

    async fn namespaces(&self) -> CacheResult<Vec<String>> {
        Ok(self.namespaces.read().keys().cloned().collect())
    }

    async fn delete_namespace(&self, name: &str) -> CacheResult<bool> {
        Ok(self.namespaces.write().remove(name).is_some())
    }
}

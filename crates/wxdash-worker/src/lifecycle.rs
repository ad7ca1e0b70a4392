//! Install and activate handling.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::expiry::{CacheStamp, Clock, ExpirationPolicy};
use crate::fetch::Fetcher;
use crate::http::Request;
use crate::settings::WorkerSettings;
use crate::store::{CacheHandle, CacheStorage};

/// Worker lifecycle position.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    Parsed,
    Installing,
    Installed,
    Activating,
    Activated,
}

/// What an install pass did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InstallReport {
    /// Manifest URLs now in the static cache.
    pub precached: Vec<String>,
    /// Manifest URLs that could not be fetched or stored.
    pub failed: Vec<String>,
    /// Activate immediately instead of waiting for old clients to go away.
    pub skip_waiting: bool,
}

/// What an activate pass did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ActivateReport {
    pub deleted_caches: Vec<String>,
    pub purged_entries: usize,
    /// The worker now controls every client.
    pub claimed: bool,
}

/// Drives install and activate against a cache storage.
#[derive(Debug)]
pub struct LifecycleManager {
    settings: WorkerSettings,
    storage: Arc<dyn CacheStorage>,
    fetcher: Arc<dyn Fetcher>,
    clock: Arc<dyn Clock>,
    policy: ExpirationPolicy,
    state: Mutex<LifecycleState>,
    controlling: AtomicBool,
}

impl LifecycleManager {
    pub fn new(
        settings: WorkerSettings,
        storage: Arc<dyn CacheStorage>,
        fetcher: Arc<dyn Fetcher>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let policy = ExpirationPolicy::new(settings.weather_ttl_ms);
        Self {
            settings,
            storage,
            fetcher,
            clock,
            policy,
            state: Mutex::new(LifecycleState::Parsed),
            controlling: AtomicBool::new(false),
        }
    }

    pub fn state(&self) -> LifecycleState {
        *self.state.lock()
    }

    pub fn is_controlling(&self) -> bool {
        self.controlling.load(Ordering::SeqCst)
    }

    fn transition(&self, next: LifecycleState) {
        let mut state = self.state.lock();
        tracing::debug!("Worker lifecycle {:?} -> {:?}", *state, next);
        *state = next;
    }

    /// Pre-cache the core manifest and create the weather cache.
    pub async fn install(&self) -> InstallReport {
        self.transition(LifecycleState::Installing);
        tracing::info!("Installing offline worker");

        let mut report = InstallReport {
            skip_waiting: true,
            ..InstallReport::default()
        };

        if let Err(e) = self.storage.open(&self.settings.weather_cache).await {
            tracing::warn!("Failed to open {}: {}", self.settings.weather_cache, e);
        }

        let static_cache =
            match CacheHandle::open(self.storage.clone(), &self.settings.static_cache).await {
                Ok(cache) => Some(cache),
                Err(e) => {
                    tracing::warn!("Failed to open {}: {}", self.settings.static_cache, e);
                    None
                }
            };

        for asset in &self.settings.core_assets {
            let key = asset.as_str().to_string();
            let Some(cache) = &static_cache else {
                report.failed.push(key);
                continue;
            };

            match self.fetcher.fetch(&Request::get(asset.clone())).await {
                Ok(response) if response.is_success() => {
                    match cache.put(&key, response).await {
                        Ok(()) => report.precached.push(key),
                        Err(e) => {
                            tracing::warn!("Failed to pre-cache {}: {}", key, e);
                            report.failed.push(key);
                        }
                    }
                }
                Ok(response) => {
                    tracing::warn!("Failed to pre-cache {}: HTTP {}", key, response.status());
                    report.failed.push(key);
                }
                Err(e) => {
                    tracing::warn!("Failed to pre-cache {}: {}", key, e);
                    report.failed.push(key);
                }
            }
        }

        self.transition(LifecycleState::Installed);
        tracing::info!(
            precached = report.precached.len(),
            failed = report.failed.len(),
            "Offline worker installed"
        );
        report
    }

    /// Drop superseded caches and expired weather entries, then take control.
    pub async fn activate(&self) -> ActivateReport {
        self.transition(LifecycleState::Activating);
        tracing::info!("Activating offline worker");

        let (deleted_caches, purged_entries) =
            tokio::join!(self.delete_stale_caches(), self.purge_expired_weather());

        self.controlling.store(true, Ordering::SeqCst);
        self.transition(LifecycleState::Activated);
        tracing::info!(
            deleted = deleted_caches.len(),
            purged = purged_entries,
            "Offline worker activated and controlling clients"
        );

        ActivateReport {
            deleted_caches,
            purged_entries,
            claimed: true,
        }
    }

    async fn delete_stale_caches(&self) -> Vec<String> {
        let names = match self.storage.namespaces().await {
            Ok(names) => names,
            Err(e) => {
                tracing::warn!("Failed to list caches: {}", e);
                return Vec::new();
            }
        };

        let mut deleted = Vec::new();
        for name in names {
            if self.settings.is_current_cache(&name) {
                continue;
            }
            match self.storage.delete_namespace(&name).await {
                Ok(_) => {
                    tracing::info!("Deleted old cache {}", name);
                    deleted.push(name);
                }
                Err(e) => tracing::warn!("Failed to delete cache {}: {}", name, e),
            }
        }
        deleted
    }

    async fn purge_expired_weather(&self) -> usize {
        let cache =
            match CacheHandle::open(self.storage.clone(), &self.settings.weather_cache).await {
                Ok(cache) => cache,
                Err(e) => {
                    tracing::warn!("Failed to open {}: {}", self.settings.weather_cache, e);
                    return 0;
                }
            };

        let keys = match cache.keys().await {
            Ok(keys) => keys,
            Err(e) => {
                tracing::warn!("Failed to list {}: {}", cache.name(), e);
                return 0;
            }
        };

        let now = self.clock.now_millis();
        let mut purged = 0;
        for key in keys {
            let expired = match cache.get(&key).await {
                Ok(Some(entry)) => self
                    .policy
                    .is_expired(&CacheStamp::from_headers(entry.headers()), now),
                Ok(None) => false,
                Err(e) => {
                    // Unreadable entries are dropped along with expired ones.
                    tracing::warn!("Failed to read {}: {}", key, e);
                    true
                }
            };
            if !expired {
                continue;
            }
            match cache.delete(&key).await {
                Ok(true) => {
                    tracing::debug!("Purged expired weather entry {}", key);
                    purged += 1;
                }
                Ok(false) => {}
                Err(e) => tracing::warn!("Failed to purge {}: {}", key, e),
            }
        }
        purged
    }
}

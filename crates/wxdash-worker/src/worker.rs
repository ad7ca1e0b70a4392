//! The offline worker as seen by its host.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use wxdash_core::CacheConfig;

use crate::controller::FetchController;
use crate::error::WorkerError;
use crate::expiry::{Clock, SystemClock};
use crate::fetch::{Fetcher, HttpFetcher};
use crate::http::{Request, Response};
use crate::lifecycle::{ActivateReport, InstallReport, LifecycleManager, LifecycleState};
use crate::settings::WorkerSettings;
use crate::store::CacheStorage;

/// Event handlers a host drives.
#[async_trait]
pub trait ServiceWorker: Send + Sync + std::fmt::Debug {
    async fn on_install(&self) -> InstallReport;

    async fn on_activate(&self) -> ActivateReport;

    /// Always yields a response; offline failures are synthesized.
    async fn on_fetch(&self, request: Request) -> Response;

    /// Whether fetches should be routed through this worker.
    fn is_controlling(&self) -> bool;
}

/// Weather dashboard worker: lifecycle plus fetch interception over one
/// storage backend.
#[derive(Debug)]
pub struct OfflineWorker {
    settings: WorkerSettings,
    lifecycle: LifecycleManager,
    controller: FetchController,
}

impl OfflineWorker {
    pub fn new(
        settings: WorkerSettings,
        storage: Arc<dyn CacheStorage>,
        fetcher: Arc<dyn Fetcher>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let controller =
            FetchController::new(&settings, storage.clone(), fetcher.clone(), clock.clone());
        let lifecycle = LifecycleManager::new(settings.clone(), storage, fetcher, clock);
        Self {
            settings,
            lifecycle,
            controller,
        }
    }

    /// Worker on the real network and wall clock.
    pub fn from_config(
        config: &CacheConfig,
        storage: Arc<dyn CacheStorage>,
    ) -> Result<Self, WorkerError> {
        let settings = WorkerSettings::from_config(config)?;
        let fetcher = HttpFetcher::new(config.request_timeout_secs.map(Duration::from_secs))?;
        Ok(Self::new(
            settings,
            storage,
            Arc::new(fetcher),
            Arc::new(SystemClock),
        ))
    }

    pub fn settings(&self) -> &WorkerSettings {
        &self.settings
    }

    pub fn state(&self) -> LifecycleState {
        self.lifecycle.state()
    }

    pub fn controller(&self) -> &FetchController {
        &self.controller
    }
}

#[async_trait]
impl ServiceWorker for OfflineWorker {
    async fn on_install(&self) -> InstallReport {
        self.lifecycle.install().await
    }

    async fn on_activate(&self) -> ActivateReport {
        self.lifecycle.activate().await
    }

    async fn on_fetch(&self, request: Request) -> Response {
        self.controller.handle(request).await
    }

    fn is_controlling(&self) -> bool {
        self.lifecycle.is_controlling()
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
    use super::*;
    use crate::expiry::ManualClock;
    use crate::store::MemoryCacheStorage;
    use crate::testing::StubFetcher;
    use url::Url;

    #[tokio::test]
    async fn test_independent_workers_use_their_own_caches() {
        let storage: Arc<dyn CacheStorage> = Arc::new(MemoryCacheStorage::new());
        let fetcher = Arc::new(StubFetcher::new());
        fetcher.route("http://localhost:5173/app.js", Response::ok("js"));

        let blue = CacheConfig {
            static_cache_name: "blue-static".to_string(),
            weather_cache_name: "blue-weather".to_string(),
            ..CacheConfig::default()
        };
        let green = CacheConfig {
            static_cache_name: "green-static".to_string(),
            weather_cache_name: "green-weather".to_string(),
            ..CacheConfig::default()
        };
        let clock = Arc::new(ManualClock::new(0));
        let blue = OfflineWorker::new(
            WorkerSettings::from_config(&blue).unwrap(),
            storage.clone(),
            fetcher.clone(),
            clock.clone(),
        );
        let green = OfflineWorker::new(
            WorkerSettings::from_config(&green).unwrap(),
            storage.clone(),
            fetcher.clone(),
            clock,
        );

        let url = Url::parse("http://localhost:5173/app.js").unwrap();
        blue.on_fetch(Request::get(url)).await;

        assert_eq!(storage.keys("blue-static").await.unwrap().len(), 1);
        assert!(storage.keys("green-static").await.unwrap().is_empty());

        // Activating green deletes blue's namespaces.
        green.on_activate().await;
        assert!(storage.keys("blue-static").await.unwrap().is_empty());
        assert!(green.is_controlling());
        assert!(!blue.is_controlling());
    }

    #[test]
    fn test_from_config_builds_worker() {
        let worker = OfflineWorker::from_config(
            &CacheConfig::default(),
            Arc::new(MemoryCacheStorage::new()),
        )
        .unwrap();
        assert_eq!(worker.state(), LifecycleState::Parsed);
        assert_eq!(worker.settings().static_cache, "weather-app-cache-v2");
    }
}

//! Fetch interception.
//!
//! Every intercepted request is classified and resolved with one of three
//! strategies:
//!
//! - weather API: network first; successful responses are stamped and written
//!   to the weather cache; offline, a cached copy younger than the TTL is
//!   served, otherwise a 503 JSON error.
//! - navigation: network first; every delivered response is cached; offline,
//!   the exact page or the fallback document is served.
//! - asset: cache first; misses are fetched and successful responses cached.
//!
//! Resolution never fails. Cache errors are logged and skipped; when neither
//! the network nor the cache can answer, a synthesized 503 is returned.

use std::sync::Arc;

use url::Url;

use crate::classify::{RequestClass, RequestClassifier};
use crate::expiry::{CacheStamp, Clock, ExpirationPolicy};
use crate::fetch::Fetcher;
use crate::http::{Request, Response};
use crate::settings::WorkerSettings;
use crate::store::{CacheHandle, CacheStorage};

/// Where a resolved response came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseSource {
    Network,
    /// Cache entry for this exact request, still fresh.
    Cache,
    /// Weather entry past `expires_at` but still within one TTL of `cached_at`.
    StaleCache,
    /// Fallback document served for an offline navigation.
    Fallback,
    /// Offline error response built by the worker.
    Synthesized,
}

/// Outcome of resolving one request.
#[derive(Debug, Clone)]
pub struct Resolved {
    pub response: Response,
    pub source: ResponseSource,
    pub class: RequestClass,
}

/// Per-request strategy engine.
#[derive(Debug)]
pub struct FetchController {
    storage: Arc<dyn CacheStorage>,
    fetcher: Arc<dyn Fetcher>,
    clock: Arc<dyn Clock>,
    classifier: RequestClassifier,
    policy: ExpirationPolicy,
    static_cache: String,
    weather_cache: String,
    fallback_document: Url,
}

impl FetchController {
    pub fn new(
        settings: &WorkerSettings,
        storage: Arc<dyn CacheStorage>,
        fetcher: Arc<dyn Fetcher>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            storage,
            fetcher,
            clock,
            classifier: RequestClassifier::new(settings.weather_hosts.iter().cloned()),
            policy: ExpirationPolicy::new(settings.weather_ttl_ms),
            static_cache: settings.static_cache.clone(),
            weather_cache: settings.weather_cache.clone(),
            fallback_document: settings.fallback_document.clone(),
        }
    }

    pub fn classifier(&self) -> &RequestClassifier {
        &self.classifier
    }

    /// Resolve `request` to a response.
    pub async fn handle(&self, request: Request) -> Response {
        self.resolve(request).await.response
    }

    /// Resolve `request`, reporting where the response came from.
    pub async fn resolve(&self, request: Request) -> Resolved {
        let class = self.classifier.classify(&request);
        tracing::debug!(url = %request.url(), ?class, "Intercepted request");

        let (response, source) = match class {
            RequestClass::WeatherApi => self.network_first_weather(&request).await,
            RequestClass::Navigation => self.network_first_navigation(&request).await,
            RequestClass::Asset => self.cache_first_asset(&request).await,
        };

        tracing::debug!(
            url = %request.url(),
            status = response.status().as_u16(),
            ?source,
            "Resolved request"
        );

        Resolved {
            response,
            source,
            class,
        }
    }

    async fn network_first_weather(&self, request: &Request) -> (Response, ResponseSource) {
        match self.fetcher.fetch(request).await {
            Ok(response) => {
                if response.is_success() {
                    if let Some(key) = request.cache_key() {
                        let stamp = self.policy.stamp(self.clock.now_millis());
                        if let Some(cache) = self.open(&self.weather_cache).await {
                            cache.store(key, stamp.apply(response.clone())).await.ignore();
                        }
                    }
                }
                (response, ResponseSource::Network)
            }
            Err(e) => {
                tracing::debug!("Weather request failed, trying cache: {}", e);
                self.weather_fallback(request).await
            }
        }
    }

    async fn weather_fallback(&self, request: &Request) -> (Response, ResponseSource) {
        let offline = (Response::offline_json(), ResponseSource::Synthesized);

        let Some(key) = request.cache_key() else {
            return offline;
        };
        let Some(cache) = self.open(&self.weather_cache).await else {
            return offline;
        };
        let Some(cached) = Self::lookup(&cache, key).await else {
            tracing::info!("No cached weather data for {}", key);
            return offline;
        };

        let now = self.clock.now_millis();
        let stamp = CacheStamp::from_headers(cached.headers());

        if !self.policy.is_expired(&stamp, now) {
            return (cached, ResponseSource::Cache);
        }

        // Dead under the current write path, where expires_at is always
        // cached_at + TTL. Kept for entries written without a consistent
        // expiry header.
        if self.policy.within_fallback_window(&stamp, now) {
            tracing::debug!("Serving weather entry past its expiry header: {}", key);
            return (cached, ResponseSource::StaleCache);
        }

        tracing::info!("Cached weather data expired for {}", key);
        cache.evict(key).await.ignore();
        offline
    }

    async fn network_first_navigation(&self, request: &Request) -> (Response, ResponseSource) {
        match self.fetcher.fetch(request).await {
            Ok(response) => {
                if let Some(key) = request.cache_key() {
                    if let Some(cache) = self.open(&self.static_cache).await {
                        cache.store(key, response.clone()).await.ignore();
                    }
                }
                (response, ResponseSource::Network)
            }
            Err(e) => {
                tracing::debug!("Navigation failed, trying cache: {}", e);
                let Some(cache) = self.open(&self.static_cache).await else {
                    return (Response::offline_text(), ResponseSource::Synthesized);
                };
                if let Some(key) = request.cache_key() {
                    if let Some(hit) = Self::lookup(&cache, key).await {
                        return (hit, ResponseSource::Cache);
                    }
                }
                match Self::lookup(&cache, self.fallback_document.as_str()).await {
                    Some(shell) => (shell, ResponseSource::Fallback),
                    None => (Response::offline_text(), ResponseSource::Synthesized),
                }
            }
        }
    }

    async fn cache_first_asset(&self, request: &Request) -> (Response, ResponseSource) {
        let cache = self.open(&self.static_cache).await;

        if let (Some(cache), Some(key)) = (&cache, request.cache_key()) {
            if let Some(hit) = Self::lookup(cache, key).await {
                return (hit, ResponseSource::Cache);
            }
        }

        match self.fetcher.fetch(request).await {
            Ok(response) => {
                if response.is_success() {
                    if let (Some(cache), Some(key)) = (&cache, request.cache_key()) {
                        cache.store(key, response.clone()).await.ignore();
                    }
                }
                (response, ResponseSource::Network)
            }
            Err(e) => {
                tracing::debug!("Asset fetch failed: {}", e);
                (Response::offline_text(), ResponseSource::Synthesized)
            }
        }
    }

    /// Open a cache, treating failure as "no cache".
    async fn open(&self, name: &str) -> Option<CacheHandle> {
        match CacheHandle::open(self.storage.clone(), name).await {
            Ok(cache) => Some(cache),
            Err(e) => {
                tracing::warn!("Cache {} unavailable, continuing without it: {}", name, e);
                None
            }
        }
    }

    /// Look up a key, treating failure as a miss.
    async fn lookup(cache: &CacheHandle, key: &str) -> Option<Response> {
        match cache.get(key).await {
            Ok(hit) => hit,
            Err(e) => {
                tracing::warn!("Cache {} lookup failed for {}: {}", cache.name(), key, e);
                None
            }
        }
    }
}

//! Test doubles shared by the unit tests in this crate.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use parking_lot::Mutex;
use reqwest::StatusCode;
use wxdash_core::NetworkError;

use crate::fetch::{FetchError, Fetcher};
use crate::http::{Request, Response};
use crate::store::{CacheError, CacheResult, CacheStorage};

/// Fetcher answering from a route table; unknown URLs get a 404.
#[derive(Debug, Default)]
pub(crate) struct StubFetcher {
    routes: Mutex<HashMap<String, Response>>,
    offline: AtomicBool,
    calls: Mutex<Vec<String>>,
}

impl StubFetcher {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn route(&self, url: &str, response: Response) {
        self.routes.lock().insert(url.to_string(), response);
    }

    pub(crate) fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    pub(crate) fn calls(&self) -> Vec<String> {
        self.calls.lock().clone()
    }
}

#[async_trait]
impl Fetcher for StubFetcher {
    async fn fetch(&self, request: &Request) -> Result<Response, FetchError> {
        self.calls.lock().push(request.url().to_string());
        if self.offline.load(Ordering::SeqCst) {
            return Err(FetchError::Network(NetworkError::ConnectionFailed(
                "offline".to_string(),
            )));
        }
        Ok(self
            .routes
            .lock()
            .get(request.url().as_str())
            .cloned()
            .unwrap_or_else(|| Response::new(StatusCode::NOT_FOUND, Default::default(), "")))
    }
}

/// Storage where every operation fails.
#[derive(Debug, Default)]
pub(crate) struct BrokenStorage;

fn broken<T>() -> CacheResult<T> {
    Err(CacheError::StorageFailure("storage unavailable".to_string()))
}

#[async_trait]
impl CacheStorage for BrokenStorage {
    async fn open(&self, _name: &str) -> CacheResult<()> {
        broken()
    }

    async fn get(&self, _name: &str, _key: &str) -> CacheResult<Option<Response>> {
        broken()
    }

    async fn put(&self, _name: &str, _key: &str, _response: Response) -> CacheResult<()> {
        broken()
    }

    async fn delete(&self, _name: &str, _key: &str) -> CacheResult<bool> {
        broken()
    }

    async fn keys(&self, _name: &str) -> CacheResult<Vec<String>> {
        broken()
    }

    async fn namespaces(&self) -> CacheResult<Vec<String>> {
        broken()
    }

    async fn delete_namespace(&self, _name: &str) -> CacheResult<bool> {
        broken()
    }
}

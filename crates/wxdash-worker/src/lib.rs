//! Offline caching worker for the wxdash dashboard.
//!
//! Intercepts every request the dashboard issues and answers it from the
//! network or from one of two named caches: immutable static assets
//! (cache-first) and weather API responses (network-first with a 24 hour
//! offline fallback). Lifecycle events pre-populate and clean up the caches.

pub mod best_effort;
pub mod classify;
pub mod controller;
pub mod error;
pub mod expiry;
pub mod fetch;
pub mod host;
pub mod http;
pub mod lifecycle;
pub mod settings;
pub mod store;
pub mod worker;

#[cfg(test)]
mod testing;

pub use best_effort::BestEffort;
pub use classify::{RequestClass, RequestClassifier};
pub use controller::{FetchController, Resolved, ResponseSource};
pub use error::WorkerError;
pub use expiry::{CacheStamp, Clock, ExpirationPolicy, ManualClock, SystemClock};
pub use fetch::{FetchError, Fetcher, HttpFetcher};
pub use host::{HostError, Registration, WorkerEvent, WorkerHost};
pub use http::{Request, RequestMode, Response};
pub use lifecycle::{ActivateReport, InstallReport, LifecycleManager, LifecycleState};
pub use settings::WorkerSettings;
pub use store::{
    open_storage, CacheError, CacheHandle, CacheResult, CacheStorage, MemoryCacheStorage,
    SqliteCacheStorage,
};
pub use worker::{OfflineWorker, ServiceWorker};

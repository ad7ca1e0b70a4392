//! Time source and expiration rules for cached weather responses.
//!
//! Provenance travels with the stored response as two headers holding epoch
//! milliseconds, `X-Cached-At` and `X-Cache-Expires-At`. They are written only
//! on the cached copy, never on the response handed back to the page.

use std::sync::atomic::{AtomicI64, Ordering};

use reqwest::header::{HeaderMap, HeaderName, HeaderValue};

use crate::http::Response;

pub const CACHED_AT_HEADER: HeaderName = HeaderName::from_static("x-cached-at");
pub const EXPIRES_AT_HEADER: HeaderName = HeaderName::from_static("x-cache-expires-at");

/// Source of "now" in epoch milliseconds.
pub trait Clock: Send + Sync + std::fmt::Debug {
    fn now_millis(&self) -> i64;
}

/// Wall clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_millis(&self) -> i64 {
        chrono::Utc::now().timestamp_millis()
    }
}

/// Clock that only moves when told to. Used by tests and replay tooling.
#[derive(Debug, Default)]
pub struct ManualClock {
    now: AtomicI64,
}

impl ManualClock {
    pub fn new(now_millis: i64) -> Self {
        Self {
            now: AtomicI64::new(now_millis),
        }
    }

    pub fn set(&self, now_millis: i64) {
        self.now.store(now_millis, Ordering::SeqCst);
    }

    pub fn advance(&self, millis: i64) {
        self.now.fetch_add(millis, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now_millis(&self) -> i64 {
        self.now.load(Ordering::SeqCst)
    }
}

/// Provenance of a cached entry. Missing or unparseable headers read as `None`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CacheStamp {
    pub cached_at: Option<i64>,
    pub expires_at: Option<i64>,
}

impl CacheStamp {
    pub fn from_headers(headers: &HeaderMap) -> Self {
        Self {
            cached_at: read_millis(headers, &CACHED_AT_HEADER),
            expires_at: read_millis(headers, &EXPIRES_AT_HEADER),
        }
    }

    /// Copy of `response` carrying this stamp as headers.
    pub fn apply(&self, mut response: Response) -> Response {
        if let Some(cached_at) = self.cached_at {
            response = response.with_header(CACHED_AT_HEADER, HeaderValue::from(cached_at));
        }
        if let Some(expires_at) = self.expires_at {
            response = response.with_header(EXPIRES_AT_HEADER, HeaderValue::from(expires_at));
        }
        response
    }
}

fn read_millis(headers: &HeaderMap, name: &HeaderName) -> Option<i64> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.trim().parse::<i64>().ok())
}

/// Fixed-TTL expiration for weather entries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExpirationPolicy {
    ttl_ms: i64,
}

impl ExpirationPolicy {
    pub fn new(ttl_ms: i64) -> Self {
        Self { ttl_ms }
    }

    pub fn ttl_ms(&self) -> i64 {
        self.ttl_ms
    }

    /// Stamp for an entry written at `now`.
    pub fn stamp(&self, now: i64) -> CacheStamp {
        CacheStamp {
            cached_at: Some(now),
            expires_at: Some(now.saturating_add(self.ttl_ms)),
        }
    }

    /// An entry with no provenance at all is always expired.
    pub fn is_expired(&self, stamp: &CacheStamp, now: i64) -> bool {
        match (stamp.expires_at, stamp.cached_at) {
            (Some(expires_at), _) => now >= expires_at,
            (None, Some(cached_at)) => now.saturating_sub(cached_at) >= self.ttl_ms,
            (None, None) => true,
        }
    }

    /// True while `now` is less than one TTL past `cached_at`, whatever
    /// `expires_at` says.
    ///
    /// Entries written by [`ExpirationPolicy::stamp`] always have
    /// `expires_at == cached_at + ttl`, so this never extends their life. It
    /// only matters for entries whose expiry header is missing or disagrees
    /// with the creation time.
    pub fn within_fallback_window(&self, stamp: &CacheStamp, now: i64) -> bool {
        stamp
            .cached_at
            .is_some_and(|cached_at| now.saturating_sub(cached_at) < self.ttl_ms)
    }
}

//! Request and response values exchanged between the dashboard, the worker
//! and the network.

use std::borrow::Cow;

use reqwest::header::{HeaderMap, HeaderName, HeaderValue, CONTENT_TYPE};
use reqwest::{Method, StatusCode};
use url::Url;

/// Body of the synthesized weather-API offline response.
pub const OFFLINE_JSON_BODY: &str = r#"{"error":"Offline: No cached data available"}"#;

/// Body of the synthesized asset offline response.
pub const OFFLINE_TEXT_BODY: &str = "Offline";

/// How the request was issued by the page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RequestMode {
    /// Full document load (address bar, link click, reload).
    Navigate,
    /// Any sub-resource fetch: scripts, styles, images, API calls.
    #[default]
    Subresource,
}

/// An intercepted request.
#[derive(Debug, Clone)]
pub struct Request {
    method: Method,
    url: Url,
    mode: RequestMode,
    headers: HeaderMap,
}

impl Request {
    /// A sub-resource GET.
    pub fn get(url: Url) -> Self {
        Self {
            method: Method::GET,
            url,
            mode: RequestMode::Subresource,
            headers: HeaderMap::new(),
        }
    }

    /// A document navigation.
    pub fn navigate(url: Url) -> Self {
        Self {
            mode: RequestMode::Navigate,
            ..Self::get(url)
        }
    }

    pub fn with_method(mut self, method: Method) -> Self {
        self.method = method;
        self
    }

    pub fn with_header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    pub fn mode(&self) -> RequestMode {
        self.mode
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn is_navigation(&self) -> bool {
        self.mode == RequestMode::Navigate
    }

    /// Identity under which this request is cached.
    ///
    /// Only GET requests are cacheable; everything else returns `None` and
    /// bypasses the caches entirely.
    pub fn cache_key(&self) -> Option<&str> {
        (self.method == Method::GET).then(|| self.url.as_str())
    }
}

/// A response delivered by the network, read from a cache, or synthesized.
#[derive(Debug, Clone, PartialEq)]
pub struct Response {
    status: StatusCode,
    headers: HeaderMap,
    body: Vec<u8>,
}

impl Response {
    pub fn new(status: StatusCode, headers: HeaderMap, body: impl Into<Vec<u8>>) -> Self {
        Self {
            status,
            headers,
            body: body.into(),
        }
    }

    /// A 200 response with no headers.
    pub fn ok(body: impl Into<Vec<u8>>) -> Self {
        Self::new(StatusCode::OK, HeaderMap::new(), body)
    }

    /// 503 returned for weather API requests with no usable cache entry.
    pub fn offline_json() -> Self {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        Self::new(StatusCode::SERVICE_UNAVAILABLE, headers, OFFLINE_JSON_BODY)
    }

    /// 503 returned for anything else that cannot be served offline.
    pub fn offline_text() -> Self {
        Self::new(
            StatusCode::SERVICE_UNAVAILABLE,
            HeaderMap::new(),
            OFFLINE_TEXT_BODY,
        )
    }

    pub fn with_header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    /// 2xx
    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn header_str(&self, name: &HeaderName) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    pub fn body(&self) -> &[u8] {
        &self.body
    }

    pub fn text(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.body)
    }

    pub fn json<T: serde::de::DeserializeOwned>(&self) -> serde_json::Result<T> {
        serde_json::from_slice(&self.body)
    }

    pub fn into_parts(self) -> (StatusCode, HeaderMap, Vec<u8>) {
        (self.status, self.headers, self.body)
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
    use super::*;

    fn url(s: &str) -> Url {
        Url::parse(s).unwrap()
    }

    #[test]
    fn test_get_request_is_cacheable() {
        let req = Request::get(url("https://api.open-meteo.com/v1/forecast?latitude=1"));
        assert_eq!(
            req.cache_key(),
            Some("https://api.open-meteo.com/v1/forecast?latitude=1")
        );
        assert!(!req.is_navigation());
    }

    #[test]
    fn test_non_get_request_has_no_cache_key() {
        let req = Request::get(url("https://example.supabase.co/rest/v1/locations"))
            .with_method(Method::POST);
        assert!(req.cache_key().is_none());
    }

    #[test]
    fn test_navigate_sets_mode() {
        let req = Request::navigate(url("http://localhost:5173/"));
        assert_eq!(req.mode(), RequestMode::Navigate);
        assert_eq!(req.method(), Method::GET);
    }

    #[test]
    fn test_offline_json_shape() {
        let resp = Response::offline_json();
        assert_eq!(resp.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(resp.header_str(&CONTENT_TYPE), Some("application/json"));

        let body: serde_json::Value = resp.json().unwrap();
        assert_eq!(
            body,
            serde_json::json!({ "error": "Offline: No cached data available" })
        );
        assert_eq!(resp.text(), OFFLINE_JSON_BODY);
    }

    #[test]
    fn test_offline_text_shape() {
        let resp = Response::offline_text();
        assert_eq!(resp.status().as_u16(), 503);
        assert_eq!(resp.text(), "Offline");
        assert!(resp.headers().is_empty());
    }
}

//! Network access for the worker.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use thiserror::Error;
use wxdash_core::{NetworkError, ReqwestErrorExt};

use crate::http::{Request, Response};

const USER_AGENT: &str = concat!("wxdash/", env!("CARGO_PKG_VERSION"));

/// A request that produced no response at all. HTTP error statuses are
/// responses, not fetch errors.
#[derive(Debug, Clone, Error)]
pub enum FetchError {
    #[error("Network unavailable: {0}")]
    Network(#[from] NetworkError),

    #[error("HTTP client setup failed: {0}")]
    Client(String),
}

/// Something that can put a request on the wire.
#[async_trait]
pub trait Fetcher: Send + Sync + std::fmt::Debug {
    async fn fetch(&self, request: &Request) -> Result<Response, FetchError>;
}

/// [`Fetcher`] backed by reqwest.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: Arc<Client>,
}

impl HttpFetcher {
    /// `timeout` of `None` leaves deadlines to the transport.
    pub fn new(timeout: Option<Duration>) -> Result<Self, FetchError> {
        let mut builder = Client::builder().user_agent(USER_AGENT);
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder
            .build()
            .map_err(|e| FetchError::Client(e.to_string()))?;

        Ok(Self {
            client: Arc::new(client),
        })
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(&self, request: &Request) -> Result<Response, FetchError> {
        tracing::debug!("{} {}", request.method(), request.url());

        let response = self
            .client
            .request(request.method().clone(), request.url().clone())
            .headers(request.headers().clone())
            .send()
            .await
            .map_err(|e| FetchError::Network(e.into_network_error()))?;

        let status = response.status();
        let headers = response.headers().clone();
        let body = response
            .bytes()
            .await
            .map_err(|e| FetchError::Network(e.into_network_error()))?;

        tracing::debug!("{} {} -> {}", request.method(), request.url(), status);
        Ok(Response::new(status, headers, body.to_vec()))
    }
}

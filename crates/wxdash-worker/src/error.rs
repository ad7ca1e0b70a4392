use thiserror::Error;
use wxdash_core::AppError;

use crate::fetch::FetchError;
use crate::store::CacheError;

/// Errors raised while setting up the worker. Request handling itself never
/// fails; see [`crate::FetchController`].
#[derive(Debug, Error)]
pub enum WorkerError {
    #[error("Invalid worker configuration: {0}")]
    Config(String),

    #[error(transparent)]
    Cache(#[from] CacheError),

    #[error(transparent)]
    Fetch(#[from] FetchError),
}

impl From<CacheError> for AppError {
    fn from(e: CacheError) -> Self {
        AppError::Cache(e.to_string())
    }
}

impl From<FetchError> for AppError {
    fn from(e: FetchError) -> Self {
        match e {
            FetchError::Network(net) => AppError::Network(net),
            FetchError::Client(msg) => AppError::Other(anyhow::anyhow!(msg)),
        }
    }
}

impl From<WorkerError> for AppError {
    fn from(e: WorkerError) -> Self {
        match e {
            WorkerError::Config(msg) => {
                AppError::Config(wxdash_core::ConfigError::Invalid(msg))
            }
            WorkerError::Cache(e) => e.into(),
            WorkerError::Fetch(e) => e.into(),
        }
    }
}

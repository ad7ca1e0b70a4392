//! Application-wide error hierarchy.
//!
//! Crates keep narrow error enums of their own and convert into [`AppError`]
//! at the edges. Every variant carries a short `user_message()` for the
//! dashboard alongside the technical `Display` text.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Network error: {0}")]
    Network(#[from] NetworkError),

    #[error("Offline store error: {0}")]
    Store(#[from] StoreError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Forecast error: {0}")]
    Forecast(#[from] ForecastError),

    /// Cache failures that surfaced outside the fetch path.
    #[error("Cache error: {0}")]
    Cache(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

impl AppError {
    pub fn user_message(&self) -> &'static str {
        match self {
            AppError::Network(e) => e.user_message(),
            AppError::Store(e) => e.user_message(),
            AppError::Config(e) => e.user_message(),
            AppError::Forecast(e) => e.user_message(),
            AppError::Cache(_) => "Offline storage is unavailable. Data will not be cached.",
            AppError::Io(_) => "Could not read or write a local file.",
            AppError::Other(_) => "Something went wrong. Please try again.",
        }
    }
}

/// The request produced no usable HTTP exchange.
#[derive(Debug, Clone, Error)]
pub enum NetworkError {
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Request timed out")]
    Timeout,

    #[error("HTTP {status}: {message}")]
    Status { status: u16, message: String },

    #[error("Malformed response body: {0}")]
    MalformedBody(String),
}

impl NetworkError {
    pub fn user_message(&self) -> &'static str {
        match self {
            NetworkError::ConnectionFailed(_) => "You appear to be offline.",
            NetworkError::Timeout => "The weather service took too long to answer.",
            NetworkError::Status { status, .. } if *status >= 500 => {
                "The weather service is having trouble. Try again later."
            }
            NetworkError::Status { .. } => "The request was rejected.",
            NetworkError::MalformedBody(_) => "The weather service sent an unreadable answer.",
        }
    }
}

/// Failures of the SQLite offline store.
#[derive(Debug, Clone, Error)]
pub enum StoreError {
    #[error("Cannot open offline store: {0}")]
    Unavailable(String),

    #[error("Offline store query failed: {0}")]
    Query(String),

    #[error("Offline store is corrupt: {0}")]
    Corrupt(String),

    #[error("Offline store is full: {0}")]
    Full(String),
}

impl StoreError {
    pub fn user_message(&self) -> &'static str {
        match self {
            StoreError::Unavailable(_) => "Saved forecasts cannot be opened.",
            StoreError::Query(_) => "Saved forecasts could not be read.",
            StoreError::Corrupt(_) => "Saved forecasts are damaged. Clear the offline cache.",
            StoreError::Full(_) => "Disk is full. New forecasts will not be saved offline.",
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid configuration: {0}")]
    Invalid(String),

    #[error("Cannot read configuration: {0}")]
    Unreadable(String),
}

impl ConfigError {
    pub fn user_message(&self) -> &'static str {
        match self {
            ConfigError::Invalid(_) => "The configuration has invalid values.",
            ConfigError::Unreadable(_) => "The configuration file could not be read.",
        }
    }
}

/// Forecast lookups as the dashboard reports them.
#[derive(Debug, Error)]
pub enum ForecastError {
    #[error("No place matches {0:?}")]
    PlaceNotFound(String),

    #[error("Open-Meteo rejected the request: {0}")]
    Rejected(String),

    /// Network down and nothing usable in the offline cache.
    #[error("Offline: {0}")]
    Offline(String),

    #[error("Open-Meteo is unavailable")]
    Unavailable,
}

impl ForecastError {
    pub fn user_message(&self) -> &'static str {
        match self {
            ForecastError::PlaceNotFound(_) => "City not found. Try another city name.",
            ForecastError::Rejected(_) => "The forecast request failed.",
            ForecastError::Offline(_) => "You are offline and no saved forecast is available.",
            ForecastError::Unavailable => "The forecast service is down. Try again later.",
        }
    }
}

/// Classify reqwest failures.
pub trait ReqwestErrorExt {
    fn into_network_error(self) -> NetworkError;
}

impl ReqwestErrorExt for reqwest::Error {
    fn into_network_error(self) -> NetworkError {
        let message = self.to_string();
        if self.is_timeout() {
            return NetworkError::Timeout;
        }
        match self.status() {
            Some(status) => NetworkError::Status {
                status: status.as_u16(),
                message,
            },
            None if self.is_decode() || self.is_body() => NetworkError::MalformedBody(message),
            None => NetworkError::ConnectionFailed(message),
        }
    }
}

/// Classify rusqlite failures by SQLite result code.
pub trait RusqliteErrorExt {
    fn into_store_error(self) -> StoreError;
}

impl RusqliteErrorExt for rusqlite::Error {
    fn into_store_error(self) -> StoreError {
        use rusqlite::ErrorCode;

        let code = match &self {
            rusqlite::Error::SqliteFailure(err, _) => Some(err.code),
            _ => None,
        };
        let message = self.to_string();
        match code {
            Some(ErrorCode::DiskFull) => StoreError::Full(message),
            Some(ErrorCode::DatabaseCorrupt | ErrorCode::NotADatabase) => {
                StoreError::Corrupt(message)
            }
            Some(ErrorCode::CannotOpen | ErrorCode::PermissionDenied) => {
                StoreError::Unavailable(message)
            }
            _ => StoreError::Query(message),
        }
    }
}

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use url::Url;

use crate::error::ConfigError;

/// Configuration validation errors
#[derive(Debug, Clone)]
pub struct ConfigValidationError {
    pub field: String,
    pub message: String,
}

impl std::fmt::Display for ConfigValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Result of config validation
#[derive(Debug, Clone, Default)]
pub struct ValidationResult {
    pub errors: Vec<ConfigValidationError>,
    pub warnings: Vec<ConfigValidationError>,
}

impl ValidationResult {
    /// Returns true if there are no errors (warnings are OK)
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn add_error(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.errors.push(ConfigValidationError {
            field: field.into(),
            message: message.into(),
        });
    }

    pub fn add_warning(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.warnings.push(ConfigValidationError {
            field: field.into(),
            message: message.into(),
        });
    }

    /// Get a message summarizing all errors
    pub fn error_summary(&self) -> String {
        self.errors
            .iter()
            .map(|e| e.to_string())
            .collect::<Vec<_>>()
            .join("; ")
    }
}

/// Offline cache time-to-live for weather responses: 24 hours.
pub const DEFAULT_WEATHER_TTL_MS: i64 = 24 * 60 * 60 * 1000;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Application configuration directory
    pub config_dir: PathBuf,

    /// Offline worker settings
    #[serde(default)]
    pub cache: CacheConfig,

    /// Weather settings
    #[serde(default)]
    pub weather: WeatherConfig,
}

/// Where the worker keeps its named caches
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    /// Process-local, lost on exit
    Memory,
    /// SQLite file under the config directory
    #[default]
    Sqlite,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Version-qualified name of the static asset cache
    pub static_cache_name: String,

    /// Version-qualified name of the weather response cache
    pub weather_cache_name: String,

    /// Paths pre-cached on install, relative to `origin`
    pub core_assets: Vec<String>,

    /// Host substrings identifying weather API requests
    pub weather_hosts: Vec<String>,

    /// Lifetime of a cached weather response in milliseconds
    pub weather_ttl_ms: i64,

    /// Origin the dashboard is served from
    pub origin: String,

    /// Document served for offline navigations with no exact cache hit
    pub fallback_document: String,

    #[serde(default)]
    pub store: StoreBackend,

    /// Optional network timeout. None leaves it to the transport.
    #[serde(default)]
    pub request_timeout_secs: Option<u64>,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            static_cache_name: "weather-app-cache-v2".to_string(),
            weather_cache_name: "weather-data-cache-v1".to_string(),
            core_assets: vec![
                "/".to_string(),
                "/index.html".to_string(),
                "/src/assets/favicon.ico".to_string(),
            ],
            weather_hosts: vec![
                "api.open-meteo.com".to_string(),
                "geocoding-api.open-meteo.com".to_string(),
            ],
            weather_ttl_ms: DEFAULT_WEATHER_TTL_MS,
            origin: "http://localhost:5173".to_string(),
            fallback_document: "/index.html".to_string(),
            store: StoreBackend::default(),
            request_timeout_secs: None,
        }
    }
}

impl CacheConfig {
    /// Parsed app origin
    pub fn origin_url(&self) -> Result<Url> {
        Url::parse(&self.origin).with_context(|| format!("Invalid origin: {}", self.origin))
    }

    /// Resolve a manifest path (e.g. `/index.html`) against the app origin
    pub fn resolve_asset(&self, path: &str) -> Result<Url> {
        self.origin_url()?
            .join(path)
            .with_context(|| format!("Invalid asset path: {}", path))
    }

    /// Names of the caches the current deployment keeps on activation
    pub fn current_cache_names(&self) -> [&str; 2] {
        [&self.static_cache_name, &self.weather_cache_name]
    }

    /// Path of the SQLite cache database inside `config_dir`
    pub fn database_path(config_dir: &Path) -> PathBuf {
        config_dir.join("offline_cache.db")
    }
}

/// Display unit system
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum UnitSystem {
    #[default]
    Metric,
    Imperial,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WeatherConfig {
    /// Unit preference for display
    #[serde(default)]
    pub units: UnitSystem,

    /// Base URL of the forecast API
    pub forecast_url: String,

    /// Base URL of the geocoding API
    pub geocoding_url: String,

    /// Days of hourly forecast to request
    #[serde(default = "default_hourly_days")]
    pub hourly_days: u8,

    /// Days of daily forecast to request
    #[serde(default = "default_daily_days")]
    pub daily_days: u8,

    /// Past days included in the daily forecast
    #[serde(default = "default_past_days")]
    pub past_days: u8,
}

fn default_hourly_days() -> u8 {
    3
}

fn default_daily_days() -> u8 {
    7
}

fn default_past_days() -> u8 {
    1
}

impl Default for WeatherConfig {
    fn default() -> Self {
        Self {
            units: UnitSystem::Metric,
            forecast_url: "https://api.open-meteo.com".to_string(),
            geocoding_url: "https://geocoding-api.open-meteo.com".to_string(),
            hourly_days: default_hourly_days(),
            daily_days: default_daily_days(),
            past_days: default_past_days(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        let config_dir = dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("wxdash");

        Self {
            config_dir,
            cache: CacheConfig::default(),
            weather: WeatherConfig::default(),
        }
    }
}

impl Config {
    /// Path of the saved-locations database inside `config_dir`
    pub fn locations_path(&self) -> PathBuf {
        self.config_dir.join("locations.db")
    }

    /// Load configuration from file, creating default if it doesn't exist
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path()?;
        Self::load_from(&config_path)
    }

    /// Load configuration from an explicit path, writing defaults when missing.
    ///
    /// Defaults written this way keep their data next to the config file.
    pub fn load_from(config_path: &Path) -> Result<Self> {
        if !config_path.exists() {
            let mut config = Self::default();
            if let Some(parent) = config_path.parent().filter(|p| !p.as_os_str().is_empty()) {
                config.config_dir = parent.to_path_buf();
            }
            config.save_to(config_path)?;
            return Ok(config);
        }

        let contents = std::fs::read_to_string(config_path).map_err(|e| {
            ConfigError::Unreadable(format!("{}: {}", config_path.display(), e))
        })?;

        let config: Config =
            toml::from_str(&contents).map_err(|e| ConfigError::Invalid(e.to_string()))?;

        Ok(config)
    }

    /// Load configuration and validate it
    ///
    /// Returns an error if validation fails with critical errors.
    pub fn load_validated() -> Result<(Self, ValidationResult)> {
        let config = Self::load()?;
        let validation = config.validate();

        if !validation.is_valid() {
            anyhow::bail!(
                "Configuration validation failed: {}",
                validation.error_summary()
            );
        }

        for warning in &validation.warnings {
            tracing::warn!("Config warning: {}", warning);
        }

        Ok((config, validation))
    }

    /// Validate the configuration
    pub fn validate(&self) -> ValidationResult {
        let mut result = ValidationResult::default();

        self.validate_url(&self.cache.origin, "cache.origin", &mut result);
        self.validate_url(&self.weather.forecast_url, "weather.forecast_url", &mut result);
        self.validate_url(&self.weather.geocoding_url, "weather.geocoding_url", &mut result);

        let cache = &self.cache;
        if cache.static_cache_name.trim().is_empty() {
            result.add_error("cache.static_cache_name", "Cache name cannot be empty");
        }
        if cache.weather_cache_name.trim().is_empty() {
            result.add_error("cache.weather_cache_name", "Cache name cannot be empty");
        }
        if cache.static_cache_name == cache.weather_cache_name {
            result.add_error(
                "cache.weather_cache_name",
                "Static and weather caches must have distinct names",
            );
        }

        if cache.weather_ttl_ms <= 0 {
            result.add_error("cache.weather_ttl_ms", "TTL must be greater than 0");
        }

        for path in &cache.core_assets {
            if !path.starts_with('/') {
                result.add_error(
                    "cache.core_assets",
                    format!("Asset path must start with '/': {}", path),
                );
            }
        }
        if !cache.fallback_document.starts_with('/') {
            result.add_error(
                "cache.fallback_document",
                "Fallback document must start with '/'",
            );
        } else if !cache.core_assets.contains(&cache.fallback_document) {
            result.add_warning(
                "cache.fallback_document",
                "Fallback document is not pre-cached on install",
            );
        }

        if cache.weather_hosts.iter().all(|h| h.trim().is_empty()) {
            result.add_warning(
                "cache.weather_hosts",
                "No weather hosts configured - weather responses will be treated as assets",
            );
        }

        if cache.request_timeout_secs == Some(0) {
            result.add_error("cache.request_timeout_secs", "Timeout cannot be 0");
        }

        for (field, days) in [
            ("weather.hourly_days", self.weather.hourly_days),
            ("weather.daily_days", self.weather.daily_days),
        ] {
            if !(1..=16).contains(&days) {
                result.add_error(field, "Forecast days must be between 1 and 16");
            }
        }
        if self.weather.past_days > 92 {
            result.add_error("weather.past_days", "Past days cannot exceed 92");
        }

        result
    }

    /// Validate a URL field
    fn validate_url(&self, url_str: &str, field_name: &str, result: &mut ValidationResult) {
        match Url::parse(url_str) {
            Ok(url) => {
                if url.scheme() != "http" && url.scheme() != "https" {
                    result.add_error(
                        field_name,
                        format!("URL must use http or https scheme, got: {}", url.scheme()),
                    );
                }

                if url.host().is_none() {
                    result.add_error(field_name, "URL must have a host");
                }

                if url.port() == Some(0) {
                    result.add_error(field_name, "Port cannot be 0");
                }
            }
            Err(e) => {
                result.add_error(field_name, format!("Invalid URL: {}", e));
            }
        }
    }

    /// Save configuration to the default location
    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::config_path()?)
    }

    /// Save configuration to an explicit path
    pub fn save_to(&self, config_path: &Path) -> Result<()> {
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent).context("Failed to create config directory")?;
        }

        let contents = toml::to_string_pretty(self).context("Failed to serialize config")?;

        std::fs::write(config_path, contents).context("Failed to write config file")?;

        Ok(())
    }

    /// Get the path to the configuration file
    fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .context("Failed to get config directory")?
            .join("wxdash");

        Ok(config_dir.join("config.toml"))
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
    use super::*;

    #[test]
    fn test_valid_default_config() {
        let config = Config::default();
        let result = config.validate();
        assert!(result.is_valid(), "Default config should be valid: {:?}", result.errors);
        assert!(result.warnings.is_empty());
    }

    #[test]
    fn test_default_cache_constants() {
        let cache = CacheConfig::default();
        assert_eq!(cache.static_cache_name, "weather-app-cache-v2");
        assert_eq!(cache.weather_cache_name, "weather-data-cache-v1");
        assert_eq!(cache.weather_ttl_ms, 86_400_000);
        assert_eq!(cache.core_assets.len(), 3);
    }

    #[test]
    fn test_invalid_origin() {
        let mut config = Config::default();
        config.cache.origin = "not-a-url".to_string();
        let result = config.validate();
        assert!(!result.is_valid());
        assert!(result.errors.iter().any(|e| e.field == "cache.origin"));
    }

    #[test]
    fn test_invalid_url_scheme() {
        let mut config = Config::default();
        config.weather.forecast_url = "ftp://api.open-meteo.com".to_string();
        let result = config.validate();
        assert!(!result.is_valid());
        assert!(result.errors.iter().any(|e| e.message.contains("http or https")));
    }

    #[test]
    fn test_same_cache_names_rejected() {
        let mut config = Config::default();
        config.cache.weather_cache_name = config.cache.static_cache_name.clone();
        let result = config.validate();
        assert!(!result.is_valid());
        assert!(result.errors.iter().any(|e| e.message.contains("distinct")));
    }

    #[test]
    fn test_relative_asset_path_rejected() {
        let mut config = Config::default();
        config.cache.core_assets.push("index.css".to_string());
        let result = config.validate();
        assert!(result.errors.iter().any(|e| e.field == "cache.core_assets"));
    }

    #[test]
    fn test_empty_weather_hosts_is_warning() {
        let mut config = Config::default();
        config.cache.weather_hosts.clear();
        let result = config.validate();
        assert!(result.is_valid());
        assert!(result.warnings.iter().any(|w| w.field == "cache.weather_hosts"));
    }

    #[test]
    fn test_forecast_days_out_of_range() {
        let mut config = Config::default();
        config.weather.daily_days = 0;
        let result = config.validate();
        assert!(result.errors.iter().any(|e| e.field == "weather.daily_days"));
    }

    #[test]
    fn test_resolve_asset_against_origin() {
        let cache = CacheConfig::default();
        let url = cache.resolve_asset("/src/assets/favicon.ico").unwrap();
        assert_eq!(url.as_str(), "http://localhost:5173/src/assets/favicon.ico");
    }

    #[test]
    fn test_load_from_writes_defaults_then_reads_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("wxdash").join("config.toml");

        let created = Config::load_from(&path).unwrap();
        assert!(path.exists());

        let loaded = Config::load_from(&path).unwrap();
        assert_eq!(loaded.cache.static_cache_name, created.cache.static_cache_name);
        assert_eq!(loaded.weather.units, UnitSystem::Metric);
    }

    #[test]
    fn test_new_config_keeps_data_next_to_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("profile").join("config.toml");

        let created = Config::load_from(&path).unwrap();
        assert_eq!(created.config_dir, dir.path().join("profile"));
        assert_eq!(
            created.locations_path(),
            dir.path().join("profile").join("locations.db")
        );

        let loaded = Config::load_from(&path).unwrap();
        assert_eq!(loaded.config_dir, created.config_dir);
    }

    #[test]
    fn test_partial_toml_uses_section_defaults() {
        let toml = r#"
            config_dir = "/tmp/wxdash"

            [weather]
            units = "imperial"
            forecast_url = "https://api.open-meteo.com"
            geocoding_url = "https://geocoding-api.open-meteo.com"
        "#;
        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.weather.units, UnitSystem::Imperial);
        assert_eq!(config.weather.hourly_days, 3);
        assert_eq!(config.cache.weather_cache_name, "weather-data-cache-v1");
        assert_eq!(config.cache.store, StoreBackend::Sqlite);
    }

    #[test]
    fn test_validation_result_error_summary() {
        let mut result = ValidationResult::default();
        result.add_error("field1", "error1");
        result.add_error("field2", "error2");
        let summary = result.error_summary();
        assert!(summary.contains("field1"));
        assert!(summary.contains("field2"));
    }

    #[test]
    fn test_malformed_file_is_invalid_config() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "cache = [not toml").unwrap();

        let err = Config::load_from(&path).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<ConfigError>(),
            Some(ConfigError::Invalid(_))
        ));
    }
}

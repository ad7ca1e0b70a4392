use url::Url;
use wxdash_core::CacheConfig;

use crate::error::WorkerError;

/// Resolved worker configuration. Built once from [`CacheConfig`] and handed
/// to the controller and lifecycle manager, so independent workers can run
/// side by side with different cache names.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerSettings {
    pub static_cache: String,
    pub weather_cache: String,
    /// Absolute URLs pre-cached on install.
    pub core_assets: Vec<Url>,
    pub weather_hosts: Vec<String>,
    pub weather_ttl_ms: i64,
    /// Absolute URL of the offline navigation fallback.
    pub fallback_document: Url,
}

impl WorkerSettings {
    pub fn from_config(config: &CacheConfig) -> Result<Self, WorkerError> {
        let resolve = |path: &str| {
            config
                .resolve_asset(path)
                .map_err(|e| WorkerError::Config(format!("{:#}", e)))
        };

        let core_assets = config
            .core_assets
            .iter()
            .map(|p| resolve(p.as_str()))
            .collect::<Result<Vec<_>, _>>()?;

        if config.static_cache_name == config.weather_cache_name {
            return Err(WorkerError::Config(
                "static and weather caches must have distinct names".to_string(),
            ));
        }

        Ok(Self {
            static_cache: config.static_cache_name.clone(),
            weather_cache: config.weather_cache_name.clone(),
            core_assets,
            weather_hosts: config.weather_hosts.clone(),
            weather_ttl_ms: config.weather_ttl_ms,
            fallback_document: resolve(config.fallback_document.as_str())?,
        })
    }

    /// Caches kept on activation; every other namespace is deleted.
    pub fn is_current_cache(&self, name: &str) -> bool {
        name == self.static_cache || name == self.weather_cache
    }
}

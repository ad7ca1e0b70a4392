use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use url::Url;
use wxdash_core::Config;
use wxdash_weather::{
    compass_direction, format_speed, format_temperature, LocationStore, RecentSearch,
    SavedLocation, WeatherProvider,
};
use wxdash_worker::{
    open_storage, CacheStorage, HttpFetcher, OfflineWorker, Registration, Request, WorkerHost,
};

/// wxdash - Weather dashboard with offline caching.
#[derive(Debug, Parser)]
#[command(name = "wxdash")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to config file (overrides the default location)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Install and activate the worker, pre-caching the app shell
    Install,

    /// Run activation again: drop old caches and expired forecasts
    Activate,

    /// List caches and their entry counts
    Status,

    /// Show the forecast for a city
    Forecast {
        /// City name, e.g. "Berlin"
        place: String,
    },

    /// Fetch a URL through the worker and print the response
    Fetch {
        url: Url,

        /// Issue the request as a page navigation
        #[arg(long)]
        navigate: bool,
    },

    /// Geocode a city and add it to the saved locations
    Save {
        place: String,
    },

    /// List saved locations
    Saved {
        /// Remove the saved location with this id
        #[arg(long, value_name = "ID")]
        delete: Option<i64>,

        /// Remove every saved location
        #[arg(long, conflicts_with = "delete")]
        clear: bool,
    },

    /// List recent searches
    Recent {
        /// Remove the search with this id
        #[arg(long, value_name = "ID")]
        delete: Option<i64>,

        /// Mark or unmark the search with this id as a favorite
        #[arg(long, value_name = "ID", conflicts_with = "delete")]
        favorite: Option<i64>,

        /// Remove every recent search
        #[arg(long, conflicts_with_all = ["delete", "favorite"])]
        clear: bool,
    },
}

/// Load the config from `path` when given, else from the default location.
/// Either way it must pass validation.
fn load_config(path: Option<&Path>) -> Result<Config> {
    let config = match path {
        Some(path) => Config::load_from(path)
            .with_context(|| format!("Failed to load config from {}", path.display()))?,
        None => return Ok(Config::load_validated()?.0),
    };

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
    Ok(config)
}

async fn register(
    config: &Config,
    storage: Arc<dyn CacheStorage>,
) -> Result<(WorkerHost, Registration)> {
    let worker = OfflineWorker::from_config(&config.cache, storage)?;
    let network = HttpFetcher::new(config.cache.request_timeout_secs.map(Duration::from_secs))?;
    let registered = WorkerHost::register(Arc::new(worker), Arc::new(network)).await?;
    Ok(registered)
}

fn open_locations(config: &Config) -> Result<Arc<LocationStore>> {
    std::fs::create_dir_all(&config.config_dir)
        .with_context(|| format!("Failed to create {}", config.config_dir.display()))?;
    let store = LocationStore::new(config.locations_path())?;
    Ok(Arc::new(store))
}

/// One line per cache namespace. Reads the store only; nothing is
/// installed or purged.
async fn status_lines(config: &Config, storage: &dyn CacheStorage) -> Result<Vec<String>> {
    let current = config.cache.current_cache_names();
    let names = storage.namespaces().await?;
    if names.is_empty() {
        return Ok(vec!["No caches".to_string()]);
    }

    let mut lines = Vec::with_capacity(names.len());
    for name in names {
        let count = storage.keys(&name).await?.len();
        let marker = if current.contains(&name.as_str()) {
            ""
        } else {
            " (stale)"
        };
        lines.push(format!("{:<28} {:>5} entries{}", name, count, marker));
    }
    Ok(lines)
}

fn timestamp(millis: i64) -> String {
    chrono::DateTime::from_timestamp_millis(millis)
        .map(|t| t.format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_else(|| "-".to_string())
}

fn saved_lines(saved: &[SavedLocation]) -> Vec<String> {
    if saved.is_empty() {
        return vec!["No saved locations".to_string()];
    }
    saved
        .iter()
        .map(|s| {
            format!(
                "{:>4}  {:<32} {:>8.3} {:>8.3}",
                s.id,
                s.place.label(),
                s.place.latitude,
                s.place.longitude
            )
        })
        .collect()
}

fn recent_lines(recent: &[RecentSearch]) -> Vec<String> {
    if recent.is_empty() {
        return vec!["No recent searches".to_string()];
    }
    recent
        .iter()
        .map(|r| {
            format!(
                "{:>4} {} {:<32} {}",
                r.id,
                if r.favorite { '*' } else { ' ' },
                r.place.label(),
                timestamp(r.searched_at)
            )
        })
        .collect()
}

async fn forecast(config: &Config, provider: &WeatherProvider, place: &str) -> Result<()> {
    let units = config.weather.units;
    let forecast = provider.forecast(place).await?;

    println!("{}", forecast.place.label());
    for day in forecast.days() {
        println!(
            "  {}  {:>9} / {:<9}  {:<12} {} {}",
            day.date,
            format_temperature(day.temp_min, units),
            format_temperature(day.temp_max, units),
            format_speed(day.wind_speed_max, units),
            compass_direction(day.wind_direction).unwrap_or("-"),
            day.description().unwrap_or("-"),
        );
    }
    if let Some(advisory) = forecast.advisory() {
        println!("\n{:?}: {}", advisory.level, advisory.message);
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    wxdash_core::init()?;

    let config = load_config(cli.config.as_deref())?;
    let storage = open_storage(&config)?;

    match cli.command {
        Commands::Install => {
            let (_, registration) = register(&config, storage).await?;
            let install = registration.install;
            println!(
                "Pre-cached {} of {} core assets",
                install.precached.len(),
                install.precached.len() + install.failed.len()
            );
            for url in &install.failed {
                println!("  failed: {}", url);
            }
            if let Some(activate) = registration.activate {
                println!(
                    "Activated: {} old caches deleted, {} expired forecasts purged",
                    activate.deleted_caches.len(),
                    activate.purged_entries
                );
            }
        }
        Commands::Activate => {
            let (host, _) = register(&config, storage).await?;
            let report = host.activate().await?;
            for name in &report.deleted_caches {
                println!("Deleted cache {}", name);
            }
            println!("Purged {} expired forecasts", report.purged_entries);
        }
        Commands::Status => {
            for line in status_lines(&config, storage.as_ref()).await? {
                println!("{}", line);
            }
        }
        Commands::Forecast { place } => {
            let history = open_locations(&config)?;
            let (host, _) = register(&config, storage).await?;
            let provider = WeatherProvider::new(host, config.weather.clone()).with_history(history);
            forecast(&config, &provider, &place).await?;
        }
        Commands::Fetch { url, navigate } => {
            let (host, _) = register(&config, storage).await?;
            let request = if navigate {
                Request::navigate(url)
            } else {
                Request::get(url)
            };
            let response = host.fetch(request).await?;
            eprintln!("HTTP {}", response.status());
            println!("{}", response.text());
        }
        Commands::Save { place } => {
            let locations = open_locations(&config)?;
            let (host, _) = register(&config, storage).await?;
            let provider = WeatherProvider::new(host, config.weather.clone());
            let place = provider.search(&place).await?;
            let id = locations.save_location(&place, chrono::Utc::now().timestamp_millis())?;
            println!("Saved {} (#{})", place.label(), id);
        }
        Commands::Saved { delete, clear } => {
            let locations = open_locations(&config)?;
            if let Some(id) = delete {
                if !locations.delete_saved(id)? {
                    anyhow::bail!("No saved location #{}", id);
                }
            } else if clear {
                println!("Removed {} saved locations", locations.clear_saved()?);
            }
            for line in saved_lines(&locations.saved_locations()?) {
                println!("{}", line);
            }
        }
        Commands::Recent {
            delete,
            favorite,
            clear,
        } => {
            let locations = open_locations(&config)?;
            if let Some(id) = delete {
                if !locations.delete_recent(id)? {
                    anyhow::bail!("No recent search #{}", id);
                }
            } else if let Some(id) = favorite {
                if locations.toggle_favorite(id)?.is_none() {
                    anyhow::bail!("No recent search #{}", id);
                }
            } else if clear {
                println!("Removed {} recent searches", locations.clear_recent()?);
            }
            for line in recent_lines(&locations.recent_searches()?) {
                println!("{}", line);
            }
        }
    }

    tracing::info!("wxdash finished");
    Ok(())
}

//! Open-Meteo client. Every request goes through the worker host, so
//! forecasts keep working offline for as long as the weather cache holds them.

use std::sync::Arc;

use serde::Deserialize;
use url::Url;
use wxdash_core::WeatherConfig;
use wxdash_worker::{Request, Response, WorkerHost};

use crate::history::LocationStore;
use crate::types::{Forecast, Place, WeatherError};

const HOURLY_FIELDS: &str = "temperature_2m,apparent_temperature,relative_humidity_2m,\
pressure_msl,wind_speed_10m,wind_direction_10m,weather_code";

const DAILY_FIELDS: &str = "temperature_2m_max,temperature_2m_min,relative_humidity_2m_mean,\
wind_speed_10m_max,wind_direction_10m_dominant,weather_code";

#[derive(Debug, Deserialize)]
struct GeocodingResponse {
    #[serde(default)]
    results: Vec<Place>,
}

#[derive(Debug, Clone)]
pub struct WeatherProvider {
    host: WorkerHost,
    config: WeatherConfig,
    history: Option<Arc<LocationStore>>,
}

impl WeatherProvider {
    pub fn new(host: WorkerHost, config: WeatherConfig) -> Self {
        Self {
            host,
            config,
            history: None,
        }
    }

    /// Record every successful forecast lookup in `history`.
    pub fn with_history(mut self, history: Arc<LocationStore>) -> Self {
        self.history = Some(history);
        self
    }

    pub fn config(&self) -> &WeatherConfig {
        &self.config
    }

    /// Resolve a free-text city name to its best match.
    pub async fn search(&self, query: &str) -> Result<Place, WeatherError> {
        let query = query.trim();
        if query.is_empty() {
            return Err(WeatherError::EmptyQuery);
        }

        let mut url = endpoint(&self.config.geocoding_url, "/v1/search")?;
        url.query_pairs_mut()
            .append_pair("name", query)
            .append_pair("count", "1")
            .append_pair("language", "en")
            .append_pair("format", "json");

        let body = self.get_json(url).await?;
        let geo: GeocodingResponse =
            serde_json::from_value(body).map_err(|e| WeatherError::Parse(e.to_string()))?;

        let place = geo
            .results
            .into_iter()
            .next()
            .ok_or_else(|| WeatherError::LocationNotFound(query.to_string()))?;

        tracing::debug!(
            "Geocoded {:?} to {} ({}, {})",
            query,
            place.label(),
            place.latitude,
            place.longitude
        );
        Ok(place)
    }

    /// Hourly forecast payload.
    pub async fn hourly(&self, place: &Place) -> Result<serde_json::Value, WeatherError> {
        let url = self.forecast_url(
            place,
            &format!(
                "hourly={}&forecast_days={}",
                HOURLY_FIELDS, self.config.hourly_days
            ),
        )?;
        self.get_json(url).await
    }

    /// Daily forecast payload, including past days.
    pub async fn daily(&self, place: &Place) -> Result<serde_json::Value, WeatherError> {
        let url = self.forecast_url(
            place,
            &format!(
                "daily={}&forecast_days={}&past_days={}",
                DAILY_FIELDS, self.config.daily_days, self.config.past_days
            ),
        )?;
        self.get_json(url).await
    }

    /// Geocode `query`, then fetch both forecasts.
    pub async fn forecast(&self, query: &str) -> Result<Forecast, WeatherError> {
        let place = self.search(query).await?;
        let hourly = self.hourly(&place).await?;
        let daily = self.daily(&place).await?;
        tracing::info!("Fetched forecast for {}", place.label());

        if let Some(history) = &self.history {
            let now = chrono::Utc::now().timestamp_millis();
            if let Err(e) = history.record_search(&place, now) {
                tracing::warn!("Failed to record search for {}: {}", place.label(), e);
            }
        }

        Ok(Forecast {
            place,
            hourly,
            daily,
        })
    }

    fn forecast_url(&self, place: &Place, series: &str) -> Result<Url, WeatherError> {
        let mut url = endpoint(&self.config.forecast_url, "/v1/forecast")?;
        url.set_query(Some(&format!(
            "latitude={}&longitude={}&{}&timezone=auto&wind_speed_unit=ms",
            place.latitude, place.longitude, series
        )));
        Ok(url)
    }

    async fn get_json(&self, url: Url) -> Result<serde_json::Value, WeatherError> {
        let response = self.host.fetch(Request::get(url)).await?;
        interpret(response)
    }
}

fn endpoint(base: &str, path: &str) -> Result<Url, WeatherError> {
    let raw = format!("{}{}", base.trim_end_matches('/'), path);
    Url::parse(&raw).map_err(|e| WeatherError::Parse(format!("Invalid URL {}: {}", raw, e)))
}

fn interpret(response: Response) -> Result<serde_json::Value, WeatherError> {
    let status = response.status();
    let body: Option<serde_json::Value> = response.json().ok();

    if status.is_success() {
        return body.ok_or_else(|| WeatherError::Parse("Response is not JSON".to_string()));
    }

    let field = |name: &str| {
        body.as_ref()
            .and_then(|b| b.get(name))
            .and_then(|v| v.as_str())
            .map(str::to_string)
    };

    if status.as_u16() == 503 {
        if let Some(error) = field("error") {
            return Err(WeatherError::Offline(error));
        }
    }

    Err(WeatherError::Api {
        status: status.as_u16(),
        message: field("reason")
            .or_else(|| field("error"))
            .unwrap_or_else(|| "Open-Meteo request failed".to_string()),
    })
}

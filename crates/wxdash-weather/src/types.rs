use serde::{Deserialize, Serialize};
use wxdash_core::{AppError, ForecastError};
use wxdash_worker::HostError;

/// A geocoded place.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Place {
    pub name: String,
    #[serde(default)]
    pub country: Option<String>,
    pub latitude: f64,
    pub longitude: f64,
}

impl Place {
    /// "Berlin, Germany", or just the name when the country is unknown.
    pub fn label(&self) -> String {
        match &self.country {
            Some(country) if !country.is_empty() => format!("{}, {}", self.name, country),
            _ => self.name.clone(),
        }
    }
}

/// One day of the daily forecast.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DaySummary {
    pub date: String,
    pub temp_min: Option<f64>,
    pub temp_max: Option<f64>,
    pub humidity_mean: Option<f64>,
    /// m/s
    pub wind_speed_max: Option<f64>,
    /// Degrees
    pub wind_direction: Option<f64>,
    pub weather_code: Option<i64>,
}

impl DaySummary {
    pub fn description(&self) -> Option<&'static str> {
        self.weather_code.map(describe_weather_code)
    }
}

/// Forecast bundle for one place. `hourly` and `daily` are the API payloads
/// as returned.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Forecast {
    pub place: Place,
    pub hourly: serde_json::Value,
    pub daily: serde_json::Value,
}

impl Forecast {
    /// Daily series zipped into per-day rows. Missing series read as `None`.
    pub fn days(&self) -> Vec<DaySummary> {
        let daily = &self.daily["daily"];
        let series = |field: &str, i: usize| daily[field].get(i).and_then(|v| v.as_f64());

        daily["time"]
            .as_array()
            .map(|times| {
                times
                    .iter()
                    .enumerate()
                    .map(|(i, time)| DaySummary {
                        date: time.as_str().unwrap_or_default().to_string(),
                        temp_min: series("temperature_2m_min", i),
                        temp_max: series("temperature_2m_max", i),
                        humidity_mean: series("relative_humidity_2m_mean", i),
                        wind_speed_max: series("wind_speed_10m_max", i),
                        wind_direction: series("wind_direction_10m_dominant", i),
                        weather_code: daily["weather_code"].get(i).and_then(|v| v.as_i64()),
                    })
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Advisory for the first day of the daily series.
    pub fn advisory(&self) -> Option<Advisory> {
        self.days()
            .first()
            .and_then(DaySummary::description)
            .and_then(Advisory::for_description)
    }
}

/// Open-Meteo WMO weather code to short text.
/// See: https://open-meteo.com/en/docs#weathervariables
pub fn describe_weather_code(code: i64) -> &'static str {
    match code {
        0 => "Clear sky",
        1 => "Mainly clear",
        2 => "Partly cloudy",
        3 => "Overcast",
        45 => "Fog",
        48 => "Depositing rime fog",
        51 => "Light drizzle",
        53 => "Moderate drizzle",
        55 => "Dense drizzle",
        56 => "Light freezing drizzle",
        57 => "Dense freezing drizzle",
        61 => "Slight rain",
        63 => "Rain",
        65 => "Heavy rain",
        66 => "Light freezing rain",
        67 => "Heavy freezing rain",
        71 => "Slight snow",
        73 => "Snow",
        75 => "Heavy snow",
        77 => "Snow grains",
        80 => "Rain showers",
        81 => "Heavy rain showers",
        82 => "Violent rain showers",
        85 => "Snow showers",
        86 => "Heavy snow showers",
        95 => "Thunderstorm",
        96 => "Thunderstorm with hail",
        99 => "Thunderstorm with heavy hail",
        _ => "—",
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdvisoryLevel {
    Info,
    Warning,
}

/// Short safety hint derived from a weather description.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Advisory {
    pub level: AdvisoryLevel,
    pub message: &'static str,
}

impl Advisory {
    pub fn for_description(description: &str) -> Option<Self> {
        let text = description.to_lowercase();
        let (level, message) = if text.contains("thunder") {
            (
                AdvisoryLevel::Warning,
                "Thunderstorm expected. Stay indoors and avoid open areas.",
            )
        } else if text.contains("snow") {
            (
                AdvisoryLevel::Warning,
                "Snow conditions expected. Drive carefully and dress warm.",
            )
        } else if text.contains("rain") || text.contains("drizzle") || text.contains("shower") {
            (AdvisoryLevel::Info, "Rainy conditions. Carry an umbrella.")
        } else if text.contains("wind") {
            (
                AdvisoryLevel::Info,
                "Windy conditions. Secure loose items outdoors.",
            )
        } else {
            return None;
        };
        Some(Self { level, message })
    }
}

/// Weather client errors
#[derive(Debug, thiserror::Error)]
pub enum WeatherError {
    #[error("Please enter a city name")]
    EmptyQuery,

    #[error("City not found: {0}")]
    LocationNotFound(String),

    /// The worker answered with its offline error: no network and no usable
    /// cached copy.
    #[error("Offline: {0}")]
    Offline(String),

    #[error("{message}: {status}")]
    Api { status: u16, message: String },

    #[error("Parse error: {0}")]
    Parse(String),

    #[error(transparent)]
    Host(#[from] HostError),
}

impl From<WeatherError> for AppError {
    fn from(e: WeatherError) -> Self {
        match e {
            WeatherError::EmptyQuery => ForecastError::PlaceNotFound(String::new()).into(),
            WeatherError::LocationNotFound(query) => ForecastError::PlaceNotFound(query).into(),
            WeatherError::Offline(msg) => ForecastError::Offline(msg).into(),
            WeatherError::Api { status: 503, .. } => ForecastError::Unavailable.into(),
            e @ WeatherError::Api { .. } => ForecastError::Rejected(e.to_string()).into(),
            WeatherError::Parse(msg) => ForecastError::Rejected(msg).into(),
            WeatherError::Host(HostError::Network(e)) => e.into(),
            WeatherError::Host(e @ HostError::Closed) => AppError::Other(e.into()),
        }
    }
}

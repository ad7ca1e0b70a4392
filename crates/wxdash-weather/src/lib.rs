//! Weather data for the wxdash dashboard
//!
//! Geocoding and forecasts from Open-Meteo, fetched through the offline
//! worker, plus unit formatting for display and a local store of saved
//! locations and recent searches.

pub mod history;
pub mod provider;
pub mod types;
pub mod units;

pub use history::{LocationStore, RecentSearch, SavedLocation, RECENT_LIMIT};
pub use provider::WeatherProvider;
pub use types::*;
pub use units::{compass_direction, format_pressure, format_speed, format_temperature};

//! Display formatting in the configured unit system.
//!
//! API values are always requested in metric with wind speed in m/s.
//! Missing values render as "-".

use wxdash_core::UnitSystem;

const MISSING: &str = "-";

/// Temperature from °C.
pub fn format_temperature(celsius: Option<f64>, units: UnitSystem) -> String {
    match (celsius, units) {
        (None, _) => MISSING.to_string(),
        (Some(c), UnitSystem::Metric) => format!("{:.1} °C", c),
        (Some(c), UnitSystem::Imperial) => format!("{:.1} °F", c * 9.0 / 5.0 + 32.0),
    }
}

/// Wind speed from m/s.
pub fn format_speed(meters_per_second: Option<f64>, units: UnitSystem) -> String {
    match (meters_per_second, units) {
        (None, _) => MISSING.to_string(),
        (Some(s), UnitSystem::Metric) => format!("{:.1} km/h", s * 3.6),
        (Some(s), UnitSystem::Imperial) => format!("{:.1} mph", s * 2.23694),
    }
}

/// Pressure from hPa.
pub fn format_pressure(hectopascals: Option<f64>, units: UnitSystem) -> String {
    match (hectopascals, units) {
        (None, _) => MISSING.to_string(),
        (Some(p), UnitSystem::Metric) => format!("{:.0} hPa", p),
        (Some(p), UnitSystem::Imperial) => format!("{:.2} inHg", p * 0.02953),
    }
}

/// Eight-point compass heading for a direction in degrees.
pub fn compass_direction(degrees: Option<f64>) -> Option<&'static str> {
    const POINTS: [&str; 8] = ["N", "NE", "E", "SE", "S", "SW", "W", "NW"];
    let degrees = degrees?;
    let index = (degrees / 45.0).round().rem_euclid(8.0) as usize;
    POINTS.get(index).copied()
}

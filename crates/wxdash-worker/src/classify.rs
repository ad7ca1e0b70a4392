use url::Url;

use crate::http::Request;

/// Which caching strategy a request gets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RequestClass {
    /// Forecast or geocoding API call: network first, weather cache fallback.
    WeatherApi,
    /// Document load: network first, static cache fallback.
    Navigation,
    /// Scripts, styles, images, fonts and anything else: cache first.
    Asset,
}

/// Maps requests to a [`RequestClass`].
#[derive(Debug, Clone)]
pub struct RequestClassifier {
    weather_hosts: Vec<String>,
}

impl RequestClassifier {
    /// `weather_hosts` are substrings matched against the URL authority
    /// (`host` or `host:port`). Empty entries are ignored.
    pub fn new<I, S>(weather_hosts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            weather_hosts: weather_hosts
                .into_iter()
                .map(Into::into)
                .filter(|h: &String| !h.trim().is_empty())
                .collect(),
        }
    }

    pub fn is_weather_api(&self, url: &Url) -> bool {
        let Some(host) = url.host_str() else {
            return false;
        };
        let authority = match url.port() {
            Some(port) => format!("{}:{}", host, port),
            None => host.to_string(),
        };
        self.weather_hosts.iter().any(|h| authority.contains(h.as_str()))
    }

    /// Weather hosts win over navigation mode.
    pub fn classify(&self, request: &Request) -> RequestClass {
        if self.is_weather_api(request.url()) {
            RequestClass::WeatherApi
        } else if request.is_navigation() {
            RequestClass::Navigation
        } else {
            RequestClass::Asset
        }
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
    use super::*;

    fn classifier() -> RequestClassifier {
        RequestClassifier::new(["api.open-meteo.com", "geocoding-api.open-meteo.com"])
    }

    fn get(s: &str) -> Request {
        Request::get(Url::parse(s).unwrap())
    }

    #[test]
    fn test_forecast_host_is_weather() {
        let req = get("https://api.open-meteo.com/v1/forecast?latitude=52.52&longitude=13.41");
        assert_eq!(classifier().classify(&req), RequestClass::WeatherApi);
    }

    #[test]
    fn test_geocoding_host_is_weather() {
        let req = get("https://geocoding-api.open-meteo.com/v1/search?name=Berlin&count=1");
        assert_eq!(classifier().classify(&req), RequestClass::WeatherApi);
    }

    #[test]
    fn test_weather_host_wins_over_navigation() {
        let req = Request::navigate(Url::parse("https://api.open-meteo.com/v1/forecast").unwrap());
        assert_eq!(classifier().classify(&req), RequestClass::WeatherApi);
    }

    #[test]
    fn test_navigation() {
        let req = Request::navigate(Url::parse("http://localhost:5173/settings").unwrap());
        assert_eq!(classifier().classify(&req), RequestClass::Navigation);
    }

    #[test]
    fn test_everything_else_is_asset() {
        for url in [
            "http://localhost:5173/assets/index-3f2a.js",
            "http://localhost:5173/src/assets/favicon.ico",
            "https://fonts.gstatic.com/s/inter.woff2",
            "https://example.supabase.co/rest/v1/locations",
        ] {
            assert_eq!(classifier().classify(&get(url)), RequestClass::Asset, "{}", url);
        }
    }

    #[test]
    fn test_authority_match_includes_port() {
        let classifier = RequestClassifier::new(["127.0.0.1:4010"]);
        assert!(classifier.is_weather_api(&Url::parse("http://127.0.0.1:4010/v1/forecast").unwrap()));
        assert!(!classifier.is_weather_api(&Url::parse("http://127.0.0.1:4011/v1/forecast").unwrap()));
    }

    #[test]
    fn test_empty_host_entries_match_nothing() {
        let classifier = RequestClassifier::new(["", "  "]);
        let req = get("https://api.open-meteo.com/v1/forecast");
        assert_eq!(classifier.classify(&req), RequestClass::Asset);
    }

    #[test]
    fn test_url_without_host_is_not_weather() {
        let req = get("data:text/plain,hello");
        assert_eq!(classifier().classify(&req), RequestClass::Asset);
    }
}

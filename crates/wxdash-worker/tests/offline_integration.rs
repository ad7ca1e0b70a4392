//! End-to-end worker tests over real HTTP.
//!
//! The app shell is served from one mock server addressed as `localhost`,
//! the weather API from another addressed as `127.0.0.1`, so the two never
//! share an authority.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use url::Url;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};
use wxdash_core::{CacheConfig, NetworkError};
use wxdash_worker::{
    CacheStamp, CacheStorage, FetchError, Fetcher, HttpFetcher, ManualClock, MemoryCacheStorage,
    OfflineWorker, Request, Response, SqliteCacheStorage, WorkerHost, WorkerSettings,
};

const T: i64 = 1_760_000_000_000;
const STATIC: &str = "weather-app-cache-v2";
const WEATHER: &str = "weather-data-cache-v1";

/// Real HTTP with an airplane-mode switch.
#[derive(Debug)]
struct Switchable {
    inner: HttpFetcher,
    offline: AtomicBool,
}

impl Switchable {
    fn new() -> Self {
        Self {
            inner: HttpFetcher::new(None).unwrap(),
            offline: AtomicBool::new(false),
        }
    }

    fn go_offline(&self) {
        self.offline.store(true, Ordering::SeqCst);
    }
}

#[async_trait]
impl Fetcher for Switchable {
    async fn fetch(&self, request: &Request) -> Result<Response, FetchError> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(FetchError::Network(NetworkError::ConnectionFailed(
                "network disabled".to_string(),
            )));
        }
        self.inner.fetch(request).await
    }
}

struct Env {
    app: MockServer,
    api: MockServer,
    config: CacheConfig,
    network: Arc<Switchable>,
    clock: Arc<ManualClock>,
}

impl Env {
    async fn start() -> Self {
        let app = MockServer::start().await;
        let api = MockServer::start().await;

        for (p, body) in [
            ("/", "<html>root</html>"),
            ("/index.html", "<html>shell</html>"),
            ("/src/assets/favicon.ico", "ico"),
        ] {
            Mock::given(method("GET"))
                .and(path(p))
                .respond_with(ResponseTemplate::new(200).set_body_string(body))
                .mount(&app)
                .await;
        }

        Mock::given(method("GET"))
            .and(path("/v1/forecast"))
            .and(query_param("latitude", "52.52"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "latitude": 52.52,
                "hourly": { "temperature_2m": [11.2, 10.8] }
            })))
            .mount(&api)
            .await;

        let config = CacheConfig {
            origin: format!("http://localhost:{}", app.address().port()),
            weather_hosts: vec![format!("127.0.0.1:{}", api.address().port())],
            ..CacheConfig::default()
        };

        Self {
            app,
            api,
            config,
            network: Arc::new(Switchable::new()),
            clock: Arc::new(ManualClock::new(T)),
        }
    }

    fn forecast_url(&self) -> Url {
        Url::parse(&format!(
            "http://127.0.0.1:{}/v1/forecast?latitude=52.52&longitude=13.41",
            self.api.address().port()
        ))
        .unwrap()
    }

    fn app_url(&self, p: &str) -> Url {
        Url::parse(&format!("http://localhost:{}{}", self.app.address().port(), p)).unwrap()
    }

    async fn register(&self, storage: Arc<dyn CacheStorage>) -> WorkerHost {
        let worker = OfflineWorker::new(
            WorkerSettings::from_config(&self.config).unwrap(),
            storage,
            self.network.clone(),
            self.clock.clone(),
        );
        let (host, _) = WorkerHost::register(Arc::new(worker), self.network.clone())
            .await
            .unwrap();
        host
    }
}

#[tokio::test]
async fn test_install_precaches_core_manifest() {
    let env = Env::start().await;
    let storage = Arc::new(MemoryCacheStorage::new());

    let host = env.register(storage.clone()).await;

    assert!(host.is_controlling());
    assert_eq!(
        storage.keys(STATIC).await.unwrap(),
        vec![
            env.app_url("/").to_string(),
            env.app_url("/index.html").to_string(),
            env.app_url("/src/assets/favicon.ico").to_string(),
        ]
    );
    assert!(storage.namespaces().await.unwrap().contains(&WEATHER.to_string()));
    assert!(storage.keys(WEATHER).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_forecast_is_cached_with_provenance() {
    let env = Env::start().await;
    let storage = Arc::new(MemoryCacheStorage::new());
    let host = env.register(storage.clone()).await;

    let response = host.fetch(Request::get(env.forecast_url())).await.unwrap();
    assert!(response.is_success());

    let keys = storage.keys(WEATHER).await.unwrap();
    assert_eq!(keys, vec![env.forecast_url().to_string()]);

    let stored = storage.get(WEATHER, &keys[0]).await.unwrap().unwrap();
    let stamp = CacheStamp::from_headers(stored.headers());
    assert_eq!(stamp.cached_at, Some(T));
    assert_eq!(stamp.expires_at, Some(T + 86_400_000));
    assert_eq!(stored.body(), response.body());
}

#[tokio::test]
async fn test_offline_forecast_served_from_cache() {
    let env = Env::start().await;
    let host = env.register(Arc::new(MemoryCacheStorage::new())).await;

    let online = host.fetch(Request::get(env.forecast_url())).await.unwrap();

    env.network.go_offline();
    env.clock.advance(3_600_000);
    let offline = host.fetch(Request::get(env.forecast_url())).await.unwrap();

    assert_eq!(offline.status().as_u16(), 200);
    assert_eq!(offline.body(), online.body());
}

#[tokio::test]
async fn test_expired_forecast_offline_is_503_and_evicted() {
    let env = Env::start().await;
    let storage = Arc::new(MemoryCacheStorage::new());
    let host = env.register(storage.clone()).await;

    host.fetch(Request::get(env.forecast_url())).await.unwrap();

    env.network.go_offline();
    env.clock.set(T + 90_000_000);
    let response = host.fetch(Request::get(env.forecast_url())).await.unwrap();

    assert_eq!(response.status().as_u16(), 503);
    assert_eq!(
        response.text(),
        r#"{"error":"Offline: No cached data available"}"#
    );
    assert!(storage.keys(WEATHER).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_offline_navigation_falls_back_to_shell() {
    let env = Env::start().await;
    let host = env.register(Arc::new(MemoryCacheStorage::new())).await;

    env.network.go_offline();
    let page = host
        .fetch(Request::navigate(env.app_url("/location/berlin")))
        .await
        .unwrap();

    assert_eq!(page.text(), "<html>shell</html>");
}

#[tokio::test]
async fn test_activation_removes_superseded_cache() {
    let env = Env::start().await;
    let storage = Arc::new(MemoryCacheStorage::new());
    storage
        .put("weather-app-cache-v1", env.app_url("/").as_str(), Response::ok("old"))
        .await
        .unwrap();

    env.register(storage.clone()).await;

    assert_eq!(storage.namespaces().await.unwrap(), vec![STATIC, WEATHER]);
}

#[tokio::test]
async fn test_activation_purges_expired_forecast() {
    let env = Env::start().await;
    let storage = Arc::new(MemoryCacheStorage::new());
    let host = env.register(storage.clone()).await;
    host.fetch(Request::get(env.forecast_url())).await.unwrap();

    env.clock.set(T + 86_400_000);
    let report = host.activate().await.unwrap();

    assert_eq!(report.purged_entries, 1);
    assert!(storage
        .get(WEATHER, env.forecast_url().as_str())
        .await
        .unwrap()
        .is_none());
}

#[tokio::test]
async fn test_sqlite_cache_survives_restart() {
    let env = Env::start().await;
    let dir = tempfile::tempdir().unwrap();
    let db = dir.path().join("offline_cache.db");

    {
        let host = env
            .register(Arc::new(SqliteCacheStorage::new(&db).unwrap()))
            .await;
        host.fetch(Request::get(env.forecast_url())).await.unwrap();
    }

    env.network.go_offline();
    let host = env
        .register(Arc::new(SqliteCacheStorage::new(&db).unwrap()))
        .await;

    let page = host.fetch(Request::navigate(env.app_url("/"))).await.unwrap();
    assert_eq!(page.text(), "<html>root</html>");

    let forecast = host.fetch(Request::get(env.forecast_url())).await.unwrap();
    assert!(forecast.is_success());
    let body: serde_json::Value = forecast.json().unwrap();
    assert_eq!(body["latitude"], 52.52);
}

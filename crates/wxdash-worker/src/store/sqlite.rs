//! SQLite-backed named caches that survive restarts.

use std::path::Path;

use async_trait::async_trait;
use parking_lot::Mutex;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::StatusCode;
use rusqlite::{params, Connection, OptionalExtension};
use wxdash_core::{RusqliteErrorExt, StoreError};

use super::{CacheError, CacheResult, CacheStorage};
use crate::http::Response;

/// SQLite cache storage. One connection, serialized behind a mutex.
#[derive(Debug)]
pub struct SqliteCacheStorage {
    conn: Mutex<Connection>,
}

impl SqliteCacheStorage {
    /// Open (or create) the database at `path`.
    pub fn new<P: AsRef<Path>>(path: P) -> CacheResult<Self> {
        let conn = Connection::open(path).map_err(storage_error)?;
        Self::with_connection(conn)
    }

    /// Create an in-memory store (for testing).
    pub fn in_memory() -> CacheResult<Self> {
        let conn = Connection::open_in_memory().map_err(storage_error)?;
        Self::with_connection(conn)
    }

    fn with_connection(conn: Connection) -> CacheResult<Self> {
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.init_schema()?;
        Ok(store)
    }

    /// Initialize the database schema.
    fn init_schema(&self) -> CacheResult<()> {
        self.conn
            .lock()
            .execute_batch(
                r#"
                CREATE TABLE IF NOT EXISTS caches (
                    name TEXT PRIMARY KEY,
                    created_at INTEGER NOT NULL
                );

                CREATE TABLE IF NOT EXISTS entries (
                    cache_name TEXT NOT NULL,
                    key TEXT NOT NULL,
                    status INTEGER NOT NULL,
                    headers_json TEXT NOT NULL,
                    body BLOB NOT NULL,
                    stored_at INTEGER NOT NULL,
                    PRIMARY KEY (cache_name, key)
                );
                "#,
            )
            .map_err(storage_error)
    }

    fn row_to_response(
        key: &str,
        status: i64,
        headers_json: &str,
        body: Vec<u8>,
    ) -> CacheResult<Response> {
        let corrupt = |reason: String| CacheError::Corrupt {
            key: key.to_string(),
            reason,
        };

        let status = u16::try_from(status)
            .ok()
            .and_then(|s| StatusCode::from_u16(s).ok())
            .ok_or_else(|| corrupt(format!("invalid status {}", status)))?;

        // Values are raw bytes; header values need not be UTF-8.
        let pairs: Vec<(String, Vec<u8>)> = serde_json::from_str(headers_json)
            .map_err(|e| corrupt(format!("invalid headers: {}", e)))?;

        let mut headers = HeaderMap::with_capacity(pairs.len());
        for (name, value) in pairs {
            let name = HeaderName::from_bytes(name.as_bytes())
                .map_err(|e| corrupt(format!("invalid header name {}: {}", name, e)))?;
            let value = HeaderValue::from_bytes(&value)
                .map_err(|e| corrupt(format!("invalid header value: {}", e)))?;
            headers.append(name, value);
        }

        Ok(Response::new(status, headers, body))
    }

    fn headers_to_json(headers: &HeaderMap) -> CacheResult<String> {
        let pairs: Vec<(&str, &[u8])> = headers
            .iter()
            .map(|(name, value)| (name.as_str(), value.as_bytes()))
            .collect();
        serde_json::to_string(&pairs).map_err(|e| CacheError::StorageFailure(e.to_string()))
    }

    fn ensure_cache(conn: &Connection, name: &str) -> rusqlite::Result<()> {
        conn.execute(
            "INSERT OR IGNORE INTO caches (name, created_at) VALUES (?1, ?2)",
            params![name, chrono::Utc::now().timestamp_millis()],
        )?;
        Ok(())
    }
}

fn storage_error(e: rusqlite::Error) -> CacheError {
    match e.into_store_error() {
        StoreError::Full(msg) => CacheError::QuotaExceeded(msg),
        other => CacheError::StorageFailure(other.to_string()),
    }
}

#[async_trait]
impl CacheStorage for SqliteCacheStorage {
    async fn open(&self, name: &str) -> CacheResult<()> {
        let conn = self.conn.lock();
        Self::ensure_cache(&conn, name).map_err(storage_error)
    }

    async fn get(&self, name: &str, key: &str) -> CacheResult<Option<Response>> {
        let row = {
            let conn = self.conn.lock();
            conn.query_row(
                "SELECT status, headers_json, body FROM entries WHERE cache_name = ?1 AND key = ?2",
                params![name, key],
                |row| {
                    Ok((
                        row.get::<_, i64>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, Vec<u8>>(2)?,
                    ))
                },
            )
            .optional()
            .map_err(storage_error)?
        };

        row.map(|(status, headers_json, body)| {
            Self::row_to_response(key, status, &headers_json, body)
        })
        .transpose()
    }

    async fn put(&self, name: &str, key: &str, response: Response) -> CacheResult<()> {
        let headers_json = Self::headers_to_json(response.headers())?;
        let status = i64::from(response.status().as_u16());

        let mut conn = self.conn.lock();
        let tx = conn.transaction().map_err(storage_error)?;
        Self::ensure_cache(&tx, name).map_err(storage_error)?;
        tx.execute(
            r#"
            INSERT OR REPLACE INTO entries
            (cache_name, key, status, headers_json, body, stored_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
            params![
                name,
                key,
                status,
                headers_json,
                response.body(),
                chrono::Utc::now().timestamp_millis(),
            ],
        )
        .map_err(storage_error)?;
        tx.commit().map_err(storage_error)
    }

    async fn delete(&self, name: &str, key: &str) -> CacheResult<bool> {
        let removed = self
            .conn
            .lock()
            .execute(
                "DELETE FROM entries WHERE cache_name = ?1 AND key = ?2",
                params![name, key],
            )
            .map_err(storage_error)?;
        Ok(removed > 0)
    }

    async fn keys(&self, name: &str) -> CacheResult<Vec<String>> {
        let conn = self.conn.lock();
        let mut stmt = conn
            .prepare("SELECT key FROM entries WHERE cache_name = ?1 ORDER BY key")
            .map_err(storage_error)?;
        let rows = stmt
            .query_map(params![name], |row| row.get::<_, String>(0))
            .map_err(storage_error)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(storage_error)
    }

    async fn namespaces(&self) -> CacheResult<Vec<String>> {
        let conn = self.conn.lock();
        let mut stmt = conn
            .prepare("SELECT name FROM caches ORDER BY name")
            .map_err(storage_error)?;
        let rows = stmt
            .query_map([], |row| row.get::<_, String>(0))
            .map_err(storage_error)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(storage_error)
    }

    async fn delete_namespace(&self, name: &str) -> CacheResult<bool> {
        let mut conn = self.conn.lock();
        let tx = conn.transaction().map_err(storage_error)?;
        tx.execute("DELETE FROM entries WHERE cache_name = ?1", params![name])
            .map_err(storage_error)?;
        let removed = tx
            .execute("DELETE FROM caches WHERE name = ?1", params![name])
            .map_err(storage_error)?;
        tx.commit().map_err(storage_error)?;
        Ok(removed > 0)
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
    use super::*;
    use reqwest::header::CONTENT_TYPE;

    fn json_response(body: &str) -> Response {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(
            HeaderName::from_static("x-cached-at"),
            HeaderValue::from(1_760_000_000_000_i64),
        );
        Response::new(StatusCode::OK, headers, body)
    }

    #[tokio::test]
    async fn test_put_and_get_preserves_response() {
        let store = SqliteCacheStorage::in_memory().unwrap();
        let original = json_response(r#"{"latitude":52.52}"#);

        store.put("weather", "https://a/1", original.clone()).await.unwrap();
        let stored = store.get("weather", "https://a/1").await.unwrap().unwrap();

        assert_eq!(stored, original);
    }

    #[tokio::test]
    async fn test_non_utf8_header_bytes_survive() {
        let store = SqliteCacheStorage::in_memory().unwrap();
        let original = Response::ok("x").with_header(
            HeaderName::from_static("x-name"),
            HeaderValue::from_bytes(&[97, 233, 98]).unwrap(),
        );

        store.put("static", "https://a/latin1", original.clone()).await.unwrap();
        let stored = store.get("static", "https://a/latin1").await.unwrap().unwrap();

        assert_eq!(stored.headers()["x-name"].as_bytes(), &[97, 233, 98]);
        assert_eq!(stored, original);
    }

    #[tokio::test]
    async fn test_get_missing_entry() {
        let store = SqliteCacheStorage::in_memory().unwrap();
        assert!(store.get("weather", "https://a/1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_overwrite_keeps_single_entry() {
        let store = SqliteCacheStorage::in_memory().unwrap();
        store.put("weather", "k", Response::ok("a")).await.unwrap();
        store.put("weather", "k", Response::ok("b")).await.unwrap();

        assert_eq!(store.keys("weather").await.unwrap(), vec!["k"]);
        assert_eq!(
            store.get("weather", "k").await.unwrap().unwrap().body(),
            b"b"
        );
    }

    #[tokio::test]
    async fn test_open_creates_empty_namespace() {
        let store = SqliteCacheStorage::in_memory().unwrap();
        store.open("weather-data-cache-v1").await.unwrap();
        store.open("weather-data-cache-v1").await.unwrap();

        assert_eq!(store.namespaces().await.unwrap(), vec!["weather-data-cache-v1"]);
        assert!(store.keys("weather-data-cache-v1").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_delete_entry_and_namespace() {
        let store = SqliteCacheStorage::in_memory().unwrap();
        store.put("old", "k1", Response::ok("1")).await.unwrap();
        store.put("old", "k2", Response::ok("2")).await.unwrap();
        store.put("keep", "k1", Response::ok("3")).await.unwrap();

        assert!(store.delete("old", "k1").await.unwrap());
        assert!(!store.delete("old", "k1").await.unwrap());

        assert!(store.delete_namespace("old").await.unwrap());
        assert_eq!(store.namespaces().await.unwrap(), vec!["keep"]);
        assert!(store.get("old", "k2").await.unwrap().is_none());
        assert!(store.get("keep", "k1").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_corrupt_headers_reported() {
        let store = SqliteCacheStorage::in_memory().unwrap();
        store.put("c", "k", Response::ok("x")).await.unwrap();
        store
            .conn
            .lock()
            .execute("UPDATE entries SET headers_json = 'nope'", [])
            .unwrap();

        let err = store.get("c", "k").await.unwrap_err();
        assert!(matches!(err, CacheError::Corrupt { .. }));
    }

    #[tokio::test]
    async fn test_entries_survive_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("offline_cache.db");

        {
            let store = SqliteCacheStorage::new(&path).unwrap();
            store.put("static", "http://localhost/", Response::ok("<html>")).await.unwrap();
        }

        let store = SqliteCacheStorage::new(&path).unwrap();
        let stored = store.get("static", "http://localhost/").await.unwrap().unwrap();
        assert_eq!(stored.text(), "<html>");
    }
}

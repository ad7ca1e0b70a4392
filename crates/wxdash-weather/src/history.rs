//! Local persistence of saved locations and recent searches.
//!
//! Both lists live in one SQLite file next to the config. A place is
//! identified by name and country, so saving or searching the same city
//! twice updates the existing row instead of adding a duplicate.

use std::path::Path;

use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension, Row};
use wxdash_core::{RusqliteErrorExt, StoreError};

use crate::types::Place;

/// Recent searches kept; older ones are dropped on insert.
pub const RECENT_LIMIT: usize = 20;

/// A place pinned by the user.
#[derive(Debug, Clone, PartialEq)]
pub struct SavedLocation {
    pub id: i64,
    pub place: Place,
    /// Epoch milliseconds
    pub saved_at: i64,
}

/// A place the user looked up.
#[derive(Debug, Clone, PartialEq)]
pub struct RecentSearch {
    pub id: i64,
    pub place: Place,
    /// Epoch milliseconds of the latest lookup
    pub searched_at: i64,
    pub favorite: bool,
}

/// SQLite store for saved locations and recent searches.
#[derive(Debug)]
pub struct LocationStore {
    conn: Mutex<Connection>,
}

impl LocationStore {
    /// Open (or create) the store at `path`.
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self, StoreError> {
        let conn = Connection::open(path).map_err(RusqliteErrorExt::into_store_error)?;
        Self::with_connection(conn)
    }

    /// Create an in-memory store (for testing).
    pub fn in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory().map_err(RusqliteErrorExt::into_store_error)?;
        Self::with_connection(conn)
    }

    fn with_connection(conn: Connection) -> Result<Self, StoreError> {
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.init_schema()?;
        Ok(store)
    }

    fn init_schema(&self) -> Result<(), StoreError> {
        self.conn
            .lock()
            .execute_batch(
                r#"
                CREATE TABLE IF NOT EXISTS saved_locations (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    name TEXT NOT NULL,
                    country TEXT NOT NULL DEFAULT '',
                    latitude REAL NOT NULL,
                    longitude REAL NOT NULL,
                    saved_at INTEGER NOT NULL,
                    UNIQUE (name, country)
                );

                CREATE TABLE IF NOT EXISTS recent_searches (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    name TEXT NOT NULL,
                    country TEXT NOT NULL DEFAULT '',
                    latitude REAL NOT NULL,
                    longitude REAL NOT NULL,
                    searched_at INTEGER NOT NULL,
                    favorite INTEGER NOT NULL DEFAULT 0,
                    UNIQUE (name, country)
                );
                "#,
            )
            .map_err(RusqliteErrorExt::into_store_error)
    }

    /// Pin `place`. Saving an already saved place refreshes its coordinates
    /// and timestamp. Returns the row id.
    pub fn save_location(&self, place: &Place, now: i64) -> Result<i64, StoreError> {
        let conn = self.conn.lock();
        conn.query_row(
            r#"
            INSERT INTO saved_locations (name, country, latitude, longitude, saved_at)
            VALUES (?1, ?2, ?3, ?4, ?5)
            ON CONFLICT (name, country) DO UPDATE SET
                latitude = excluded.latitude,
                longitude = excluded.longitude,
                saved_at = excluded.saved_at
            RETURNING id
            "#,
            params![
                place.name,
                country_key(place),
                place.latitude,
                place.longitude,
                now
            ],
            |row| row.get(0),
        )
        .map_err(RusqliteErrorExt::into_store_error)
    }

    /// Saved locations, most recently saved first.
    pub fn saved_locations(&self) -> Result<Vec<SavedLocation>, StoreError> {
        let conn = self.conn.lock();
        let mut stmt = conn
            .prepare(
                "SELECT id, name, country, latitude, longitude, saved_at
                 FROM saved_locations ORDER BY saved_at DESC, id DESC",
            )
            .map_err(RusqliteErrorExt::into_store_error)?;

        let rows = stmt
            .query_map([], |row| {
                Ok(SavedLocation {
                    id: row.get(0)?,
                    place: place_from_row(row, 1)?,
                    saved_at: row.get(5)?,
                })
            })
            .map_err(RusqliteErrorExt::into_store_error)?;

        rows.collect::<Result<Vec<_>, _>>()
            .map_err(RusqliteErrorExt::into_store_error)
    }

    /// Returns whether a row was removed.
    pub fn delete_saved(&self, id: i64) -> Result<bool, StoreError> {
        let changed = self
            .conn
            .lock()
            .execute("DELETE FROM saved_locations WHERE id = ?1", params![id])
            .map_err(RusqliteErrorExt::into_store_error)?;
        Ok(changed > 0)
    }

    /// Returns the number of rows removed.
    pub fn clear_saved(&self) -> Result<usize, StoreError> {
        self.conn
            .lock()
            .execute("DELETE FROM saved_locations", [])
            .map_err(RusqliteErrorExt::into_store_error)
    }

    /// Record a lookup of `place`, moving it to the top of the list. Keeps at
    /// most [`RECENT_LIMIT`] rows; favorites survive the trim.
    pub fn record_search(&self, place: &Place, now: i64) -> Result<i64, StoreError> {
        let mut conn = self.conn.lock();
        let tx = conn
            .transaction()
            .map_err(RusqliteErrorExt::into_store_error)?;

        let id: i64 = tx
            .query_row(
                r#"
                INSERT INTO recent_searches (name, country, latitude, longitude, searched_at)
                VALUES (?1, ?2, ?3, ?4, ?5)
                ON CONFLICT (name, country) DO UPDATE SET
                    latitude = excluded.latitude,
                    longitude = excluded.longitude,
                    searched_at = excluded.searched_at
                RETURNING id
                "#,
                params![
                    place.name,
                    country_key(place),
                    place.latitude,
                    place.longitude,
                    now
                ],
                |row| row.get(0),
            )
            .map_err(RusqliteErrorExt::into_store_error)?;

        let trimmed = tx
            .execute(
                r#"
                DELETE FROM recent_searches
                WHERE favorite = 0 AND id NOT IN (
                    SELECT id FROM recent_searches
                    ORDER BY searched_at DESC, id DESC
                    LIMIT ?1
                )
                "#,
                params![RECENT_LIMIT as i64],
            )
            .map_err(RusqliteErrorExt::into_store_error)?;

        tx.commit().map_err(RusqliteErrorExt::into_store_error)?;

        if trimmed > 0 {
            tracing::debug!("Dropped {} old recent searches", trimmed);
        }
        Ok(id)
    }

    /// Recent searches, newest first.
    pub fn recent_searches(&self) -> Result<Vec<RecentSearch>, StoreError> {
        let conn = self.conn.lock();
        let mut stmt = conn
            .prepare(
                "SELECT id, name, country, latitude, longitude, searched_at, favorite
                 FROM recent_searches ORDER BY searched_at DESC, id DESC",
            )
            .map_err(RusqliteErrorExt::into_store_error)?;

        let rows = stmt
            .query_map([], |row| {
                Ok(RecentSearch {
                    id: row.get(0)?,
                    place: place_from_row(row, 1)?,
                    searched_at: row.get(5)?,
                    favorite: row.get::<_, i64>(6)? != 0,
                })
            })
            .map_err(RusqliteErrorExt::into_store_error)?;

        rows.collect::<Result<Vec<_>, _>>()
            .map_err(RusqliteErrorExt::into_store_error)
    }

    /// Flip the favorite flag. Returns the new value, or `None` when `id` is
    /// unknown.
    pub fn toggle_favorite(&self, id: i64) -> Result<Option<bool>, StoreError> {
        self.conn
            .lock()
            .query_row(
                "UPDATE recent_searches SET favorite = 1 - favorite WHERE id = ?1 RETURNING favorite",
                params![id],
                |row| row.get::<_, i64>(0),
            )
            .optional()
            .map(|flag| flag.map(|f| f != 0))
            .map_err(RusqliteErrorExt::into_store_error)
    }

    /// Returns whether a row was removed.
    pub fn delete_recent(&self, id: i64) -> Result<bool, StoreError> {
        let changed = self
            .conn
            .lock()
            .execute("DELETE FROM recent_searches WHERE id = ?1", params![id])
            .map_err(RusqliteErrorExt::into_store_error)?;
        Ok(changed > 0)
    }

    /// Returns the number of rows removed.
    pub fn clear_recent(&self) -> Result<usize, StoreError> {
        self.conn
            .lock()
            .execute("DELETE FROM recent_searches", [])
            .map_err(RusqliteErrorExt::into_store_error)
    }
}

fn country_key(place: &Place) -> &str {
    place.country.as_deref().unwrap_or_default()
}

/// Reads name, country, latitude and longitude from four columns at `first`.
fn place_from_row(row: &Row<'_>, first: usize) -> rusqlite::Result<Place> {
    let country: String = row.get(first + 1)?;
    Ok(Place {
        name: row.get(first)?,
        country: (!country.is_empty()).then_some(country),
        latitude: row.get(first + 2)?,
        longitude: row.get(first + 3)?,
    })
}

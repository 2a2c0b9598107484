//! Icon row CRUD operations.
//!
//! One row per origin key, replaced wholesale on every successful upgrade.
//! `fetched_at` is informational only; nothing expires rows, they persist
//! until replaced or purged.

use super::connection::IconDb;
use crate::Error;
use serde::{Deserialize, Serialize};
use tokio_rusqlite::params;
use tokio_rusqlite::rusqlite;

/// A persisted icon resolution for one origin.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IconRecord {
    pub origin_key: String,
    pub bytes: Vec<u8>,
    pub content_type: Option<String>,
    pub is_default: bool,
    pub digest: String,
    pub provider: Option<String>,
    pub source_url: Option<String>,
    pub fetched_at: String,
}

impl IconDb {
    /// Insert or update the icon row for an origin.
    ///
    /// Uses UPSERT semantics keyed on `origin_key`: at most one row per
    /// origin can exist.
    pub async fn upsert_icon(&self, record: &IconRecord) -> Result<(), Error> {
        let record = record.clone();
        self.conn
            .call(move |conn| -> Result<(), Error> {
                conn.execute(
                    "INSERT INTO icons (
                        origin_key, bytes, content_type, is_default, digest,
                        provider, source_url, fetched_at
                    ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
                    ON CONFLICT(origin_key) DO UPDATE SET
                        bytes = excluded.bytes,
                        content_type = excluded.content_type,
                        is_default = excluded.is_default,
                        digest = excluded.digest,
                        provider = excluded.provider,
                        source_url = excluded.source_url,
                        fetched_at = excluded.fetched_at",
                    params![
                        &record.origin_key,
                        &record.bytes,
                        &record.content_type,
                        record.is_default as i32,
                        &record.digest,
                        &record.provider,
                        &record.source_url,
                        &record.fetched_at,
                    ],
                )?;
                Ok(())
            })
            .await
            .map_err(Error::from)
    }

    /// Get the icon row for an origin.
    ///
    /// Returns None if the origin has never been resolved.
    pub async fn get_icon(&self, origin_key: &str) -> Result<Option<IconRecord>, Error> {
        let origin_key = origin_key.to_string();
        self.conn
            .call(move |conn| -> Result<Option<IconRecord>, Error> {
                let mut stmt = conn.prepare(
                    "SELECT origin_key, bytes, content_type, is_default, digest,
                            provider, source_url, fetched_at
                     FROM icons WHERE origin_key = ?1",
                )?;

                let result = stmt.query_row(params![origin_key], |row| {
                    Ok(IconRecord {
                        origin_key: row.get(0)?,
                        bytes: row.get(1)?,
                        content_type: row.get(2)?,
                        is_default: row.get::<_, i32>(3)? == 1,
                        digest: row.get(4)?,
                        provider: row.get(5)?,
                        source_url: row.get(6)?,
                        fetched_at: row.get(7)?,
                    })
                });

                match result {
                    Ok(r) => Ok(Some(r)),
                    Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                    Err(e) => Err(e.into()),
                }
            })
            .await
            .map_err(Error::from)
    }

    /// Delete the icon row for an origin.
    ///
    /// Returns the number of deleted rows (0 or 1).
    pub async fn delete_icon(&self, origin_key: &str) -> Result<u64, Error> {
        let origin_key = origin_key.to_string();
        self.conn
            .call(move |conn| -> Result<u64, Error> {
                let count = conn.execute("DELETE FROM icons WHERE origin_key = ?1", params![origin_key])?;
                Ok(count as u64)
            })
            .await
            .map_err(Error::from)
    }

    /// Delete every icon row.
    ///
    /// Returns the number of deleted rows.
    pub async fn purge_all(&self) -> Result<u64, Error> {
        self.conn
            .call(|conn| -> Result<u64, Error> {
                let count = conn.execute("DELETE FROM icons", [])?;
                Ok(count as u64)
            })
            .await
            .map_err(Error::from)
    }

    /// Count persisted icon rows.
    pub async fn count_icons(&self) -> Result<u64, Error> {
        self.conn
            .call(|conn| -> Result<u64, Error> {
                let count: i64 = conn.query_row("SELECT COUNT(*) FROM icons", [], |row| row.get(0))?;
                Ok(count as u64)
            })
            .await
            .map_err(Error::from)
    }
}

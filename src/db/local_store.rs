//! Keyed whole-array record store.
//!
//! Every feature persists its complete record set as one JSON document
//! under a fixed key (`adverseEvents`, `doseSchedules`, ...). Writes replace
//! the whole document; there are no partial updates.
//!
//! Each document is tagged with a record version. A reader asking for a
//! different version gets `None` back, exactly as if the key were absent,
//! so the caller falls back to its generator and overwrites the stale blob.

use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};
use serde::de::DeserializeOwned;
use serde::Serialize;

use super::DatabaseError;

/// Metadata for one stored key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredEntry {
    pub key: String,
    pub record_version: u32,
    pub record_count: usize,
    pub updated_at: String,
}

/// Serialize `records` and replace whatever is stored under `key`.
pub fn save_records<T: Serialize>(
    conn: &Connection,
    key: &str,
    version: u32,
    records: &[T],
) -> Result<(), DatabaseError> {
    let value = serde_json::to_string(records)?;
    conn.execute(
        "INSERT INTO local_storage (key, value, record_version, record_count, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5)
         ON CONFLICT(key) DO UPDATE SET
            value = excluded.value,
            record_version = excluded.record_version,
            record_count = excluded.record_count,
            updated_at = excluded.updated_at",
        params![
            key,
            value,
            version,
            records.len() as i64,
            Utc::now().to_rfc3339(),
        ],
    )?;
    tracing::debug!(key, count = records.len(), "Persisted record set");
    Ok(())
}

/// Load the record set stored under `key`.
///
/// Returns `Ok(None)` when the key is absent or carries another version.
pub fn load_records<T: DeserializeOwned>(
    conn: &Connection,
    key: &str,
    version: u32,
) -> Result<Option<Vec<T>>, DatabaseError> {
    let row = conn
        .query_row(
            "SELECT value, record_version FROM local_storage WHERE key = ?1",
            params![key],
            |row| Ok((row.get::<_, String>(0)?, row.get::<_, u32>(1)?)),
        )
        .optional()?;

    let Some((value, stored_version)) = row else {
        return Ok(None);
    };

    if stored_version != version {
        tracing::warn!(
            key,
            stored_version,
            expected = version,
            "Discarding stored records with stale version"
        );
        return Ok(None);
    }

    let records: Vec<T> = serde_json::from_str(&value)?;
    Ok(Some(records))
}

/// Load `key`, or build the records with `init`, persist and return them.
pub fn load_or_init<T: Serialize + DeserializeOwned>(
    conn: &Connection,
    key: &str,
    version: u32,
    init: impl FnOnce() -> Vec<T>,
) -> Result<Vec<T>, DatabaseError> {
    if let Some(records) = load_records(conn, key, version)? {
        return Ok(records);
    }
    let records = init();
    tracing::info!(key, count = records.len(), "Initialized record set");
    save_records(conn, key, version, &records)?;
    Ok(records)
}

/// Remove a key. Returns whether anything was deleted.
pub fn remove_records(conn: &Connection, key: &str) -> Result<bool, DatabaseError> {
    let changed = conn.execute("DELETE FROM local_storage WHERE key = ?1", params![key])?;
    Ok(changed > 0)
}

/// List every stored key with its metadata, sorted by key.
pub fn list_entries(conn: &Connection) -> Result<Vec<StoredEntry>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT key, record_version, record_count, updated_at
         FROM local_storage ORDER BY key",
    )?;
    let rows = stmt.query_map([], |row| {
        Ok(StoredEntry {
            key: row.get(0)?,
            record_version: row.get(1)?,
            record_count: row.get::<_, i64>(2)? as usize,
            updated_at: row.get(3)?,
        })
    })?;

    let mut entries = Vec::new();
    for row in rows {
        entries.push(row?);
    }
    Ok(entries)
}

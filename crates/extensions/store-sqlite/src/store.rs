//! SQLite key-value store implementation.

use std::collections::HashMap;
use std::path::Path;

use async_trait::async_trait;
use rusqlite::params;
use serde_json::Value;
use tokio_rusqlite::Connection;
use tracing::debug;

use caselens_protocols::store::entry_size;
use caselens_protocols::{KeyValueStore, StoreError, StoreScope};

use crate::schema::init_schema;

#[cfg(test)]
#[path = "store_tests.rs"]
mod tests;

const DEFAULT_SYNC_QUOTA: u64 = 102_400;

/// SQLite-based key-value store.
///
/// Values are stored as JSON text. The `sync` scope carries the browser's
/// default quota, the `local` scope is unbounded unless configured.
pub struct SqliteStore {
    conn: Connection,
    sync_quota: Option<u64>,
    local_quota: Option<u64>,
}

impl SqliteStore {
    /// Create a new in-memory database.
    pub async fn in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory()
            .await
            .map_err(|e| StoreError::Unavailable(e.to_string()))?;
        Self::with_connection(conn).await
    }

    /// Create a new file-backed database.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref().to_path_buf();
        debug!("Opening SQLite store at {}", path.display());
        let conn = Connection::open(path)
            .await
            .map_err(|e| StoreError::Unavailable(e.to_string()))?;
        Self::with_connection(conn).await
    }

    async fn with_connection(conn: Connection) -> Result<Self, StoreError> {
        conn.call(|conn| Ok(init_schema(conn)?))
            .await
            .map_err(backend_error)?;

        Ok(Self {
            conn,
            sync_quota: Some(DEFAULT_SYNC_QUOTA),
            local_quota: None,
        })
    }

    /// Override the quota of one scope. `None` removes the limit.
    pub fn with_quota(mut self, scope: StoreScope, bytes: Option<u64>) -> Self {
        match scope {
            StoreScope::Sync => self.sync_quota = bytes,
            StoreScope::Local => self.local_quota = bytes,
        }
        self
    }
}

fn backend_error(e: tokio_rusqlite::Error) -> StoreError {
    StoreError::Backend(e.to_string())
}

#[async_trait]
impl KeyValueStore for SqliteStore {
    async fn get(&self, scope: StoreScope, key: &str) -> Result<Option<Value>, StoreError> {
        let key = key.to_string();
        let raw = self
            .conn
            .call(move |conn| {
                let mut stmt =
                    conn.prepare("SELECT value FROM kv_entries WHERE scope = ?1 AND key = ?2")?;
                match stmt.query_row(params![scope.as_str(), key], |row| row.get::<_, String>(0)) {
                    Ok(value) => Ok(Some(value)),
                    Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                    Err(e) => Err(e.into()),
                }
            })
            .await
            .map_err(backend_error)?;

        raw.map(|text| serde_json::from_str(&text).map_err(StoreError::from))
            .transpose()
    }

    async fn get_all(&self, scope: StoreScope) -> Result<HashMap<String, Value>, StoreError> {
        let rows = self
            .conn
            .call(move |conn| {
                let mut stmt = conn.prepare("SELECT key, value FROM kv_entries WHERE scope = ?1")?;
                let rows = stmt
                    .query_map([scope.as_str()], |row| {
                        Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
                    })?
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(rows)
            })
            .await
            .map_err(backend_error)?;

        let mut items = HashMap::with_capacity(rows.len());
        for (key, text) in rows {
            items.insert(key, serde_json::from_str(&text)?);
        }
        Ok(items)
    }

    async fn set(&self, scope: StoreScope, items: HashMap<String, Value>) -> Result<(), StoreError> {
        let quota = self.quota_bytes(scope);
        let rows: Vec<(String, String, u64)> = items
            .iter()
            .map(|(key, value)| (key.clone(), value.to_string(), entry_size(key, value)))
            .collect();

        // Ok(Some(requested)) means the write was rolled back for exceeding the quota.
        let rejected = self
            .conn
            .call(move |conn| {
                let tx = conn.transaction()?;

                let mut requested: u64 = tx.query_row(
                    "SELECT COALESCE(SUM(size), 0) FROM kv_entries WHERE scope = ?1",
                    [scope.as_str()],
                    |row| row.get::<_, i64>(0),
                )? as u64;
                for (key, _, size) in &rows {
                    let replaced: Option<i64> = tx
                        .query_row(
                            "SELECT size FROM kv_entries WHERE scope = ?1 AND key = ?2",
                            params![scope.as_str(), key],
                            |row| row.get(0),
                        )
                        .map(Some)
                        .or_else(|e| match e {
                            rusqlite::Error::QueryReturnedNoRows => Ok(None),
                            e => Err(e),
                        })?;
                    requested = requested.saturating_sub(replaced.unwrap_or(0) as u64) + size;
                }

                if let Some(quota) = quota {
                    if requested > quota {
                        return Ok(Some(requested));
                    }
                }

                for (key, value, size) in &rows {
                    tx.execute(
                        "INSERT INTO kv_entries (scope, key, value, size, updated_at)
                         VALUES (?1, ?2, ?3, ?4, datetime('now'))
                         ON CONFLICT(scope, key) DO UPDATE SET
                            value = excluded.value,
                            size = excluded.size,
                            updated_at = excluded.updated_at",
                        params![scope.as_str(), key, value, *size as i64],
                    )?;
                }

                tx.commit()?;
                Ok(None)
            })
            .await
            .map_err(backend_error)?;

        match (rejected, quota) {
            (Some(requested), Some(quota)) => Err(StoreError::QuotaExceeded {
                scope,
                requested,
                quota,
            }),
            _ => Ok(()),
        }
    }

    async fn remove(&self, scope: StoreScope, keys: &[String]) -> Result<(), StoreError> {
        let keys = keys.to_vec();
        self.conn
            .call(move |conn| {
                let tx = conn.transaction()?;
                for key in &keys {
                    tx.execute(
                        "DELETE FROM kv_entries WHERE scope = ?1 AND key = ?2",
                        params![scope.as_str(), key],
                    )?;
                }
                tx.commit()?;
                Ok(())
            })
            .await
            .map_err(backend_error)
    }

    async fn clear(&self, scope: StoreScope) -> Result<(), StoreError> {
        self.conn
            .call(move |conn| {
                conn.execute("DELETE FROM kv_entries WHERE scope = ?1", [scope.as_str()])?;
                Ok(())
            })
            .await
            .map_err(backend_error)
    }

    async fn bytes_in_use(&self, scope: StoreScope) -> Result<u64, StoreError> {
        self.conn
            .call(move |conn| {
                let total: i64 = conn.query_row(
                    "SELECT COALESCE(SUM(size), 0) FROM kv_entries WHERE scope = ?1",
                    [scope.as_str()],
                    |row| row.get(0),
                )?;
                Ok(total as u64)
            })
            .await
            .map_err(backend_error)
    }

    fn quota_bytes(&self, scope: StoreScope) -> Option<u64> {
        match scope {
            StoreScope::Sync => self.sync_quota,
            StoreScope::Local => self.local_quota,
        }
    }
}

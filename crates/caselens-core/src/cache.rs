//! Case extraction cache.
//!
//! Entries are keyed by record id and carry the freshness token that was on
//! the page when they were stored. A synchronous in-memory mirror answers
//! lookups; every write is persisted to the `local` store scope best-effort.
//! Persisted entries older than `max_age` are purged at [`CacheManager::init`],
//! and when usage passes the ceiling the oldest half is evicted.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

use caselens_config::CacheConfig;
use caselens_protocols::store::entry_size;
use caselens_protocols::{ExtractedCaseData, KeyValueStore, StoreError, StoreScope};

use crate::clock::Clock;
use crate::freshness::{FreshnessSource, is_fresh};

/// A persisted extraction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheEntry {
    pub record_id: String,
    pub freshness_token: Option<String>,
    pub payload: ExtractedCaseData,
    pub stored_at_ms: i64,
}

/// Counter snapshot for diagnostics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub entries: usize,
    pub hits: u64,
    pub misses: u64,
    /// Misses caused by a newer token on the page.
    pub stale: u64,
    pub evicted: u64,
}

#[derive(Default)]
struct Counters {
    hits: AtomicU64,
    misses: AtomicU64,
    stale: AtomicU64,
    evicted: AtomicU64,
}

/// Record-id keyed cache of [`ExtractedCaseData`].
pub struct CacheManager {
    store: Arc<dyn KeyValueStore>,
    freshness: Arc<dyn FreshnessSource>,
    clock: Arc<dyn Clock>,
    config: CacheConfig,
    mirror: RwLock<HashMap<String, CacheEntry>>,
    initialized: Mutex<bool>,
    counters: Counters,
}

impl CacheManager {
    pub fn new(
        store: Arc<dyn KeyValueStore>,
        freshness: Arc<dyn FreshnessSource>,
        clock: Arc<dyn Clock>,
        config: CacheConfig,
    ) -> Self {
        Self {
            store,
            freshness,
            clock,
            config,
            mirror: RwLock::new(HashMap::new()),
            initialized: Mutex::new(false),
            counters: Counters::default(),
        }
    }

    fn storage_key(&self, record_id: &str) -> String {
        format!("{}{}", self.config.key_prefix, record_id)
    }

    /// Load persisted entries, purge expired ones and trim to capacity.
    /// Only the first call does any work; if loading fails the cache stays
    /// memory-only for the rest of the session.
    pub async fn init(&self) {
        let mut initialized = self.initialized.lock().await;
        if *initialized {
            return;
        }

        let stored = match self.store.get_all(StoreScope::Local).await {
            Ok(items) => items,
            Err(e) => {
                error!("Cache load failed, continuing in memory only: {}", e);
                *initialized = true;
                return;
            }
        };

        let now = self.clock.now_ms();
        let max_age_ms = self.config.max_age().as_millis() as i64;
        let mut expired = Vec::new();
        let mut loaded = HashMap::new();

        for (key, value) in stored {
            let Some(record_id) = key.strip_prefix(&self.config.key_prefix) else {
                continue;
            };
            match serde_json::from_value::<CacheEntry>(value) {
                Ok(entry) if now - entry.stored_at_ms > max_age_ms => expired.push(key),
                Ok(entry) => {
                    loaded.insert(record_id.to_string(), entry);
                }
                Err(e) => {
                    warn!("Dropping unreadable cache entry {}: {}", key, e);
                    expired.push(key);
                }
            }
        }

        if !expired.is_empty() {
            info!("Purging {} expired cache entries", expired.len());
            self.counters
                .evicted
                .fetch_add(expired.len() as u64, Ordering::Relaxed);
            if let Err(e) = self.store.remove(StoreScope::Local, &expired).await {
                error!("Failed to purge expired cache entries: {}", e);
            }
        }

        debug!("Loaded {} cache entries", loaded.len());
        *self.mirror.write() = loaded;
        *initialized = true;
        drop(initialized);

        self.enforce_capacity().await;
    }

    /// Cached data for `record_id` if still fresh against `current_token`.
    pub async fn get(
        &self,
        record_id: &str,
        current_token: Option<&str>,
    ) -> Option<ExtractedCaseData> {
        self.init().await;

        let entry = self.mirror.read().get(record_id).cloned();
        let Some(entry) = entry else {
            self.counters.misses.fetch_add(1, Ordering::Relaxed);
            debug!("Cache miss for {}", record_id);
            return None;
        };

        if !is_fresh(entry.freshness_token.as_deref(), current_token) {
            self.counters.misses.fetch_add(1, Ordering::Relaxed);
            self.counters.stale.fetch_add(1, Ordering::Relaxed);
            debug!(
                "Cache entry for {} is stale ({:?} < {:?})",
                record_id, entry.freshness_token, current_token
            );
            return None;
        }

        if current_token.is_none() {
            warn!(
                "No freshness token on page for {}, using cached data as-is",
                record_id
            );
        }
        self.counters.hits.fetch_add(1, Ordering::Relaxed);
        debug!("Cache hit for {}", record_id);
        Some(entry.payload)
    }

    /// Store `payload` under `record_id`, stamped with the token currently on
    /// the page. The mirror is updated before persisting.
    pub async fn set(&self, record_id: &str, payload: ExtractedCaseData) {
        self.init().await;

        let entry = CacheEntry {
            record_id: record_id.to_string(),
            freshness_token: self.freshness.current_token(),
            payload,
            stored_at_ms: self.clock.now_ms(),
        };
        self.mirror
            .write()
            .insert(record_id.to_string(), entry.clone());

        match self.persist(&entry).await {
            Ok(()) => {}
            Err(StoreError::QuotaExceeded { .. }) => {
                warn!("Cache quota reached while storing {}, trimming", record_id);
                self.trim().await;
                if let Err(e) = self.persist(&entry).await {
                    error!("Failed to persist cache entry {}: {}", record_id, e);
                }
            }
            Err(e) => error!("Failed to persist cache entry {}: {}", record_id, e),
        }

        self.enforce_capacity().await;
    }

    async fn persist(&self, entry: &CacheEntry) -> Result<(), StoreError> {
        let value = serde_json::to_value(entry)?;
        let items = HashMap::from([(self.storage_key(&entry.record_id), value)]);
        self.store.set(StoreScope::Local, items).await
    }

    /// Remove one record.
    pub async fn clear(&self, record_id: &str) {
        self.mirror.write().remove(record_id);
        if let Err(e) = self
            .store
            .remove(StoreScope::Local, &[self.storage_key(record_id)])
            .await
        {
            error!("Failed to remove cache entry {}: {}", record_id, e);
        }
    }

    /// Remove every cached record, leaving other keys in the scope alone.
    pub async fn clear_all(&self) {
        let mut keys: Vec<String> = self
            .mirror
            .write()
            .drain()
            .map(|(id, _)| self.storage_key(&id))
            .collect();

        match self.store.get_all(StoreScope::Local).await {
            Ok(items) => keys.extend(
                items
                    .into_keys()
                    .filter(|k| k.starts_with(&self.config.key_prefix)),
            ),
            Err(e) => warn!("Could not list persisted cache entries: {}", e),
        }
        keys.sort();
        keys.dedup();

        if let Err(e) = self.store.remove(StoreScope::Local, &keys).await {
            error!("Failed to clear cache: {}", e);
        }
        info!("Cleared {} cache entries", keys.len());
    }

    /// Bytes used by the `local` scope, estimated from the mirror when the
    /// store cannot answer.
    async fn usage(&self) -> u64 {
        match self.store.bytes_in_use(StoreScope::Local).await {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!("Could not read storage usage: {}", e);
                self.mirror
                    .read()
                    .values()
                    .filter_map(|entry| {
                        let value: Value = serde_json::to_value(entry).ok()?;
                        Some(entry_size(&self.storage_key(&entry.record_id), &value))
                    })
                    .sum()
            }
        }
    }

    async fn enforce_capacity(&self) {
        let usage = self.usage().await;
        let ceiling = self.config.ceiling_bytes();
        if usage > ceiling {
            info!(
                "Cache usage {} bytes exceeds ceiling {} bytes, trimming",
                usage, ceiling
            );
            self.trim().await;
        }
    }

    /// Drop the oldest `floor(n/2)` entries.
    async fn trim(&self) {
        let victims: Vec<String> = {
            let mut mirror = self.mirror.write();
            let mut by_age: Vec<(i64, String)> = mirror
                .values()
                .map(|e| (e.stored_at_ms, e.record_id.clone()))
                .collect();
            by_age.sort();
            let drop_count = by_age.len() / 2;
            by_age
                .into_iter()
                .take(drop_count)
                .map(|(_, id)| {
                    mirror.remove(&id);
                    id
                })
                .collect()
        };
        if victims.is_empty() {
            return;
        }

        self.counters
            .evicted
            .fetch_add(victims.len() as u64, Ordering::Relaxed);
        let keys: Vec<String> = victims.iter().map(|id| self.storage_key(id)).collect();
        if let Err(e) = self.store.remove(StoreScope::Local, &keys).await {
            error!("Failed to evict cache entries: {}", e);
        }
        info!("Evicted {} oldest cache entries", victims.len());
    }

    /// Whether the mirror holds an entry, regardless of freshness.
    pub fn contains(&self, record_id: &str) -> bool {
        self.mirror.read().contains_key(record_id)
    }

    pub fn len(&self) -> usize {
        self.mirror.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.mirror.read().is_empty()
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            entries: self.len(),
            hits: self.counters.hits.load(Ordering::Relaxed),
            misses: self.counters.misses.load(Ordering::Relaxed),
            stale: self.counters.stale.load(Ordering::Relaxed),
            evicted: self.counters.evicted.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
#[path = "cache_tests.rs"]
mod tests;

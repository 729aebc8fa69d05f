//! In-memory [`KeyValueStore`].

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use parking_lot::RwLock;
use serde_json::Value;

use caselens_protocols::store::entry_size;
use caselens_protocols::{KeyValueStore, StoreError, StoreScope};

/// Browser default quota of the `sync` scope.
pub const SYNC_QUOTA_BYTES: u64 = 102_400;

/// Browser default quota of the `local` scope.
pub const LOCAL_QUOTA_BYTES: u64 = 5 * 1024 * 1024;

/// Process-local store with per-scope quotas. Can be switched into a failing
/// mode to exercise degraded paths.
pub struct MemoryStore {
    scopes: RwLock<HashMap<StoreScope, HashMap<String, Value>>>,
    quotas: HashMap<StoreScope, u64>,
    failing: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::with_quotas(SYNC_QUOTA_BYTES, LOCAL_QUOTA_BYTES)
    }

    pub fn with_quotas(sync_bytes: u64, local_bytes: u64) -> Self {
        Self {
            scopes: RwLock::new(HashMap::new()),
            quotas: HashMap::from([(StoreScope::Sync, sync_bytes), (StoreScope::Local, local_bytes)]),
            failing: AtomicBool::new(false),
        }
    }

    /// Make every subsequent call fail with [`StoreError::Unavailable`].
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    fn check(&self) -> Result<(), StoreError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("memory store offline".to_string()));
        }
        Ok(())
    }

    fn usage(items: &HashMap<String, Value>) -> u64 {
        items.iter().map(|(k, v)| entry_size(k, v)).sum()
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl KeyValueStore for MemoryStore {
    async fn get(&self, scope: StoreScope, key: &str) -> Result<Option<Value>, StoreError> {
        self.check()?;
        Ok(self
            .scopes
            .read()
            .get(&scope)
            .and_then(|items| items.get(key).cloned()))
    }

    async fn get_all(&self, scope: StoreScope) -> Result<HashMap<String, Value>, StoreError> {
        self.check()?;
        Ok(self.scopes.read().get(&scope).cloned().unwrap_or_default())
    }

    async fn set(&self, scope: StoreScope, items: HashMap<String, Value>) -> Result<(), StoreError> {
        self.check()?;
        let mut scopes = self.scopes.write();
        let current = scopes.entry(scope).or_default();

        let mut next = current.clone();
        next.extend(items);
        let requested = Self::usage(&next);
        if let Some(quota) = self.quota_bytes(scope) {
            if requested > quota {
                return Err(StoreError::QuotaExceeded {
                    scope,
                    requested,
                    quota,
                });
            }
        }
        *current = next;
        Ok(())
    }

    async fn remove(&self, scope: StoreScope, keys: &[String]) -> Result<(), StoreError> {
        self.check()?;
        if let Some(items) = self.scopes.write().get_mut(&scope) {
            for key in keys {
                items.remove(key);
            }
        }
        Ok(())
    }

    async fn clear(&self, scope: StoreScope) -> Result<(), StoreError> {
        self.check()?;
        self.scopes.write().remove(&scope);
        Ok(())
    }

    async fn bytes_in_use(&self, scope: StoreScope) -> Result<u64, StoreError> {
        self.check()?;
        Ok(self
            .scopes
            .read()
            .get(&scope)
            .map(Self::usage)
            .unwrap_or(0))
    }

    fn quota_bytes(&self, scope: StoreScope) -> Option<u64> {
        self.quotas.get(&scope).copied()
    }
}

//! Key-value store protocol.
//!
//! Mirrors the browser `storage` API: a small `sync` scope replicated across the
//! user's browsers and a larger device-local scope with a capacity ceiling.

use std::collections::HashMap;
use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::StoreError;

/// Storage area.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreScope {
    Sync,
    Local,
}

impl StoreScope {
    pub fn as_str(&self) -> &'static str {
        match self {
            StoreScope::Sync => "sync",
            StoreScope::Local => "local",
        }
    }
}

impl fmt::Display for StoreScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Async namespaced key-value store.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Read a single key.
    async fn get(&self, scope: StoreScope, key: &str) -> Result<Option<Value>, StoreError>;

    /// Read every key in a scope.
    async fn get_all(&self, scope: StoreScope) -> Result<HashMap<String, Value>, StoreError>;

    /// Write several keys at once.
    async fn set(&self, scope: StoreScope, items: HashMap<String, Value>) -> Result<(), StoreError>;

    /// Remove keys. Missing keys are ignored.
    async fn remove(&self, scope: StoreScope, keys: &[String]) -> Result<(), StoreError>;

    /// Remove every key in a scope.
    async fn clear(&self, scope: StoreScope) -> Result<(), StoreError>;

    /// Serialized size of everything stored in a scope.
    async fn bytes_in_use(&self, scope: StoreScope) -> Result<u64, StoreError>;

    /// Capacity of a scope, `None` when unbounded.
    fn quota_bytes(&self, scope: StoreScope) -> Option<u64>;
}

/// Size a key/value pair occupies, measured the way browsers do (key length plus
/// JSON length of the value).
pub fn entry_size(key: &str, value: &Value) -> u64 {
    (key.len() + value.to_string().len()) as u64
}

//! Case cache configuration.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::loader::ConfigLoader;

/// Case cache configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Entries older than this are purged when the cache initializes.
    #[serde(default = "default_max_age_days")]
    pub max_age_days: u64,

    /// Capacity of the local storage scope.
    #[serde(default = "default_capacity_bytes")]
    pub capacity_bytes: u64,

    /// Fraction of `capacity_bytes` above which the oldest half is dropped.
    #[serde(default = "default_trim_threshold")]
    pub trim_threshold: f64,

    /// Storage key prefix for cache entries.
    #[serde(default = "default_key_prefix")]
    pub key_prefix: String,

    /// SQLite file backing the store on headless hosts. Unset keeps
    /// everything in memory.
    #[serde(default)]
    pub store_path: Option<String>,
}

impl CacheConfig {
    pub fn max_age(&self) -> Duration {
        Duration::from_secs(self.max_age_days * 24 * 60 * 60)
    }

    /// Usage in bytes above which capacity eviction runs.
    pub fn ceiling_bytes(&self) -> u64 {
        (self.capacity_bytes as f64 * self.trim_threshold) as u64
    }

    /// `store_path` with `~` expanded.
    pub fn resolved_store_path(&self) -> Option<PathBuf> {
        self.store_path
            .as_deref()
            .map(|p| PathBuf::from(ConfigLoader::expand_path(p)))
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_age_days: default_max_age_days(),
            capacity_bytes: default_capacity_bytes(),
            trim_threshold: default_trim_threshold(),
            key_prefix: default_key_prefix(),
            store_path: None,
        }
    }
}

fn default_max_age_days() -> u64 {
    30
}

fn default_capacity_bytes() -> u64 {
    5 * 1024 * 1024
}

fn default_trim_threshold() -> f64 {
    0.9
}

fn default_key_prefix() -> String {
    "caseCache_".to_string()
}

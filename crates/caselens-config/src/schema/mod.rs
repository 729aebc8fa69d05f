//! Configuration schema definitions.

use serde::{Deserialize, Serialize};

mod schema_cache;
mod schema_runtime;

pub use schema_cache::*;
pub use schema_runtime::*;

/// Shared default helper used by submodules.
pub(crate) fn default_true() -> bool {
    true
}

/// Root configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub cache: CacheConfig,

    #[serde(default)]
    pub controller: ControllerConfig,

    #[serde(default)]
    pub watcher: WatcherConfig,

    #[serde(default)]
    pub presence: PresenceConfig,

    #[serde(default)]
    pub messaging: MessagingConfig,

    #[serde(default)]
    pub features: FeaturesConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Feature module selection. Modules not listed in either list follow the
/// user's persisted settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FeaturesConfig {
    #[serde(default)]
    pub enabled: Vec<String>,

    #[serde(default)]
    pub disabled: Vec<String>,
}

impl FeaturesConfig {
    /// `Some(true)` / `Some(false)` when the config pins the module, `None` otherwise.
    pub fn pinned(&self, name: &str) -> Option<bool> {
        if self.disabled.iter().any(|n| n == name) {
            Some(false)
        } else if self.enabled.iter().any(|n| n == name) {
            Some(true)
        } else {
            None
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Default filter directive when `CASELENS_LOG` is unset.
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Emit JSON lines instead of human-readable text.
    #[serde(default)]
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

#[cfg(test)]
#[path = "schema_tests.rs"]
mod tests;

//! User settings persisted in the `sync` scope.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{error, warn};

use caselens_protocols::{KeyValueStore, StoreError, StoreScope};

/// Sync-scope key holding [`Settings`].
pub const SETTINGS_KEY: &str = "caselensSettings";

/// User-facing toggles. Unknown or missing values fall back to defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Settings {
    /// Per-feature switches; features not listed are enabled.
    #[serde(default)]
    pub features: BTreeMap<String, bool>,

    /// Case list rows not modified for this many days are marked as aging.
    #[serde(default = "default_aging_days")]
    pub aging_days: u32,

    /// Statuses highlighted on case lists and case pages.
    #[serde(default = "default_highlight_statuses")]
    pub highlight_statuses: Vec<String>,

    /// Priorities highlighted on case lists and case pages.
    #[serde(default = "default_highlight_priorities")]
    pub highlight_priorities: Vec<String>,
}

fn default_aging_days() -> u32 {
    3
}

fn default_highlight_statuses() -> Vec<String> {
    vec!["Escalated".to_string(), "New".to_string()]
}

fn default_highlight_priorities() -> Vec<String> {
    vec!["P1".to_string(), "High".to_string(), "Critical".to_string()]
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            features: BTreeMap::new(),
            aging_days: default_aging_days(),
            highlight_statuses: default_highlight_statuses(),
            highlight_priorities: default_highlight_priorities(),
        }
    }
}

impl Settings {
    pub fn is_feature_enabled(&self, name: &str) -> bool {
        self.features.get(name).copied().unwrap_or(true)
    }
}

/// Loads and saves [`Settings`].
pub struct SettingsManager {
    store: Arc<dyn KeyValueStore>,
}

impl SettingsManager {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    /// Current settings; defaults when absent, unreadable or on storage failure.
    pub async fn load(&self) -> Settings {
        match self.store.get(StoreScope::Sync, SETTINGS_KEY).await {
            Ok(Some(value)) => serde_json::from_value(value).unwrap_or_else(|e| {
                warn!("Stored settings are unreadable, using defaults: {}", e);
                Settings::default()
            }),
            Ok(None) => Settings::default(),
            Err(e) => {
                error!("Failed to load settings, using defaults: {}", e);
                Settings::default()
            }
        }
    }

    pub async fn save(&self, settings: &Settings) -> Result<(), StoreError> {
        let value = serde_json::to_value(settings)?;
        self.store
            .set(
                StoreScope::Sync,
                HashMap::from([(SETTINGS_KEY.to_string(), value)]),
            )
            .await
    }

    pub async fn set_feature_enabled(&self, name: &str, enabled: bool) -> Result<(), StoreError> {
        let mut settings = self.load().await;
        settings.features.insert(name.to_string(), enabled);
        self.save(&settings).await
    }
}

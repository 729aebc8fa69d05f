//! Controller, watcher, presence and messaging configuration.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::default_true;

/// Page-change orchestration configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ControllerConfig {
    /// Interval between page-ready checks.
    #[serde(default = "default_ready_poll_interval_ms")]
    pub ready_poll_interval_ms: u64,

    /// Checks before activation proceeds in degraded mode.
    #[serde(default = "default_ready_max_attempts")]
    pub ready_max_attempts: u32,

    /// Selectors signalling a rendered case record (any one suffices).
    #[serde(default = "default_case_ready_markers")]
    pub case_ready_markers: Vec<String>,

    /// Selectors signalling a rendered list view (any one suffices).
    #[serde(default = "default_list_ready_markers")]
    pub list_ready_markers: Vec<String>,
}

impl ControllerConfig {
    pub fn ready_poll_interval(&self) -> Duration {
        Duration::from_millis(self.ready_poll_interval_ms)
    }
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            ready_poll_interval_ms: default_ready_poll_interval_ms(),
            ready_max_attempts: default_ready_max_attempts(),
            case_ready_markers: default_case_ready_markers(),
            list_ready_markers: default_list_ready_markers(),
        }
    }
}

fn default_ready_poll_interval_ms() -> u64 {
    500
}

fn default_ready_max_attempts() -> u32 {
    40
}

fn default_case_ready_markers() -> Vec<String> {
    vec![
        "records-record-layout-item".to_string(),
        "records-highlights-details-item".to_string(),
    ]
}

fn default_list_ready_markers() -> Vec<String> {
    vec![
        "table[role=\"grid\"]".to_string(),
        "lst-list-view-manager-header".to_string(),
    ]
}

/// DOM mutation watcher configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WatcherConfig {
    /// Quiet period before a burst of mutations triggers a re-run.
    #[serde(default = "default_debounce_ms")]
    pub default_debounce_ms: u64,
}

impl WatcherConfig {
    pub fn default_debounce(&self) -> Duration {
        Duration::from_millis(self.default_debounce_ms)
    }
}

impl Default for WatcherConfig {
    fn default() -> Self {
        Self {
            default_debounce_ms: default_debounce_ms(),
        }
    }
}

fn default_debounce_ms() -> u64 {
    250
}

/// Multi-tab presence configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PresenceConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    #[serde(default = "default_heartbeat_interval_ms")]
    pub heartbeat_interval_ms: u64,

    /// A peer is considered gone when its last heartbeat is older than this.
    #[serde(default = "default_stale_after_ms")]
    pub stale_after_ms: u64,

    #[serde(default = "default_channel_name")]
    pub channel_name: String,
}

impl PresenceConfig {
    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_millis(self.heartbeat_interval_ms)
    }
}

impl Default for PresenceConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            heartbeat_interval_ms: default_heartbeat_interval_ms(),
            stale_after_ms: default_stale_after_ms(),
            channel_name: default_channel_name(),
        }
    }
}

fn default_heartbeat_interval_ms() -> u64 {
    3_000
}

fn default_stale_after_ms() -> u64 {
    10_000
}

fn default_channel_name() -> String {
    "caselens-presence".to_string()
}

/// Background messaging retry configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessagingConfig {
    /// Retries after the first failed attempt.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    #[serde(default = "default_initial_backoff_ms")]
    pub initial_backoff_ms: u64,

    #[serde(default = "default_backoff_multiplier")]
    pub backoff_multiplier: f64,
}

impl MessagingConfig {
    /// Delay before retry number `attempt` (0-based).
    pub fn backoff(&self, attempt: u32) -> Duration {
        let factor = self.backoff_multiplier.max(1.0).powi(attempt as i32);
        Duration::from_millis((self.initial_backoff_ms as f64 * factor) as u64)
    }
}

impl Default for MessagingConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            initial_backoff_ms: default_initial_backoff_ms(),
            backoff_multiplier: default_backoff_multiplier(),
        }
    }
}

fn default_max_retries() -> u32 {
    3
}

fn default_initial_backoff_ms() -> u64 {
    100
}

fn default_backoff_multiplier() -> f64 {
    2.0
}

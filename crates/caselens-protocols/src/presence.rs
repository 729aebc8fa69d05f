//! Cross-tab presence protocol.

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

/// Heartbeat broadcast by each tab while it shows a record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Heartbeat {
    pub tab_id: String,
    /// Record shown by the tab, `None` when the tab left record pages.
    pub record_id: Option<String>,
    pub sent_at_ms: i64,
}

/// Same-origin broadcast channel (e.g. `BroadcastChannel`). Subscribers may see
/// their own heartbeats and filter them by `tab_id`.
pub trait PresenceChannel: Send + Sync {
    fn post(&self, heartbeat: Heartbeat);

    fn subscribe(&self) -> broadcast::Receiver<Heartbeat>;
}

//! Heartbeat bookkeeping for one tab.

use std::sync::Arc;

use dashmap::DashMap;
use tracing::debug;

use caselens_config::PresenceConfig;
use caselens_core::Clock;
use caselens_protocols::{Heartbeat, PresenceChannel};

/// This tab's identity plus the last heartbeat seen from every other tab.
pub struct TabPresence {
    tab_id: String,
    channel: Arc<dyn PresenceChannel>,
    clock: Arc<dyn Clock>,
    stale_after_ms: i64,
    peers: DashMap<String, Heartbeat>,
}

impl TabPresence {
    pub fn new(
        channel: Arc<dyn PresenceChannel>,
        clock: Arc<dyn Clock>,
        config: &PresenceConfig,
    ) -> Self {
        Self {
            tab_id: uuid::Uuid::new_v4().to_string(),
            channel,
            clock,
            stale_after_ms: i64::try_from(config.stale_after_ms).unwrap_or(i64::MAX),
            peers: DashMap::new(),
        }
    }

    pub fn tab_id(&self) -> &str {
        &self.tab_id
    }

    pub fn channel(&self) -> &Arc<dyn PresenceChannel> {
        &self.channel
    }

    /// Broadcast which record this tab shows, `None` when it left record pages.
    pub fn announce(&self, record_id: Option<&str>) {
        self.channel.post(Heartbeat {
            tab_id: self.tab_id.clone(),
            record_id: record_id.map(str::to_string),
            sent_at_ms: self.clock.now_ms(),
        });
    }

    /// Remember a received heartbeat. Our own echoes are ignored; returns
    /// whether the heartbeat came from another tab.
    pub fn record(&self, heartbeat: Heartbeat) -> bool {
        if heartbeat.tab_id == self.tab_id {
            return false;
        }
        self.peers.insert(heartbeat.tab_id.clone(), heartbeat);
        true
    }

    /// Whether a heartbeat from `tab_id` has been seen before.
    pub fn knows(&self, tab_id: &str) -> bool {
        self.peers.contains_key(tab_id)
    }

    fn is_live(&self, heartbeat: &Heartbeat, now_ms: i64) -> bool {
        now_ms.saturating_sub(heartbeat.sent_at_ms) <= self.stale_after_ms
    }

    /// Other tabs that reported `record_id` within the staleness window, sorted.
    pub fn duplicates(&self, record_id: &str) -> Vec<String> {
        let now = self.clock.now_ms();
        let mut tabs: Vec<String> = self
            .peers
            .iter()
            .filter(|p| p.record_id.as_deref() == Some(record_id) && self.is_live(p.value(), now))
            .map(|p| p.key().clone())
            .collect();
        tabs.sort();
        tabs
    }

    /// Forget tabs whose last heartbeat is stale. Returns how many were dropped.
    pub fn prune(&self) -> usize {
        let now = self.clock.now_ms();
        let before = self.peers.len();
        self.peers.retain(|_, hb| now.saturating_sub(hb.sent_at_ms) <= self.stale_after_ms);
        let dropped = before - self.peers.len();
        if dropped > 0 {
            debug!("Pruned {} stale tabs", dropped);
        }
        dropped
    }

    pub fn peer_count(&self) -> usize {
        self.peers.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::BroadcastPresenceChannel;
    use caselens_core::ManualClock;

    const RECORD: &str = "500Ak00000AbCdEIAV";

    fn presence(clock: Arc<ManualClock>) -> TabPresence {
        TabPresence::new(
            Arc::new(BroadcastPresenceChannel::new("test")),
            clock,
            &PresenceConfig::default(),
        )
    }

    fn heartbeat(tab: &str, record: Option<&str>, at: i64) -> Heartbeat {
        Heartbeat {
            tab_id: tab.to_string(),
            record_id: record.map(str::to_string),
            sent_at_ms: at,
        }
    }

    #[test]
    fn test_own_heartbeat_ignored() {
        let clock = Arc::new(ManualClock::new(0));
        let tab = presence(clock);
        let own = heartbeat(tab.tab_id(), Some(RECORD), 0);
        assert!(!tab.record(own));
        assert_eq!(tab.peer_count(), 0);
    }

    #[test]
    fn test_duplicates_within_window() {
        let clock = Arc::new(ManualClock::new(20_000));
        let tab = presence(clock.clone());
        tab.record(heartbeat("b", Some(RECORD), 15_000));
        tab.record(heartbeat("a", Some(RECORD), 10_000));
        tab.record(heartbeat("c", Some("500Ak00000ZzZzZIAV"), 20_000));
        tab.record(heartbeat("d", Some(RECORD), 9_999));

        assert_eq!(tab.duplicates(RECORD), vec!["a", "b"]);

        clock.advance(5_001);
        assert_eq!(tab.duplicates(RECORD), Vec::<String>::new());
    }

    #[test]
    fn test_latest_heartbeat_wins() {
        let clock = Arc::new(ManualClock::new(1_000));
        let tab = presence(clock);
        tab.record(heartbeat("b", Some(RECORD), 500));
        tab.record(heartbeat("b", None, 900));
        assert!(tab.duplicates(RECORD).is_empty());
        assert_eq!(tab.peer_count(), 1);
    }

    #[test]
    fn test_prune() {
        let clock = Arc::new(ManualClock::new(30_000));
        let tab = presence(clock);
        tab.record(heartbeat("old", Some(RECORD), 1_000));
        tab.record(heartbeat("new", Some(RECORD), 29_000));
        assert_eq!(tab.prune(), 1);
        assert_eq!(tab.peer_count(), 1);
    }

    #[tokio::test]
    async fn test_announce_posts_heartbeat() {
        let clock = Arc::new(ManualClock::new(42));
        let tab = presence(clock);
        let mut rx = tab.channel().subscribe();
        tab.announce(Some(RECORD));
        let received = rx.recv().await.unwrap();
        assert_eq!(received.tab_id, tab.tab_id());
        assert_eq!(received.record_id.as_deref(), Some(RECORD));
        assert_eq!(received.sent_at_ms, 42);
    }
}

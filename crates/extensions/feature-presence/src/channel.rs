//! In-process presence channel.

use tokio::sync::broadcast;
use tracing::trace;

use caselens_protocols::{Heartbeat, PresenceChannel};

const CHANNEL_CAPACITY: usize = 64;

/// [`PresenceChannel`] over a tokio broadcast channel. Tabs sharing one
/// instance (behind an `Arc`) see each other's heartbeats.
pub struct BroadcastPresenceChannel {
    name: String,
    sender: broadcast::Sender<Heartbeat>,
}

impl BroadcastPresenceChannel {
    pub fn new(name: impl Into<String>) -> Self {
        let (sender, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self {
            name: name.into(),
            sender,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl PresenceChannel for BroadcastPresenceChannel {
    fn post(&self, heartbeat: Heartbeat) {
        // No subscribers is not an error; nobody else is listening yet.
        if self.sender.send(heartbeat).is_err() {
            trace!("No listeners on {}", self.name);
        }
    }

    fn subscribe(&self) -> broadcast::Receiver<Heartbeat> {
        self.sender.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_post_reaches_all_subscribers() {
        let channel = BroadcastPresenceChannel::new("caselens-presence");
        let mut a = channel.subscribe();
        let mut b = channel.subscribe();
        let heartbeat = Heartbeat {
            tab_id: "tab-1".to_string(),
            record_id: Some("500Ak00000AbCdEIAV".to_string()),
            sent_at_ms: 1,
        };
        channel.post(heartbeat.clone());
        assert_eq!(a.recv().await.unwrap(), heartbeat);
        assert_eq!(b.recv().await.unwrap(), heartbeat);
    }

    #[test]
    fn test_post_without_subscribers() {
        let channel = BroadcastPresenceChannel::new("caselens-presence");
        channel.post(Heartbeat {
            tab_id: "tab-1".to_string(),
            record_id: None,
            sent_at_ms: 1,
        });
        assert_eq!(channel.name(), "caselens-presence");
    }
}

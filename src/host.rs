//! Host surfaces the content script runs against.

use std::sync::Arc;

use caselens_config::Config;
use caselens_core::{BackgroundRouter, LoopbackTransport, MemoryClipboard, TracingNotifier};
use caselens_feature_presence::BroadcastPresenceChannel;
use caselens_protocols::{
    Clipboard, Document, KeyValueStore, MessageTransport, Notifier, PresenceChannel, StoreError,
};
use caselens_store_sqlite::SqliteStore;
use tracing::info;

/// Browser APIs of one tab. A browser build implements these over the real
/// page; [`HostSurfaces::headless`] fills them with in-process stand-ins.
#[derive(Clone)]
pub struct HostSurfaces {
    pub document: Arc<dyn Document>,
    pub store: Arc<dyn KeyValueStore>,
    pub transport: Arc<dyn MessageTransport>,
    pub presence: Arc<dyn PresenceChannel>,
    pub clipboard: Arc<dyn Clipboard>,
    pub notifier: Arc<dyn Notifier>,
}

impl HostSurfaces {
    /// Surfaces for running without a browser: messages go straight to an
    /// in-process background router over `store`, the clipboard is kept in
    /// memory and toasts are logged.
    pub fn headless(
        document: Arc<dyn Document>,
        store: Arc<dyn KeyValueStore>,
        config: &Config,
    ) -> Self {
        let router = Arc::new(BackgroundRouter::new(store.clone()));
        Self {
            document,
            store,
            transport: Arc::new(LoopbackTransport::new(router)),
            presence: Arc::new(BroadcastPresenceChannel::new(
                config.presence.channel_name.clone(),
            )),
            clipboard: Arc::new(MemoryClipboard::new()),
            notifier: Arc::new(TracingNotifier::new()),
        }
    }

    /// Store for a headless host: the SQLite file named by
    /// `cache.store_path`, or an in-memory database when unset.
    pub async fn open_store(config: &Config) -> Result<Arc<dyn KeyValueStore>, StoreError> {
        let store = match config.cache.resolved_store_path() {
            Some(path) => {
                info!("Opening store at {}", path.display());
                SqliteStore::open(&path).await?
            }
            None => SqliteStore::in_memory().await?,
        };
        Ok(Arc::new(store))
    }

    /// Replace the presence channel, e.g. to share one between several tabs.
    pub fn with_presence(mut self, presence: Arc<dyn PresenceChannel>) -> Self {
        self.presence = presence;
        self
    }

    pub fn with_clipboard(mut self, clipboard: Arc<dyn Clipboard>) -> Self {
        self.clipboard = clipboard;
        self
    }
}

//! Debounced DOM mutation watching.
//!
//! The CRM re-renders constantly; features re-apply their decorations whenever
//! the part of the page they care about changes. A burst of mutations is
//! coalesced into a single trailing-edge callback fired once the DOM has been
//! quiet for the debounce period.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{debug, trace};

use caselens_config::WatcherConfig;
use caselens_protocols::{Document, DomError, MutationRecord, NodeId, ObserveOptions};

/// Debounce and observation settings for a watcher.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WatchOptions {
    pub debounce: Duration,
    pub observe: ObserveOptions,
}

impl WatchOptions {
    pub fn new(debounce: Duration) -> Self {
        Self {
            debounce,
            observe: ObserveOptions::tree(),
        }
    }

    pub fn from_config(config: &WatcherConfig) -> Self {
        Self::new(config.default_debounce())
    }

    pub fn with_observe(mut self, observe: ObserveOptions) -> Self {
        self.observe = observe;
        self
    }
}

impl Default for WatchOptions {
    fn default() -> Self {
        Self::from_config(&WatcherConfig::default())
    }
}

/// Handle to a running watcher. The watcher stops on [`WatchHandle::stop`] or
/// when the handle is dropped.
pub struct WatchHandle {
    document: Arc<dyn Document>,
    target: NodeId,
    subscription_id: u64,
    stopped: Arc<AtomicBool>,
    task: JoinHandle<()>,
}

impl WatchHandle {
    /// Stop watching. Idempotent; no callback runs after this returns.
    pub fn stop(&self) {
        if self.stopped.swap(true, Ordering::SeqCst) {
            return;
        }
        self.document.disconnect(self.subscription_id);
        self.task.abort();
        debug!("Watcher on node {} stopped", self.target);
    }

    pub fn is_active(&self) -> bool {
        !self.stopped.load(Ordering::SeqCst)
    }

    pub fn target(&self) -> NodeId {
        self.target
    }
}

impl Drop for WatchHandle {
    fn drop(&mut self) {
        self.stop();
    }
}

impl std::fmt::Debug for WatchHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WatchHandle")
            .field("target", &self.target)
            .field("subscription_id", &self.subscription_id)
            .field("active", &self.is_active())
            .finish()
    }
}

/// Creates debounced watchers.
pub struct DomMutationWatcher;

impl DomMutationWatcher {
    /// Observe `target` and call `on_change` with the coalesced records of each
    /// burst, `options.debounce` after the last mutation in it.
    ///
    /// Must be called within a tokio runtime.
    pub fn watch<F>(
        document: Arc<dyn Document>,
        target: NodeId,
        options: WatchOptions,
        on_change: F,
    ) -> Result<WatchHandle, DomError>
    where
        F: Fn(Vec<MutationRecord>) + Send + Sync + 'static,
    {
        let mut subscription = document.observe(target, options.observe)?;
        let subscription_id = subscription.id;
        let stopped = Arc::new(AtomicBool::new(false));

        let task = {
            let stopped = stopped.clone();
            tokio::spawn(async move {
                let mut pending: Vec<MutationRecord> = Vec::new();
                loop {
                    if pending.is_empty() {
                        match subscription.records.recv().await {
                            Some(record) => pending.push(record),
                            None => break,
                        }
                        continue;
                    }

                    tokio::select! {
                        record = subscription.records.recv() => match record {
                            Some(record) => pending.push(record),
                            None => break,
                        },
                        _ = tokio::time::sleep(options.debounce) => {
                            if stopped.load(Ordering::SeqCst) {
                                break;
                            }
                            let batch = std::mem::take(&mut pending);
                            trace!("Watcher on node {} firing for {} mutations", target, batch.len());
                            on_change(batch);
                        }
                    }
                }
            })
        };

        debug!("Watching node {} (debounce {:?})", target, options.debounce);
        Ok(WatchHandle {
            document,
            target,
            subscription_id,
            stopped,
            task,
        })
    }
}

#[cfg(test)]
#[path = "watcher_tests.rs"]
mod tests;

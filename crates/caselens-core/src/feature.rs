//! Feature module contract and per-activation resource scope.
//!
//! A feature decorates the page for as long as the page is current. Everything
//! it creates on the page (watchers, injected nodes, decoration attributes,
//! event listeners, background tasks) goes through its [`FeatureScope`], which
//! the controller disposes when the page changes. A scope that has been
//! disposed refuses new resources, so a slow activation that finishes after
//! navigation cannot leak onto the next page.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tracing::debug;

use caselens_protocols::{
    Document, DomEvent, ExtractedCaseData, FeatureError, InsertPosition, MutationRecord,
    NewElement, NodeId, PageInfo, PageType,
};

use crate::settings::Settings;
use crate::watcher::{DomMutationWatcher, WatchHandle, WatchOptions};

/// An independently activatable unit of page enrichment.
#[async_trait]
pub trait FeatureModule: Send + Sync {
    /// Unique name, also used as the settings / config key.
    fn name(&self) -> &str;

    /// Whether the feature runs on this kind of page.
    fn supports(&self, page_type: PageType) -> bool;

    /// Decorate the current page. Resources must be registered with
    /// `context.scope`.
    async fn activate(&self, context: FeatureContext) -> Result<(), FeatureError>;

    /// Called after the scope is disposed, for state kept outside of it.
    fn deactivate(&self) {}
}

/// Everything a feature gets for one activation.
#[derive(Clone)]
pub struct FeatureContext {
    pub page: PageInfo,
    /// Resolved case data on case pages.
    pub case: Option<Arc<ExtractedCaseData>>,
    pub document: Arc<dyn Document>,
    pub settings: Arc<Settings>,
    pub scope: FeatureScope,
    /// Default watcher settings.
    pub watch: WatchOptions,
}

impl FeatureContext {
    /// Case data, or [`FeatureError::MissingData`].
    pub fn require_case(&self) -> Result<&ExtractedCaseData, FeatureError> {
        self.case
            .as_deref()
            .ok_or_else(|| FeatureError::MissingData("case data".to_string()))
    }
}

struct ScopeInner {
    feature: String,
    document: Arc<dyn Document>,
    disposed: AtomicBool,
    watchers: Mutex<HashMap<String, WatchHandle>>,
    nodes: Mutex<Vec<NodeId>>,
    attributes: Mutex<Vec<(NodeId, String)>>,
    /// Listener subscription ids with their target node.
    listeners: Mutex<Vec<(NodeId, u64)>>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

/// Owner of one feature activation's page resources. Cheap to clone.
#[derive(Clone)]
pub struct FeatureScope {
    inner: Arc<ScopeInner>,
}

impl FeatureScope {
    pub fn new(feature: impl Into<String>, document: Arc<dyn Document>) -> Self {
        Self {
            inner: Arc::new(ScopeInner {
                feature: feature.into(),
                document,
                disposed: AtomicBool::new(false),
                watchers: Mutex::new(HashMap::new()),
                nodes: Mutex::new(Vec::new()),
                attributes: Mutex::new(Vec::new()),
                listeners: Mutex::new(Vec::new()),
                tasks: Mutex::new(Vec::new()),
            }),
        }
    }

    pub fn feature(&self) -> &str {
        &self.inner.feature
    }

    pub fn is_disposed(&self) -> bool {
        self.inner.disposed.load(Ordering::SeqCst)
    }

    fn ensure_live(&self) -> Result<(), FeatureError> {
        if self.is_disposed() {
            return Err(FeatureError::Deactivated(self.inner.feature.clone()));
        }
        Ok(())
    }

    /// Start a debounced watcher under `key`. An existing watcher with the same
    /// key is stopped first.
    pub fn watch<F>(
        &self,
        key: &str,
        target: NodeId,
        options: WatchOptions,
        on_change: F,
    ) -> Result<(), FeatureError>
    where
        F: Fn(Vec<MutationRecord>) + Send + Sync + 'static,
    {
        self.ensure_live()?;
        let handle =
            DomMutationWatcher::watch(self.inner.document.clone(), target, options, on_change)?;

        let mut watchers = self.inner.watchers.lock();
        // Disposal may have run while the watcher was being created.
        if self.is_disposed() {
            handle.stop();
            return Err(FeatureError::Deactivated(self.inner.feature.clone()));
        }
        if let Some(previous) = watchers.insert(key.to_string(), handle) {
            previous.stop();
        }
        Ok(())
    }

    /// Insert an element that is removed again on dispose.
    pub fn insert(
        &self,
        parent: NodeId,
        element: NewElement,
        position: InsertPosition,
    ) -> Result<NodeId, FeatureError> {
        self.ensure_live()?;
        let node = self.inner.document.insert(parent, element, position)?;
        let mut nodes = self.inner.nodes.lock();
        if self.is_disposed() {
            self.inner.document.remove(node);
            return Err(FeatureError::Deactivated(self.inner.feature.clone()));
        }
        nodes.push(node);
        Ok(node)
    }

    /// Set a decoration attribute on a page node. It is removed on dispose.
    pub fn decorate(&self, node: NodeId, name: &str, value: &str) -> Result<(), FeatureError> {
        self.ensure_live()?;
        self.inner.document.set_attribute(node, name, value)?;
        let mut attributes = self.inner.attributes.lock();
        if !attributes.iter().any(|(n, a)| *n == node && a == name) {
            attributes.push((node, name.to_string()));
        }
        Ok(())
    }

    /// Call `handler` for every `event_type` event on `target` until dispose.
    pub fn listen<F>(&self, target: NodeId, event_type: &str, handler: F) -> Result<(), FeatureError>
    where
        F: Fn(DomEvent) + Send + Sync + 'static,
    {
        self.ensure_live()?;
        let mut subscription = self.inner.document.listen(target, event_type)?;
        {
            let mut listeners = self.inner.listeners.lock();
            if self.is_disposed() {
                self.inner.document.unlisten(subscription.id);
                return Err(FeatureError::Deactivated(self.inner.feature.clone()));
            }
            listeners.push((target, subscription.id));
        }
        self.spawn(async move {
            while let Some(event) = subscription.events.recv().await {
                handler(event);
            }
        })
    }

    /// Run a task that is aborted on dispose.
    pub fn spawn<F>(&self, future: F) -> Result<(), FeatureError>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        self.ensure_live()?;
        let handle = tokio::spawn(future);
        let mut tasks = self.inner.tasks.lock();
        if self.is_disposed() {
            handle.abort();
            return Err(FeatureError::Deactivated(self.inner.feature.clone()));
        }
        tasks.retain(|t| !t.is_finished());
        tasks.push(handle);
        Ok(())
    }

    /// Nodes inserted through this scope that are still in the document.
    pub fn nodes(&self) -> Vec<NodeId> {
        self.inner
            .nodes
            .lock()
            .iter()
            .copied()
            .filter(|n| self.inner.document.is_connected(*n))
            .collect()
    }

    /// Event listeners held by this scope.
    pub fn listener_count(&self) -> usize {
        self.inner.listeners.lock().len()
    }

    /// Forget injected nodes the page has since removed, and drop the
    /// listeners and decorations attached to them. Returns how many nodes
    /// were forgotten.
    pub fn release_detached(&self) -> usize {
        let document = &self.inner.document;
        let connected = |node: &NodeId| document.is_connected(*node);

        self.inner.listeners.lock().retain(|(target, id)| {
            let keep = connected(target);
            if !keep {
                document.unlisten(*id);
            }
            keep
        });
        self.inner
            .attributes
            .lock()
            .retain(|(node, _)| connected(node));
        self.inner.tasks.lock().retain(|t| !t.is_finished());

        let mut nodes = self.inner.nodes.lock();
        let before = nodes.len();
        nodes.retain(connected);
        before - nodes.len()
    }

    pub fn watcher_count(&self) -> usize {
        self.inner
            .watchers
            .lock()
            .values()
            .filter(|w| w.is_active())
            .count()
    }

    /// Release everything. Idempotent.
    pub fn dispose(&self) {
        if self.inner.disposed.swap(true, Ordering::SeqCst) {
            return;
        }
        let document = &self.inner.document;

        let watchers: Vec<_> = self.inner.watchers.lock().drain().collect();
        for (_, watcher) in &watchers {
            watcher.stop();
        }
        for task in self.inner.tasks.lock().drain(..) {
            task.abort();
        }
        for (_, id) in self.inner.listeners.lock().drain(..) {
            document.unlisten(id);
        }
        let mut removed = 0;
        for node in self.inner.nodes.lock().drain(..).rev() {
            if document.remove(node) {
                removed += 1;
            }
        }
        for (node, name) in self.inner.attributes.lock().drain(..) {
            let _ = document.remove_attribute(node, &name);
        }

        debug!(
            "Disposed scope of {}: {} watchers, {} nodes",
            self.inner.feature,
            watchers.len(),
            removed
        );
    }
}

#[cfg(test)]
#[path = "feature_tests.rs"]
mod tests;

//! Scopes of the features active on the current page.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::debug;

use caselens_protocols::Document;

use crate::feature::FeatureScope;

/// Feature name to the [`FeatureScope`] of its current activation.
#[derive(Default)]
pub struct ActiveObserverSet {
    scopes: HashMap<String, FeatureScope>,
}

impl ActiveObserverSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fresh scope for `feature`. A scope left over from an earlier activation
    /// of the same feature is disposed first.
    pub fn open(&mut self, feature: &str, document: Arc<dyn Document>) -> FeatureScope {
        let scope = FeatureScope::new(feature, document);
        if let Some(previous) = self.scopes.insert(feature.to_string(), scope.clone()) {
            previous.dispose();
        }
        scope
    }

    pub fn get(&self, feature: &str) -> Option<&FeatureScope> {
        self.scopes.get(feature)
    }

    /// Dispose one feature's scope.
    pub fn close(&mut self, feature: &str) -> bool {
        match self.scopes.remove(feature) {
            Some(scope) => {
                scope.dispose();
                true
            }
            None => false,
        }
    }

    /// Dispose every scope and return the names of the features they belonged to.
    pub fn dispose_all(&mut self) -> Vec<String> {
        let names: Vec<String> = self.scopes.keys().cloned().collect();
        for (_, scope) in self.scopes.drain() {
            scope.dispose();
        }
        if !names.is_empty() {
            debug!("Disposed {} feature scopes", names.len());
        }
        names
    }

    pub fn features(&self) -> Vec<&str> {
        self.scopes.keys().map(String::as_str).collect()
    }

    /// Live watchers across all scopes.
    pub fn watcher_count(&self) -> usize {
        self.scopes.values().map(FeatureScope::watcher_count).sum()
    }

    /// Injected nodes still in the document across all scopes.
    pub fn node_count(&self) -> usize {
        self.scopes.values().map(|s| s.nodes().len()).sum()
    }

    pub fn len(&self) -> usize {
        self.scopes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scopes.is_empty()
    }
}

//! Content-script bootstrap.

use std::sync::Arc;

use thiserror::Error;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use caselens_config::{Config, ConfigValidator};
use caselens_core::{
    CacheManager, CaseDataExtractor, Controller, ControllerParts, CustomerDataManager,
    CustomerTable, FeatureRegistry, FreshnessSource, LastModifiedScraper, PageMonitor,
    SettingsManager, SystemClock, monitor_page_changes,
};
use caselens_protocols::{DomError, FeatureError};

use crate::host::HostSurfaces;
use crate::register::register_default_features;

#[derive(Debug, Error)]
pub enum ContentScriptError {
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Feature registration failed: {0}")]
    Feature(#[from] FeatureError),

    #[error("Page monitoring failed: {0}")]
    Dom(#[from] DomError),
}

/// A running content script: page monitor feeding the controller.
pub struct ContentScript {
    controller: Arc<Controller>,
    cache: Arc<CacheManager>,
    registry: Arc<FeatureRegistry>,
    monitor: PageMonitor,
    runner: JoinHandle<()>,
}

impl ContentScript {
    /// Wire `host` into a controller with the bundled features and start
    /// watching for page changes. The current page is handled immediately.
    pub async fn start(
        host: HostSurfaces,
        config: &Config,
        bundled_customers: CustomerTable,
    ) -> Result<Self, ContentScriptError> {
        let validation = ConfigValidator::validate(config);
        for warning in &validation.warnings {
            warn!("Config {}: {}", warning.path, warning.message);
        }
        if !validation.is_valid() {
            let messages: Vec<String> = validation
                .errors
                .iter()
                .map(|e| format!("{}: {}", e.path, e.message))
                .collect();
            return Err(ContentScriptError::InvalidConfig(messages.join("; ")));
        }

        let freshness: Arc<dyn FreshnessSource> =
            Arc::new(LastModifiedScraper::new(host.document.clone()));
        let cache = Arc::new(CacheManager::new(
            host.store.clone(),
            freshness.clone(),
            Arc::new(SystemClock),
            config.cache.clone(),
        ));
        cache.init().await;

        let registry = Arc::new(FeatureRegistry::new());
        register_default_features(&registry, &host, config)?;

        let controller = Arc::new(Controller::new(
            ControllerParts {
                document: host.document.clone(),
                cache: cache.clone(),
                freshness,
                extractor: Arc::new(CaseDataExtractor::new()),
                customers: Arc::new(CustomerDataManager::new(
                    host.store.clone(),
                    bundled_customers,
                )),
                settings: Arc::new(SettingsManager::new(host.store.clone())),
                registry: registry.clone(),
            },
            config,
        ));

        let (pages, receiver) = mpsc::unbounded_channel();
        let runner = tokio::spawn(controller.clone().run(receiver));
        let monitor = monitor_page_changes(host.document.clone(), move |page| {
            // The runner only goes away on stop().
            let _ = pages.send(page);
        })?;

        info!("Content script started with {} cached cases", cache.len());
        Ok(Self {
            controller,
            cache,
            registry,
            monitor,
            runner,
        })
    }

    pub fn controller(&self) -> &Arc<Controller> {
        &self.controller
    }

    pub fn cache(&self) -> &Arc<CacheManager> {
        &self.cache
    }

    pub fn registry(&self) -> &Arc<FeatureRegistry> {
        &self.registry
    }

    /// Stop monitoring and tear everything down. Idempotent.
    pub fn stop(&self) {
        self.monitor.stop();
        self.runner.abort();
        self.controller.shutdown();
    }
}

impl Drop for ContentScript {
    fn drop(&mut self) {
        self.stop();
    }
}

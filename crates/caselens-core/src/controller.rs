//! Page-change orchestration.
//!
//! On every page change the controller, strictly in this order:
//!
//! 1. tears down the features of the previous page (synchronously),
//! 2. runs the initialization for the new page type,
//! 3. records the new page as current.
//!
//! Initialization is asynchronous (ready polling, cache, storage). Each
//! transition gets a generation number and every await point re-checks it, so
//! work for a page the user already left is dropped instead of applied.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use futures::FutureExt;
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use caselens_config::{Config, ControllerConfig, FeaturesConfig};
use caselens_protocols::{Document, ExtractedCaseData, FeatureError, PageInfo, PageType};

use crate::cache::CacheManager;
use crate::customer::CustomerDataManager;
use crate::dom::any_present;
use crate::extractor::{CaseDataExtractor, enrich};
use crate::feature::{FeatureContext, FeatureModule};
use crate::freshness::FreshnessSource;
use crate::observers::ActiveObserverSet;
use crate::registry::FeatureRegistry;
use crate::settings::{Settings, SettingsManager};
use crate::watcher::WatchOptions;

/// Controller state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ControllerState {
    Idle,
    /// The previous page is torn down and this one is being initialized.
    Loading(PageInfo),
    Active(PageInfo),
}

/// Where the case data of a case page came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaseSource {
    Cache,
    Extracted,
}

/// Result of a completed page initialization.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActivationReport {
    pub page: PageInfo,
    /// Ready markers never appeared; features ran best-effort.
    pub degraded: bool,
    pub case_source: Option<CaseSource>,
    pub activated: Vec<String>,
    pub failed: Vec<String>,
}

/// What became of a page change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransitionOutcome {
    /// Same page as the current one; nothing happened.
    Unchanged,
    /// A newer page change took over before initialization finished.
    Superseded,
    Completed(ActivationReport),
}

enum Readiness {
    Ready,
    Degraded,
    Superseded,
}

/// Collaborators of the [`Controller`].
pub struct ControllerParts {
    pub document: Arc<dyn Document>,
    pub cache: Arc<CacheManager>,
    pub freshness: Arc<dyn FreshnessSource>,
    pub extractor: Arc<CaseDataExtractor>,
    pub customers: Arc<CustomerDataManager>,
    pub settings: Arc<SettingsManager>,
    pub registry: Arc<FeatureRegistry>,
}

/// Page-change state machine. One instance per tab.
pub struct Controller {
    parts: ControllerParts,
    config: ControllerConfig,
    features_config: FeaturesConfig,
    watch: WatchOptions,
    generation: AtomicU64,
    /// Latest page a transition was started for.
    requested: Mutex<Option<PageInfo>>,
    state: Mutex<ControllerState>,
    observers: Mutex<ActiveObserverSet>,
    active: Mutex<Vec<Arc<dyn FeatureModule>>>,
    current_case: Mutex<Option<Arc<ExtractedCaseData>>>,
}

impl Controller {
    pub fn new(parts: ControllerParts, config: &Config) -> Self {
        Self {
            parts,
            config: config.controller.clone(),
            features_config: config.features.clone(),
            watch: WatchOptions::from_config(&config.watcher),
            generation: AtomicU64::new(0),
            requested: Mutex::new(None),
            state: Mutex::new(ControllerState::Idle),
            observers: Mutex::new(ActiveObserverSet::new()),
            active: Mutex::new(Vec::new()),
            current_case: Mutex::new(None),
        }
    }

    pub fn state(&self) -> ControllerState {
        self.state.lock().clone()
    }

    /// Case data of the current case page.
    pub fn current_case(&self) -> Option<Arc<ExtractedCaseData>> {
        self.current_case.lock().clone()
    }

    /// Live watchers across active features.
    pub fn watcher_count(&self) -> usize {
        self.observers.lock().watcher_count()
    }

    /// Injected nodes still in the document across active features.
    pub fn injected_node_count(&self) -> usize {
        self.observers.lock().node_count()
    }

    pub fn active_features(&self) -> Vec<String> {
        self.active
            .lock()
            .iter()
            .map(|f| f.name().to_string())
            .collect()
    }

    fn is_current(&self, generation: u64) -> bool {
        self.generation.load(Ordering::SeqCst) == generation
    }

    /// Dispose every active feature's resources and deactivate them.
    fn teardown(&self) {
        let closed = self.observers.lock().dispose_all();
        let features: Vec<_> = self.active.lock().drain(..).collect();
        for feature in &features {
            feature.deactivate();
        }
        *self.current_case.lock() = None;
        if !closed.is_empty() {
            debug!("Tore down features: {}", closed.join(", "));
        }
    }

    /// Synchronous part of a transition: de-duplicate, bump the generation and
    /// tear down the previous page. Returns the new generation, or `None` when
    /// `page` is already the requested page.
    pub fn begin(&self, page: &PageInfo) -> Option<u64> {
        {
            let mut requested = self.requested.lock();
            if requested.as_ref() == Some(page) {
                return None;
            }
            *requested = Some(page.clone());
        }
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        info!("Page transition #{} to {}", generation, page);
        self.teardown();
        *self.state.lock() = ControllerState::Loading(page.clone());
        Some(generation)
    }

    /// Handle a page change end to end.
    pub async fn handle_page_change(&self, page: PageInfo) -> TransitionOutcome {
        match self.begin(&page) {
            Some(generation) => self.initialize(page, generation).await,
            None => TransitionOutcome::Unchanged,
        }
    }

    /// Asynchronous part of a transition started by [`Controller::begin`].
    pub async fn initialize(&self, page: PageInfo, generation: u64) -> TransitionOutcome {
        let mut report = ActivationReport {
            page: page.clone(),
            degraded: false,
            case_source: None,
            activated: Vec::new(),
            failed: Vec::new(),
        };

        if page.page_type != PageType::Unknown {
            let markers = self.ready_markers(page.page_type);
            match self.wait_until_ready(&markers, generation).await {
                Readiness::Ready => {}
                Readiness::Degraded => report.degraded = true,
                Readiness::Superseded => return TransitionOutcome::Superseded,
            }

            let mut case = None;
            if page.page_type == PageType::CasePage {
                match self.resolve_case(&page, generation).await {
                    Some((data, source)) => {
                        report.case_source = Some(source);
                        case = Some(data);
                    }
                    None if !self.is_current(generation) => return TransitionOutcome::Superseded,
                    None => {}
                }
            }

            if !self.activate_features(&page, case, generation, &mut report).await {
                return TransitionOutcome::Superseded;
            }
        }

        {
            let mut state = self.state.lock();
            if !self.is_current(generation) {
                return TransitionOutcome::Superseded;
            }
            *state = ControllerState::Active(page);
        }
        TransitionOutcome::Completed(report)
    }

    fn ready_markers(&self, page_type: PageType) -> Vec<String> {
        match page_type {
            PageType::CasePage => self.config.case_ready_markers.clone(),
            PageType::CaseListPage | PageType::CaseCommentsPage => {
                self.config.list_ready_markers.clone()
            }
            _ => Vec::new(),
        }
    }

    /// Poll for any marker, at most `ready_max_attempts` times.
    async fn wait_until_ready(&self, markers: &[String], generation: u64) -> Readiness {
        if markers.is_empty() {
            return Readiness::Ready;
        }
        let document = self.parts.document.as_ref();
        for attempt in 0..self.config.ready_max_attempts {
            if !self.is_current(generation) {
                return Readiness::Superseded;
            }
            if any_present(document, markers) {
                debug!("Page ready after {} polls", attempt);
                return Readiness::Ready;
            }
            tokio::time::sleep(self.config.ready_poll_interval()).await;
        }
        if !self.is_current(generation) {
            return Readiness::Superseded;
        }
        if any_present(document, markers) {
            return Readiness::Ready;
        }
        warn!(
            "Page not ready after {} polls, continuing best-effort",
            self.config.ready_max_attempts
        );
        Readiness::Degraded
    }

    /// Cached or freshly extracted case data.
    async fn resolve_case(
        &self,
        page: &PageInfo,
        generation: u64,
    ) -> Option<(Arc<ExtractedCaseData>, CaseSource)> {
        let Some(record_id) = page.record_id.as_deref() else {
            warn!("Case page without record id: {}", page);
            return None;
        };

        let token = self.parts.freshness.current_token();
        if let Some(cached) = self.parts.cache.get(record_id, token.as_deref()).await {
            if !self.is_current(generation) {
                return None;
            }
            let data = Arc::new(cached);
            *self.current_case.lock() = Some(data.clone());
            return Some((data, CaseSource::Cache));
        }
        if !self.is_current(generation) {
            return None;
        }

        let raw = self.parts.extractor.extract(self.parts.document.as_ref());
        let table = self.parts.customers.table().await;
        if !self.is_current(generation) {
            return None;
        }
        let data = enrich(record_id, raw, &table);
        self.parts.cache.set(record_id, data.clone()).await;
        if !self.is_current(generation) {
            return None;
        }

        let data = Arc::new(data);
        *self.current_case.lock() = Some(data.clone());
        Some((data, CaseSource::Extracted))
    }

    fn is_enabled(&self, name: &str, settings: &Settings) -> bool {
        self.features_config
            .pinned(name)
            .unwrap_or_else(|| settings.is_feature_enabled(name))
    }

    /// Activate every enabled feature supporting the page. Returns false when
    /// superseded.
    async fn activate_features(
        &self,
        page: &PageInfo,
        case: Option<Arc<ExtractedCaseData>>,
        generation: u64,
        report: &mut ActivationReport,
    ) -> bool {
        let settings = Arc::new(self.parts.settings.load().await);

        for feature in self.parts.registry.supporting(page.page_type) {
            let name = feature.name().to_string();
            if !self.is_enabled(&name, &settings) {
                debug!("Feature {} disabled", name);
                continue;
            }
            if !self.is_current(generation) {
                return false;
            }

            let scope = {
                let mut observers = self.observers.lock();
                // Re-check under the lock so a concurrent teardown cannot miss it.
                if !self.is_current(generation) {
                    return false;
                }
                observers.open(&name, self.parts.document.clone())
            };
            let context = FeatureContext {
                page: page.clone(),
                case: case.clone(),
                document: self.parts.document.clone(),
                settings: settings.clone(),
                scope: scope.clone(),
                watch: self.watch,
            };

            match AssertUnwindSafe(feature.activate(context)).catch_unwind().await {
                Ok(Ok(())) => {
                    // Under the observers lock a concurrent teardown either
                    // sees this feature in `active` or has already bumped
                    // the generation.
                    let registered = {
                        let _observers = self.observers.lock();
                        let current = self.is_current(generation);
                        if current {
                            self.active.lock().push(feature.clone());
                        }
                        current
                    };
                    if !registered {
                        scope.dispose();
                        feature.deactivate();
                        return false;
                    }
                    debug!("Feature {} active", name);
                    report.activated.push(name);
                }
                Ok(Err(FeatureError::Deactivated(_))) => {
                    // Torn down mid-activation; whatever it set up outside
                    // the scope still needs undoing.
                    scope.dispose();
                    feature.deactivate();
                    return false;
                }
                Ok(Err(e)) => {
                    warn!("Feature {} failed to activate: {}", name, e);
                    self.observers.lock().close(&name);
                    report.failed.push(name);
                }
                Err(panic) => {
                    let message = panic
                        .downcast_ref::<&str>()
                        .map(|s| s.to_string())
                        .or_else(|| panic.downcast_ref::<String>().cloned())
                        .unwrap_or_else(|| "unknown panic".to_string());
                    error!("Feature {} panicked during activation: {}", name, message);
                    self.observers.lock().close(&name);
                    report.failed.push(name);
                }
            }
        }
        true
    }

    /// Consume page changes until the sender is dropped. Each change is torn
    /// down synchronously and initialized in its own task.
    pub async fn run(self: Arc<Self>, mut pages: mpsc::UnboundedReceiver<PageInfo>) {
        while let Some(page) = pages.recv().await {
            if let Some(generation) = self.begin(&page) {
                let controller = self.clone();
                tokio::spawn(async move {
                    if let TransitionOutcome::Completed(report) =
                        controller.initialize(page, generation).await
                    {
                        info!(
                            "Page {} initialized: {} active, {} failed{}",
                            report.page,
                            report.activated.len(),
                            report.failed.len(),
                            if report.degraded { " (degraded)" } else { "" }
                        );
                    }
                });
            }
        }
        debug!("Page change stream closed");
    }

    /// Full teardown on extension unload.
    pub fn shutdown(&self) {
        self.generation.fetch_add(1, Ordering::SeqCst);
        self.teardown();
        *self.requested.lock() = None;
        *self.state.lock() = ControllerState::Idle;
        info!("Controller shut down");
    }
}

#[cfg(test)]
#[path = "controller_tests.rs"]
mod tests;

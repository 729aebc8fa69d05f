//! # CaseLens Core
//!
//! Page-state synchronization and caching for the CaseLens content layer:
//!
//! - [`page`] - URL classification and SPA navigation monitoring
//! - [`watcher`] - debounced DOM mutation watching
//! - [`cache`] - record-id keyed extraction cache with freshness tokens
//! - [`extractor`] - case field scraping and customer enrichment
//! - [`controller`] - page-change orchestration of feature modules
//!
//! plus the in-memory [`dom::MemoryDocument`], [`store::MemoryStore`] and
//! [`host`] surfaces used for headless runs, and the background messaging
//! pieces in [`messaging`].

pub mod cache;
pub mod clock;
pub mod controller;
pub mod customer;
pub mod dom;
pub mod extractor;
pub mod feature;
pub mod freshness;
pub mod host;
pub mod messaging;
pub mod observers;
pub mod page;
pub mod registry;
pub mod settings;
pub mod store;
pub mod watcher;

pub use cache::{CacheEntry, CacheManager, CacheStats};
pub use clock::{Clock, ManualClock, SystemClock};
pub use controller::{
    ActivationReport, CaseSource, Controller, ControllerParts, ControllerState, TransitionOutcome,
};
pub use customer::{CustomerDataManager, CustomerSource, CustomerTable};
pub use dom::MemoryDocument;
pub use extractor::{CaseDataExtractor, CaseField, FieldStrategy, enrich};
pub use feature::{FeatureContext, FeatureModule, FeatureScope};
pub use freshness::{FreshnessSource, LastModifiedScraper};
pub use host::{MemoryClipboard, TracingNotifier};
pub use messaging::{BackgroundRouter, LoopbackTransport, MessagingClient, RemoteStore};
pub use observers::ActiveObserverSet;
pub use page::{PageMonitor, PageTracker, identify, monitor_page_changes};
pub use registry::FeatureRegistry;
pub use settings::{Settings, SettingsManager};
pub use store::MemoryStore;
pub use watcher::{DomMutationWatcher, WatchHandle, WatchOptions};

//! # CaseLens
//!
//! Content layer for the Salesforce console: identifies the displayed case,
//! extracts and caches its data, and keeps feature decorations in sync with
//! the page as the single-page app navigates.
//!
//! [`ContentScript::start`] wires a tab's [`HostSurfaces`] into the
//! controller from `caselens-core` with the bundled feature modules.

mod content_script;
mod host;
mod logging;
mod register;

pub use content_script::{ContentScript, ContentScriptError};
pub use host::HostSurfaces;
pub use logging::{LOG_ENV, init_tracing};
pub use register::register_default_features;

pub use caselens_store_sqlite::SqliteStore;

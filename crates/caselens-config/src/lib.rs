//! # CaseLens Config
//!
//! Static tunables for the content layer: cache horizon and ceiling, page-ready
//! polling bounds, watcher debounce, presence heartbeat and messaging retries.

mod error;
mod loader;
mod schema;
mod validator;

pub use error::ConfigError;
pub use loader::ConfigLoader;
pub use schema::*;
pub use validator::{ConfigValidator, ValidationError, ValidationResult, ValidationWarning};

//! Key-value store errors.

use thiserror::Error;

use crate::store::StoreScope;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Storage unavailable: {0}")]
    Unavailable(String),

    #[error("Quota exceeded in {scope} scope: {requested} bytes requested, {quota} allowed")]
    QuotaExceeded {
        scope: StoreScope,
        requested: u64,
        quota: u64,
    },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Backend error: {0}")]
    Backend(String),
}

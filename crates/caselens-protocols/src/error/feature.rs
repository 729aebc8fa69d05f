//! Feature module errors.

use thiserror::Error;

use super::{DomError, StoreError};

#[derive(Debug, Error)]
pub enum FeatureError {
    #[error("Feature not found: {0}")]
    NotFound(String),

    #[error("Feature already registered: {0}")]
    AlreadyRegistered(String),

    #[error("Feature {feature} failed to activate: {reason}")]
    ActivationFailed { feature: String, reason: String },

    #[error("Feature {0} was deactivated")]
    Deactivated(String),

    #[error("Required page data missing: {0}")]
    MissingData(String),

    #[error("DOM error: {0}")]
    Dom(#[from] DomError),

    #[error("Storage error: {0}")]
    Store(#[from] StoreError),

    #[error("{0}")]
    Custom(String),
}

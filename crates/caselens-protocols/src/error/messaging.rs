//! Background messaging errors.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum MessagingError {
    /// The background context is not listening (service worker asleep or reloading).
    #[error("Receiving end does not exist: {0}")]
    ReceiverMissing(String),

    #[error("Request timeout")]
    Timeout,

    #[error("Unknown action: {0}")]
    UnknownAction(String),

    #[error("Request rejected: {0}")]
    Rejected(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl MessagingError {
    /// Whether a retry has a chance of succeeding.
    pub fn is_transient(&self) -> bool {
        matches!(self, MessagingError::ReceiverMissing(_) | MessagingError::Timeout)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_receiver_missing_is_transient() {
        let err = MessagingError::ReceiverMissing("background".to_string());
        assert!(err.is_transient());
        assert!(err.to_string().contains("Receiving end does not exist"));
    }

    #[test]
    fn test_rejected_is_not_transient() {
        assert!(!MessagingError::Rejected("bad payload".to_string()).is_transient());
        assert!(!MessagingError::UnknownAction("launch".to_string()).is_transient());
        assert!(MessagingError::Timeout.is_transient());
    }
}

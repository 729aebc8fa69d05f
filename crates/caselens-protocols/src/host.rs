//! User-facing output surfaces provided by the host.

use async_trait::async_trait;

use crate::error::ExportError;

/// Severity of a toast notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToastLevel {
    Success,
    Error,
}

/// System clipboard.
#[async_trait]
pub trait Clipboard: Send + Sync {
    async fn write_text(&self, text: &str) -> Result<(), ExportError>;
}

/// Non-blocking toast notifications, used only for explicit user actions.
pub trait Notifier: Send + Sync {
    fn toast(&self, level: ToastLevel, message: &str);
}

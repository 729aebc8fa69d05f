//! Headless clipboard and notification surfaces.

use async_trait::async_trait;
use parking_lot::Mutex;
use tracing::{error, info};

use caselens_protocols::{Clipboard, ExportError, Notifier, ToastLevel};

/// Clipboard that keeps what was written, in order.
#[derive(Debug, Default)]
pub struct MemoryClipboard {
    writes: Mutex<Vec<String>>,
}

impl MemoryClipboard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Last written text.
    pub fn contents(&self) -> Option<String> {
        self.writes.lock().last().cloned()
    }

    pub fn write_count(&self) -> usize {
        self.writes.lock().len()
    }
}

#[async_trait]
impl Clipboard for MemoryClipboard {
    async fn write_text(&self, text: &str) -> Result<(), ExportError> {
        self.writes.lock().push(text.to_string());
        Ok(())
    }
}

/// Notifier that logs toasts and remembers them.
#[derive(Debug, Default)]
pub struct TracingNotifier {
    toasts: Mutex<Vec<(ToastLevel, String)>>,
}

impl TracingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn toasts(&self) -> Vec<(ToastLevel, String)> {
        self.toasts.lock().clone()
    }
}

impl Notifier for TracingNotifier {
    fn toast(&self, level: ToastLevel, message: &str) {
        match level {
            ToastLevel::Success => info!(toast = true, "{}", message),
            ToastLevel::Error => error!(toast = true, "{}", message),
        }
        self.toasts.lock().push((level, message.to_string()));
    }
}

//! Clipboard export errors.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("No comments found to export")]
    NoComments,

    #[error("Clipboard write failed: {0}")]
    Clipboard(String),
}

//! DOM access errors.
//!
//! A selector that matches nothing is not an error; queries return `None` or an
//! empty list. These variants cover writes against nodes that are gone.

use thiserror::Error;

use crate::dom::NodeId;

#[derive(Debug, Error)]
pub enum DomError {
    #[error("Node not found: {0}")]
    NodeNotFound(NodeId),

    #[error("Node is detached from the document: {0}")]
    Detached(NodeId),

    #[error("Invalid selector: {0}")]
    InvalidSelector(String),

    #[error("Unsupported DOM operation: {0}")]
    Unsupported(String),
}

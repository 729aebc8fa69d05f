//! Document helpers and the in-memory document.

mod memory;
mod selector;

pub use memory::MemoryDocument;

use caselens_protocols::{Document, ElementSnapshot, NodeId};

/// First match of the first selector in `chain` that matches anything.
pub fn query_first_of(
    document: &dyn Document,
    scope: Option<NodeId>,
    chain: &[&str],
) -> Option<ElementSnapshot> {
    chain.iter().find_map(|selector| document.query(scope, selector))
}

/// Whether any selector in `markers` currently matches.
pub fn any_present(document: &dyn Document, markers: &[String]) -> bool {
    markers.iter().any(|m| document.query(None, m).is_some())
}

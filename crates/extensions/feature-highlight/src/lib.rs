//! Highlighting for CaseLens.
//!
//! Marks case list rows and case page fields that need attention: configured
//! statuses and priorities, and list rows that have not been touched for
//! longer than the aging threshold.

mod feature;
mod rules;

pub use feature::{HIGHLIGHT_ATTR, HighlightFeature};
pub use rules::{HighlightKind, HighlightRules};

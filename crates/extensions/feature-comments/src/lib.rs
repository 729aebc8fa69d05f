//! Case comment export for CaseLens.
//!
//! Adds "Copy XML" and "Copy TSV" buttons to case pages. Clicking one scrapes
//! the visible case comments, formats them in ascending date order and puts
//! the result on the clipboard.

mod export;
mod feature;
mod scrape;

pub use export::{ExportFormat, ExportMetadata, sort_by_date, to_tsv, to_xml};
pub use feature::{BUTTONS_ATTR, CommentsFeature};
pub use scrape::scrape_comments;

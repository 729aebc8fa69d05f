//! Quick-info menu for CaseLens.
//!
//! Shows the enriched customer data of the open case in a small panel with a
//! copy action per value, and registers the extension's context menu entries
//! with the background context.

mod feature;
mod items;

pub use feature::{CONTEXT_MENUS, MENU_ATTR, MenuFeature};
pub use items::{MenuItem, menu_items, summary};

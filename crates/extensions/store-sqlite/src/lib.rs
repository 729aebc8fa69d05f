//! SQLite key-value store for CaseLens.
//!
//! Durable [`KeyValueStore`](caselens_protocols::KeyValueStore) used when the
//! content layer runs outside a browser.

mod schema;
mod store;

pub use store::SqliteStore;

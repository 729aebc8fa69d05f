//! Messaging between the content layer and the background context.
//!
//! - [`MessagingClient`] sends requests and retries while the background
//!   context is not listening yet.
//! - [`BackgroundRouter`] serves the requests (storage, saved selections,
//!   context menu registration).
//! - [`LoopbackTransport`] connects the two in-process.
//! - [`RemoteStore`] exposes background storage as a [`KeyValueStore`].
//!
//! [`KeyValueStore`]: caselens_protocols::KeyValueStore

mod client;
mod remote_store;
mod router;

pub use client::MessagingClient;
pub use remote_store::RemoteStore;
pub use router::{BackgroundRouter, ContextMenuEntry, LoopbackTransport, SAVED_SELECTIONS_KEY};

//! # CaseLens Protocols
//!
//! Interface definitions shared by every CaseLens crate. Contains only traits and
//! plain data types - no implementations.
//!
//! ## Host seams
//!
//! - [`Document`] - the live page DOM owned by the CRM
//! - [`KeyValueStore`] - browser storage with `sync` and `local` scopes
//! - [`MessageTransport`] - request/response channel to the background context
//! - [`PresenceChannel`] - same-origin broadcast channel shared by open tabs
//! - [`Clipboard`] / [`Notifier`] - user-facing output surfaces

pub mod case;
pub mod dom;
pub mod error;
pub mod host;
pub mod messaging;
pub mod page;
pub mod presence;
pub mod store;

pub use case::{CaseComment, CustomerRecord, ExtractedCaseData, RawCaseFields};
pub use dom::{
    Document, DomEvent, ElementSnapshot, EventSubscription, InsertPosition, MutationKind,
    MutationRecord, MutationSubscription, NewElement, NodeId, ObserveOptions,
};
pub use error::{DomError, ExportError, FeatureError, MessagingError, StoreError};
pub use host::{Clipboard, Notifier, ToastLevel};
pub use messaging::{MessageTransport, RuntimeMessage, RuntimeResponse};
pub use page::{PageInfo, PageType};
pub use presence::{Heartbeat, PresenceChannel};
pub use store::{KeyValueStore, StoreScope};

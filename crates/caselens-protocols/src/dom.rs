//! Document (DOM) protocol.
//!
//! The CRM owns the page; CaseLens only reads it, decorates it, and observes it.
//! A browser host implements [`Document`] over the real DOM, and
//! `caselens_core::dom::MemoryDocument` implements it in memory.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tokio::sync::{broadcast, mpsc};

use crate::error::DomError;

/// Opaque handle to a node in the document.
pub type NodeId = u64;

/// Which mutations an observation reports.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObserveOptions {
    pub child_list: bool,
    pub attributes: bool,
    pub character_data: bool,
    pub subtree: bool,
}

impl ObserveOptions {
    /// Children, attributes and text anywhere below the target.
    pub fn tree() -> Self {
        Self {
            child_list: true,
            attributes: true,
            character_data: true,
            subtree: true,
        }
    }

    /// Child list changes anywhere below the target.
    pub fn child_list_subtree() -> Self {
        Self {
            child_list: true,
            subtree: true,
            ..Default::default()
        }
    }
}

/// Kind of a single DOM mutation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MutationKind {
    ChildList,
    Attributes { name: String },
    CharacterData,
}

/// A single DOM mutation as delivered to an observer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MutationRecord {
    pub target: NodeId,
    pub kind: MutationKind,
}

/// Live mutation observation. Dropping the receiver does not disconnect it;
/// call [`Document::disconnect`] with `id`.
#[derive(Debug)]
pub struct MutationSubscription {
    pub id: u64,
    pub records: mpsc::UnboundedReceiver<MutationRecord>,
}

/// A user event dispatched on a node (e.g. `click`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DomEvent {
    pub target: NodeId,
    pub event_type: String,
}

/// Live event listener registration.
#[derive(Debug)]
pub struct EventSubscription {
    pub id: u64,
    pub events: mpsc::UnboundedReceiver<DomEvent>,
}

/// Read-only copy of an element at query time.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ElementSnapshot {
    pub node_id: NodeId,
    pub tag: String,
    /// Text content of the element and its descendants.
    pub text: String,
    pub attributes: HashMap<String, String>,
}

impl ElementSnapshot {
    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attributes.get(name).map(String::as_str)
    }

    pub fn has_class(&self, class: &str) -> bool {
        self.attr("class")
            .map(|c| c.split_whitespace().any(|c| c == class))
            .unwrap_or(false)
    }

    /// Trimmed text, `None` when blank.
    pub fn text_trimmed(&self) -> Option<&str> {
        let text = self.text.trim();
        if text.is_empty() { None } else { Some(text) }
    }
}

/// Element to be created by [`Document::insert`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NewElement {
    pub tag: String,
    pub text: String,
    pub attributes: Vec<(String, String)>,
}

impl NewElement {
    pub fn new(tag: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            ..Default::default()
        }
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = text.into();
        self
    }

    pub fn with_attr(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.push((name.into(), value.into()));
        self
    }
}

/// Where [`Document::insert`] places the new element relative to `parent`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum InsertPosition {
    #[default]
    Append,
    Prepend,
}

/// The live document of the current tab.
pub trait Document: Send + Sync {
    /// Current `location.href`.
    fn location(&self) -> String;

    /// Current `document.title`.
    fn title(&self) -> String;

    /// The `<body>` node.
    fn body(&self) -> NodeId;

    /// All elements matching a CSS selector, in document order. `scope` limits
    /// the search to descendants of a node.
    fn query_all(&self, scope: Option<NodeId>, selector: &str) -> Vec<ElementSnapshot>;

    /// First element matching a CSS selector.
    fn query(&self, scope: Option<NodeId>, selector: &str) -> Option<ElementSnapshot> {
        self.query_all(scope, selector).into_iter().next()
    }

    /// Snapshot of a node by id, `None` when it no longer exists.
    fn element(&self, node: NodeId) -> Option<ElementSnapshot>;

    fn insert(
        &self,
        parent: NodeId,
        element: NewElement,
        position: InsertPosition,
    ) -> Result<NodeId, DomError>;

    /// Removes a node and its subtree. Returns false when it was already gone.
    fn remove(&self, node: NodeId) -> bool;

    fn set_attribute(&self, node: NodeId, name: &str, value: &str) -> Result<(), DomError>;

    fn remove_attribute(&self, node: NodeId, name: &str) -> Result<(), DomError>;

    fn set_text(&self, node: NodeId, text: &str) -> Result<(), DomError>;

    /// Whether the node is still attached under `<body>`.
    fn is_connected(&self, node: NodeId) -> bool;

    /// Start a mutation observation rooted at `target`.
    fn observe(&self, target: NodeId, options: ObserveOptions)
    -> Result<MutationSubscription, DomError>;

    /// Stop a mutation observation. Unknown ids are ignored.
    fn disconnect(&self, subscription_id: u64);

    /// Listen for `event_type` events dispatched on `target`.
    fn listen(&self, target: NodeId, event_type: &str) -> Result<EventSubscription, DomError>;

    /// Remove an event listener. Unknown ids are ignored.
    fn unlisten(&self, subscription_id: u64);

    /// `popstate` notifications carrying the new location.
    fn history(&self) -> broadcast::Receiver<String>;
}

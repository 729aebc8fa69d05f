//! In-memory [`Document`] implementation.
//!
//! Used for headless runs and as the test double for everything that touches
//! the page. Mutations are reported to observers synchronously through
//! unbounded channels, matching the "records queued, callback later" model of
//! the browser's `MutationObserver`.

use std::collections::HashMap;

use parking_lot::Mutex;
use tokio::sync::{broadcast, mpsc};
use tracing::warn;

use caselens_protocols::{
    Document, DomError, DomEvent, ElementSnapshot, EventSubscription, InsertPosition, MutationKind,
    MutationRecord, MutationSubscription, NewElement, NodeId, ObserveOptions,
};

use super::selector::{SelectorList, SelectorTarget};

const BODY: NodeId = 1;

struct Node {
    tag: String,
    text: String,
    attributes: HashMap<String, String>,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
}

impl Node {
    fn new(tag: impl Into<String>, parent: Option<NodeId>) -> Self {
        Self {
            tag: tag.into(),
            text: String::new(),
            attributes: HashMap::new(),
            parent,
            children: Vec::new(),
        }
    }
}

struct Observer {
    target: NodeId,
    options: ObserveOptions,
    tx: mpsc::UnboundedSender<MutationRecord>,
}

struct Listener {
    target: NodeId,
    event_type: String,
    tx: mpsc::UnboundedSender<DomEvent>,
}

struct Inner {
    nodes: HashMap<NodeId, Node>,
    next_node: NodeId,
    location: String,
    title: String,
    observers: HashMap<u64, Observer>,
    listeners: HashMap<u64, Listener>,
    next_subscription: u64,
}

impl SelectorTarget for Inner {
    fn tag_of(&self, node: NodeId) -> Option<&str> {
        self.nodes.get(&node).map(|n| n.tag.as_str())
    }

    fn attr_of(&self, node: NodeId, name: &str) -> Option<&str> {
        self.nodes
            .get(&node)
            .and_then(|n| n.attributes.get(name))
            .map(String::as_str)
    }

    fn parent_of(&self, node: NodeId) -> Option<NodeId> {
        self.nodes.get(&node).and_then(|n| n.parent)
    }
}

impl Inner {
    fn node(&self, id: NodeId) -> Result<&Node, DomError> {
        self.nodes.get(&id).ok_or(DomError::NodeNotFound(id))
    }

    fn node_mut(&mut self, id: NodeId) -> Result<&mut Node, DomError> {
        self.nodes.get_mut(&id).ok_or(DomError::NodeNotFound(id))
    }

    fn is_connected(&self, id: NodeId) -> bool {
        let mut current = Some(id);
        while let Some(node) = current {
            if node == BODY {
                return true;
            }
            current = self.parent_of(node);
        }
        false
    }

    fn is_inclusive_ancestor(&self, ancestor: NodeId, node: NodeId) -> bool {
        let mut current = Some(node);
        while let Some(n) = current {
            if n == ancestor {
                return true;
            }
            current = self.parent_of(n);
        }
        false
    }

    fn text_content(&self, id: NodeId) -> String {
        let Some(node) = self.nodes.get(&id) else {
            return String::new();
        };
        let mut text = node.text.clone();
        for child in &node.children {
            text.push_str(&self.text_content(*child));
        }
        text
    }

    fn snapshot(&self, id: NodeId) -> Option<ElementSnapshot> {
        let node = self.nodes.get(&id)?;
        Some(ElementSnapshot {
            node_id: id,
            tag: node.tag.clone(),
            text: self.text_content(id),
            attributes: node.attributes.clone(),
        })
    }

    /// Preorder traversal of the subtree below `root` (root excluded).
    fn descendants(&self, root: NodeId, out: &mut Vec<NodeId>) {
        if let Some(node) = self.nodes.get(&root) {
            for child in &node.children {
                out.push(*child);
                self.descendants(*child, out);
            }
        }
    }

    fn notify(&mut self, target: NodeId, kind: MutationKind) {
        let mut closed = Vec::new();
        for (id, observer) in &self.observers {
            let wants_kind = match kind {
                MutationKind::ChildList => observer.options.child_list,
                MutationKind::Attributes { .. } => observer.options.attributes,
                MutationKind::CharacterData => observer.options.character_data,
            };
            if !wants_kind {
                continue;
            }
            let in_scope = observer.target == target
                || (observer.options.subtree && self.is_inclusive_ancestor(observer.target, target));
            if !in_scope {
                continue;
            }
            let record = MutationRecord {
                target,
                kind: kind.clone(),
            };
            if observer.tx.send(record).is_err() {
                closed.push(*id);
            }
        }
        for id in closed {
            self.observers.remove(&id);
        }
    }

    fn drop_subtree(&mut self, id: NodeId) {
        if let Some(node) = self.nodes.remove(&id) {
            for child in node.children {
                self.drop_subtree(child);
            }
        }
    }
}

/// In-memory DOM with a `<body>` root.
pub struct MemoryDocument {
    inner: Mutex<Inner>,
    history: broadcast::Sender<String>,
}

impl MemoryDocument {
    /// Create an empty document at `location`.
    pub fn new(location: impl Into<String>) -> Self {
        let mut nodes = HashMap::new();
        nodes.insert(BODY, Node::new("body", None));
        let (history, _) = broadcast::channel(32);
        Self {
            inner: Mutex::new(Inner {
                nodes,
                next_node: BODY + 1,
                location: location.into(),
                title: String::new(),
                observers: HashMap::new(),
                listeners: HashMap::new(),
                next_subscription: 1,
            }),
            history,
        }
    }

    pub fn with_title(self, title: impl Into<String>) -> Self {
        self.inner.lock().title = title.into();
        self
    }

    pub fn set_title(&self, title: impl Into<String>) {
        self.inner.lock().title = title.into();
    }

    /// SPA navigation: the URL changes and the app re-renders, but no
    /// navigation event fires. Observers of `<body>` see a child-list mutation.
    pub fn navigate(&self, location: impl Into<String>) {
        let mut inner = self.inner.lock();
        inner.location = location.into();
        inner.notify(BODY, MutationKind::ChildList);
    }

    /// Back/forward navigation: updates the URL and fires `popstate`.
    pub fn pop_state(&self, location: impl Into<String>) {
        let location = location.into();
        self.inner.lock().location = location.clone();
        let _ = self.history.send(location);
    }

    /// Append `element` to `parent`.
    pub fn append(&self, parent: NodeId, element: NewElement) -> Result<NodeId, DomError> {
        self.insert(parent, element, InsertPosition::Append)
    }

    /// Remove every child of `<body>`.
    pub fn clear_body(&self) {
        let children = self
            .inner
            .lock()
            .nodes
            .get(&BODY)
            .map(|b| b.children.clone())
            .unwrap_or_default();
        for child in children {
            self.remove(child);
        }
    }

    /// Dispatch an event to listeners registered on `target` or an ancestor.
    pub fn dispatch(&self, target: NodeId, event_type: &str) -> usize {
        let inner = self.inner.lock();
        let mut delivered = 0;
        for listener in inner.listeners.values() {
            if listener.event_type == event_type
                && inner.is_inclusive_ancestor(listener.target, target)
            {
                let event = DomEvent {
                    target,
                    event_type: event_type.to_string(),
                };
                if listener.tx.send(event).is_ok() {
                    delivered += 1;
                }
            }
        }
        delivered
    }

    /// Number of connected mutation observations.
    pub fn observer_count(&self) -> usize {
        self.inner.lock().observers.len()
    }

    /// Number of registered event listeners.
    pub fn listener_count(&self) -> usize {
        self.inner.lock().listeners.len()
    }
}

impl Document for MemoryDocument {
    fn location(&self) -> String {
        self.inner.lock().location.clone()
    }

    fn title(&self) -> String {
        self.inner.lock().title.clone()
    }

    fn body(&self) -> NodeId {
        BODY
    }

    fn query_all(&self, scope: Option<NodeId>, selector: &str) -> Vec<ElementSnapshot> {
        let selectors = match SelectorList::parse(selector) {
            Ok(s) => s,
            Err(e) => {
                warn!("Ignoring query: {}", e);
                return Vec::new();
            }
        };
        let inner = self.inner.lock();
        let mut candidates = Vec::new();
        match scope {
            Some(root) => inner.descendants(root, &mut candidates),
            None => {
                candidates.push(BODY);
                inner.descendants(BODY, &mut candidates);
            }
        }
        candidates
            .into_iter()
            .filter(|id| selectors.matches(&*inner, *id))
            .filter_map(|id| inner.snapshot(id))
            .collect()
    }

    fn element(&self, node: NodeId) -> Option<ElementSnapshot> {
        self.inner.lock().snapshot(node)
    }

    fn insert(
        &self,
        parent: NodeId,
        element: NewElement,
        position: InsertPosition,
    ) -> Result<NodeId, DomError> {
        let mut inner = self.inner.lock();
        inner.node(parent)?;

        let id = inner.next_node;
        inner.next_node += 1;

        let mut node = Node::new(element.tag.to_ascii_lowercase(), Some(parent));
        node.text = element.text;
        node.attributes = element.attributes.into_iter().collect();
        inner.nodes.insert(id, node);

        let parent_node = inner.node_mut(parent)?;
        match position {
            InsertPosition::Append => parent_node.children.push(id),
            InsertPosition::Prepend => parent_node.children.insert(0, id),
        }
        inner.notify(parent, MutationKind::ChildList);
        Ok(id)
    }

    fn remove(&self, node: NodeId) -> bool {
        if node == BODY {
            return false;
        }
        let mut inner = self.inner.lock();
        let Some(parent) = inner.parent_of(node) else {
            return false;
        };
        inner.notify(parent, MutationKind::ChildList);
        if let Some(p) = inner.nodes.get_mut(&parent) {
            p.children.retain(|c| *c != node);
        }
        inner.drop_subtree(node);
        true
    }

    fn set_attribute(&self, node: NodeId, name: &str, value: &str) -> Result<(), DomError> {
        let mut inner = self.inner.lock();
        let changed = {
            let n = inner.node_mut(node)?;
            n.attributes.insert(name.to_string(), value.to_string()).as_deref() != Some(value)
        };
        if changed {
            inner.notify(
                node,
                MutationKind::Attributes {
                    name: name.to_string(),
                },
            );
        }
        Ok(())
    }

    fn remove_attribute(&self, node: NodeId, name: &str) -> Result<(), DomError> {
        let mut inner = self.inner.lock();
        let removed = inner.node_mut(node)?.attributes.remove(name).is_some();
        if removed {
            inner.notify(
                node,
                MutationKind::Attributes {
                    name: name.to_string(),
                },
            );
        }
        Ok(())
    }

    fn set_text(&self, node: NodeId, text: &str) -> Result<(), DomError> {
        let mut inner = self.inner.lock();
        inner.node_mut(node)?.text = text.to_string();
        inner.notify(node, MutationKind::CharacterData);
        Ok(())
    }

    fn is_connected(&self, node: NodeId) -> bool {
        self.inner.lock().is_connected(node)
    }

    fn observe(
        &self,
        target: NodeId,
        options: ObserveOptions,
    ) -> Result<MutationSubscription, DomError> {
        let mut inner = self.inner.lock();
        inner.node(target)?;
        let (tx, rx) = mpsc::unbounded_channel();
        let id = inner.next_subscription;
        inner.next_subscription += 1;
        inner.observers.insert(
            id,
            Observer {
                target,
                options,
                tx,
            },
        );
        Ok(MutationSubscription { id, records: rx })
    }

    fn disconnect(&self, subscription_id: u64) {
        self.inner.lock().observers.remove(&subscription_id);
    }

    fn listen(&self, target: NodeId, event_type: &str) -> Result<EventSubscription, DomError> {
        let mut inner = self.inner.lock();
        inner.node(target)?;
        let (tx, rx) = mpsc::unbounded_channel();
        let id = inner.next_subscription;
        inner.next_subscription += 1;
        inner.listeners.insert(
            id,
            Listener {
                target,
                event_type: event_type.to_string(),
                tx,
            },
        );
        Ok(EventSubscription { id, events: rx })
    }

    fn unlisten(&self, subscription_id: u64) {
        self.inner.lock().listeners.remove(&subscription_id);
    }

    fn history(&self) -> broadcast::Receiver<String> {
        self.history.subscribe()
    }
}

#[cfg(test)]
#[path = "memory_tests.rs"]
mod tests;

//! Background side of the messaging channel.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tracing::{debug, info, warn};

use caselens_protocols::messaging::actions;
use caselens_protocols::{
    KeyValueStore, MessageTransport, MessagingError, RuntimeMessage, RuntimeResponse, StoreError,
    StoreScope,
};

/// Local-scope key of the saved-selection log.
pub const SAVED_SELECTIONS_KEY: &str = "savedSelections";

/// Maximum number of saved selections kept; the oldest are dropped.
const MAX_SAVED_SELECTIONS: usize = 50;

/// A registered context menu item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContextMenuEntry {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub contexts: Vec<String>,
}

/// Serves [`RuntimeMessage`]s against the extension's storage.
pub struct BackgroundRouter {
    store: Arc<dyn KeyValueStore>,
    context_menus: DashMap<String, ContextMenuEntry>,
}

impl BackgroundRouter {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self {
            store,
            context_menus: DashMap::new(),
        }
    }

    /// Handle one message. Failures become unsuccessful responses.
    pub async fn handle(&self, message: RuntimeMessage) -> RuntimeResponse {
        debug!("Background received '{}'", message.action);
        let result = match message.action.as_str() {
            actions::PING => Ok(Some(json!({ "pong": true }))),
            actions::GET_STORAGE => self.get_storage(&message).await,
            actions::SET_STORAGE => self.set_storage(&message).await,
            actions::REMOVE_STORAGE => self.remove_storage(&message).await,
            actions::SAVE_SELECTION => self.save_selection(&message).await,
            actions::CREATE_CONTEXT_MENU => self.create_context_menu(&message),
            other => Err(RouteError::UnknownAction(other.to_string())),
        };
        match result {
            Ok(data) => RuntimeResponse::ok(data),
            Err(e) => {
                warn!("Background failed '{}': {}", message.action, e);
                RuntimeResponse::failure(e.to_string())
            }
        }
    }

    /// Registered context menu entries, ordered by id.
    pub fn context_menus(&self) -> Vec<ContextMenuEntry> {
        let mut entries: Vec<_> = self.context_menus.iter().map(|e| e.value().clone()).collect();
        entries.sort_by(|a, b| a.id.cmp(&b.id));
        entries
    }

    fn scope(message: &RuntimeMessage) -> StoreScope {
        message
            .field("scope")
            .and_then(|v| serde_json::from_value(v.clone()).ok())
            .unwrap_or(StoreScope::Local)
    }

    fn keys(message: &RuntimeMessage) -> Option<Vec<String>> {
        if let Some(key) = message.str_field("key") {
            return Some(vec![key.to_string()]);
        }
        message.field("keys").and_then(|v| v.as_array()).map(|keys| {
            keys.iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect()
        })
    }

    async fn get_storage(&self, message: &RuntimeMessage) -> Result<Option<Value>, RouteError> {
        let scope = Self::scope(message);
        let items = match Self::keys(message) {
            Some(keys) => {
                let mut items = serde_json::Map::new();
                for key in keys {
                    if let Some(value) = self.store.get(scope, &key).await? {
                        items.insert(key, value);
                    }
                }
                items
            }
            None => self.store.get_all(scope).await?.into_iter().collect(),
        };
        Ok(Some(Value::Object(items)))
    }

    async fn set_storage(&self, message: &RuntimeMessage) -> Result<Option<Value>, RouteError> {
        let items = message
            .field("items")
            .and_then(Value::as_object)
            .ok_or_else(|| RouteError::BadRequest("setStorage needs an 'items' object".into()))?;
        let items: HashMap<String, Value> =
            items.iter().map(|(k, v)| (k.clone(), v.clone())).collect();
        self.store.set(Self::scope(message), items).await?;
        Ok(None)
    }

    async fn remove_storage(&self, message: &RuntimeMessage) -> Result<Option<Value>, RouteError> {
        let keys = Self::keys(message)
            .ok_or_else(|| RouteError::BadRequest("removeStorage needs 'key' or 'keys'".into()))?;
        self.store.remove(Self::scope(message), &keys).await?;
        Ok(None)
    }

    async fn save_selection(&self, message: &RuntimeMessage) -> Result<Option<Value>, RouteError> {
        let text = message
            .str_field("text")
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .ok_or_else(|| RouteError::BadRequest("saveSelection needs non-empty 'text'".into()))?;

        let mut saved: Vec<Value> = self
            .store
            .get(StoreScope::Local, SAVED_SELECTIONS_KEY)
            .await?
            .and_then(|v| serde_json::from_value(v).ok())
            .unwrap_or_default();
        saved.push(json!({
            "text": text,
            "url": message.str_field("url"),
            "savedAt": chrono::Utc::now().to_rfc3339(),
        }));
        if saved.len() > MAX_SAVED_SELECTIONS {
            let excess = saved.len() - MAX_SAVED_SELECTIONS;
            saved.drain(..excess);
        }
        let count = saved.len();
        self.store
            .set(
                StoreScope::Local,
                HashMap::from([(SAVED_SELECTIONS_KEY.to_string(), Value::Array(saved))]),
            )
            .await?;
        Ok(Some(json!({ "count": count })))
    }

    fn create_context_menu(&self, message: &RuntimeMessage) -> Result<Option<Value>, RouteError> {
        let entry: ContextMenuEntry =
            serde_json::from_value(Value::Object(message.payload.clone()))
                .map_err(|e| RouteError::BadRequest(format!("invalid context menu: {}", e)))?;
        info!("Registered context menu '{}'", entry.id);
        self.context_menus.insert(entry.id.clone(), entry);
        Ok(None)
    }
}

#[derive(Debug, thiserror::Error)]
enum RouteError {
    #[error("Unknown action: {0}")]
    UnknownAction(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// In-process [`MessageTransport`] delivering straight to a router. Can be
/// disconnected to simulate a sleeping background context.
pub struct LoopbackTransport {
    router: Arc<BackgroundRouter>,
    connected: AtomicBool,
}

impl LoopbackTransport {
    pub fn new(router: Arc<BackgroundRouter>) -> Self {
        Self {
            router,
            connected: AtomicBool::new(true),
        }
    }

    pub fn set_connected(&self, connected: bool) {
        self.connected.store(connected, Ordering::SeqCst);
    }
}

#[async_trait]
impl MessageTransport for LoopbackTransport {
    async fn send(&self, message: RuntimeMessage) -> Result<RuntimeResponse, MessagingError> {
        if !self.connected.load(Ordering::SeqCst) {
            return Err(MessagingError::ReceiverMissing(
                "background context not listening".to_string(),
            ));
        }
        Ok(self.router.handle(message).await)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    fn router() -> (Arc<MemoryStore>, BackgroundRouter) {
        let store = Arc::new(MemoryStore::new());
        (store.clone(), BackgroundRouter::new(store))
    }

    #[tokio::test]
    async fn test_ping() {
        let (_, router) = router();
        let response = router.handle(RuntimeMessage::new(actions::PING)).await;
        assert!(response.success);
        assert_eq!(response.data, Some(json!({"pong": true})));
    }

    #[tokio::test]
    async fn test_storage_round_trip() {
        let (_, router) = router();
        let set = RuntimeMessage::new(actions::SET_STORAGE)
            .with("scope", "sync")
            .with("items", json!({"theme": "dark", "count": 2}));
        assert!(router.handle(set).await.success);

        let get = RuntimeMessage::new(actions::GET_STORAGE)
            .with("scope", "sync")
            .with("key", "theme");
        let response = router.handle(get).await;
        assert_eq!(response.data, Some(json!({"theme": "dark"})));

        let remove = RuntimeMessage::new(actions::REMOVE_STORAGE)
            .with("scope", "sync")
            .with("keys", json!(["theme"]));
        assert!(router.handle(remove).await.success);

        let all = RuntimeMessage::new(actions::GET_STORAGE).with("scope", "sync");
        assert_eq!(router.handle(all).await.data, Some(json!({"count": 2})));
    }

    #[tokio::test]
    async fn test_save_selection_appends() {
        let (store, router) = router();
        for text in ["first", "second"] {
            let msg = RuntimeMessage::new(actions::SAVE_SELECTION).with("text", text);
            assert!(router.handle(msg).await.success);
        }
        let saved = store
            .get(StoreScope::Local, SAVED_SELECTIONS_KEY)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(saved.as_array().unwrap().len(), 2);
        assert_eq!(saved[1]["text"], "second");
    }

    #[tokio::test]
    async fn test_save_selection_rejects_blank() {
        let (_, router) = router();
        let msg = RuntimeMessage::new(actions::SAVE_SELECTION).with("text", "  ");
        let response = router.handle(msg).await;
        assert!(!response.success);
        assert!(response.error.unwrap().contains("text"));
    }

    #[tokio::test]
    async fn test_context_menu_registration_replaces_by_id() {
        let (_, router) = router();
        for title in ["Copy case", "Copy case number"] {
            let msg = RuntimeMessage::new(actions::CREATE_CONTEXT_MENU)
                .with("id", "caselens-copy")
                .with("title", title)
                .with("contexts", json!(["selection"]));
            assert!(router.handle(msg).await.success);
        }
        let menus = router.context_menus();
        assert_eq!(menus.len(), 1);
        assert_eq!(menus[0].title, "Copy case number");
    }

    #[tokio::test]
    async fn test_unknown_action() {
        let (_, router) = router();
        let response = router.handle(RuntimeMessage::new("launchRockets")).await;
        assert!(!response.success);
        assert!(response.error.unwrap().contains("launchRockets"));
    }

    #[tokio::test]
    async fn test_storage_failure_is_reported() {
        let (store, router) = router();
        store.set_failing(true);
        let response = router
            .handle(RuntimeMessage::new(actions::GET_STORAGE).with("key", "x"))
            .await;
        assert!(!response.success);
    }

    #[tokio::test]
    async fn test_loopback_disconnected() {
        let (_, router) = router();
        let transport = LoopbackTransport::new(Arc::new(router));
        transport.set_connected(false);
        let err = transport
            .send(RuntimeMessage::new(actions::PING))
            .await
            .unwrap_err();
        assert!(err.is_transient());
    }
}

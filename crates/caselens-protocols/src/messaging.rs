//! Content-script <-> background messaging protocol.
//!
//! Wire shape: `{ "action": string, ...payload } -> { "success": bool, "data"?, "error"? }`.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::MessagingError;

/// Actions understood by the background router.
pub mod actions {
    pub const PING: &str = "ping";
    pub const GET_STORAGE: &str = "getStorage";
    pub const SET_STORAGE: &str = "setStorage";
    pub const REMOVE_STORAGE: &str = "removeStorage";
    pub const SAVE_SELECTION: &str = "saveSelection";
    pub const CREATE_CONTEXT_MENU: &str = "createContextMenu";
}

/// Request sent to the background context.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuntimeMessage {
    /// Older senders use `message` instead of `action`.
    #[serde(alias = "message")]
    pub action: String,

    #[serde(flatten)]
    pub payload: Map<String, Value>,
}

impl RuntimeMessage {
    pub fn new(action: impl Into<String>) -> Self {
        Self {
            action: action.into(),
            payload: Map::new(),
        }
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.payload.insert(key.into(), value.into());
        self
    }

    pub fn field(&self, key: &str) -> Option<&Value> {
        self.payload.get(key)
    }

    pub fn str_field(&self, key: &str) -> Option<&str> {
        self.payload.get(key).and_then(Value::as_str)
    }
}

/// Response from the background context.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuntimeResponse {
    /// Older handlers answer with `status`.
    #[serde(alias = "status")]
    pub success: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl RuntimeResponse {
    pub fn ok(data: Option<Value>) -> Self {
        Self {
            success: true,
            data,
            error: None,
        }
    }

    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(error.into()),
        }
    }
}

/// Transport delivering a message to the background context.
#[async_trait]
pub trait MessageTransport: Send + Sync {
    async fn send(&self, message: RuntimeMessage) -> Result<RuntimeResponse, MessagingError>;
}

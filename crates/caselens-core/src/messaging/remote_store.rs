//! [`KeyValueStore`] backed by the background context's storage.

use std::collections::HashMap;

use async_trait::async_trait;
use serde_json::{Value, json};

use caselens_protocols::messaging::actions;
use caselens_protocols::store::entry_size;
use caselens_protocols::{KeyValueStore, MessagingError, RuntimeMessage, StoreError, StoreScope};

use super::MessagingClient;

/// Storage proxied through `getStorage` / `setStorage` / `removeStorage`
/// messages, for contexts that cannot reach browser storage directly.
pub struct RemoteStore {
    client: MessagingClient,
}

impl RemoteStore {
    pub fn new(client: MessagingClient) -> Self {
        Self { client }
    }

    async fn fetch(
        &self,
        scope: StoreScope,
        keys: Option<&[String]>,
    ) -> Result<HashMap<String, Value>, StoreError> {
        let mut message = RuntimeMessage::new(actions::GET_STORAGE).with("scope", scope.as_str());
        if let Some(keys) = keys {
            message = message.with("keys", json!(keys));
        }
        match self.client.request(message).await.map_err(unavailable)? {
            Some(Value::Object(items)) => Ok(items.into_iter().collect()),
            Some(other) => Err(StoreError::Backend(format!(
                "unexpected getStorage response: {}",
                other
            ))),
            None => Ok(HashMap::new()),
        }
    }
}

fn unavailable(e: MessagingError) -> StoreError {
    StoreError::Unavailable(e.to_string())
}

#[async_trait]
impl KeyValueStore for RemoteStore {
    async fn get(&self, scope: StoreScope, key: &str) -> Result<Option<Value>, StoreError> {
        let mut items = self.fetch(scope, Some(&[key.to_string()])).await?;
        Ok(items.remove(key))
    }

    async fn get_all(&self, scope: StoreScope) -> Result<HashMap<String, Value>, StoreError> {
        self.fetch(scope, None).await
    }

    async fn set(&self, scope: StoreScope, items: HashMap<String, Value>) -> Result<(), StoreError> {
        let message = RuntimeMessage::new(actions::SET_STORAGE)
            .with("scope", scope.as_str())
            .with("items", json!(items));
        self.client.request(message).await.map_err(unavailable)?;
        Ok(())
    }

    async fn remove(&self, scope: StoreScope, keys: &[String]) -> Result<(), StoreError> {
        if keys.is_empty() {
            return Ok(());
        }
        let message = RuntimeMessage::new(actions::REMOVE_STORAGE)
            .with("scope", scope.as_str())
            .with("keys", json!(keys));
        self.client.request(message).await.map_err(unavailable)?;
        Ok(())
    }

    async fn clear(&self, scope: StoreScope) -> Result<(), StoreError> {
        let keys: Vec<String> = self.get_all(scope).await?.into_keys().collect();
        self.remove(scope, &keys).await
    }

    async fn bytes_in_use(&self, scope: StoreScope) -> Result<u64, StoreError> {
        Ok(self
            .get_all(scope)
            .await?
            .iter()
            .map(|(k, v)| entry_size(k, v))
            .sum())
    }

    fn quota_bytes(&self, _scope: StoreScope) -> Option<u64> {
        None
    }
}

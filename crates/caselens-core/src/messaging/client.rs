//! Request client with retry.

use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, warn};

use caselens_config::MessagingConfig;
use caselens_protocols::{MessageTransport, MessagingError, RuntimeMessage, RuntimeResponse};

/// Sends [`RuntimeMessage`]s to the background context.
///
/// Transient failures ("receiving end does not exist", timeouts) are retried
/// with exponential backoff up to `max_retries` times.
#[derive(Clone)]
pub struct MessagingClient {
    transport: Arc<dyn MessageTransport>,
    config: MessagingConfig,
}

impl MessagingClient {
    pub fn new(transport: Arc<dyn MessageTransport>, config: MessagingConfig) -> Self {
        Self { transport, config }
    }

    /// Send a message, retrying transient failures.
    pub async fn send(&self, message: RuntimeMessage) -> Result<RuntimeResponse, MessagingError> {
        let mut attempt = 0;
        loop {
            match self.transport.send(message.clone()).await {
                Ok(response) => return Ok(response),
                Err(e) if e.is_transient() && attempt < self.config.max_retries => {
                    let delay = self.config.backoff(attempt);
                    debug!(
                        "Message '{}' failed ({}), retry {} in {:?}",
                        message.action,
                        e,
                        attempt + 1,
                        delay
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Send a message and return its `data`, treating an unsuccessful
    /// response as [`MessagingError::Rejected`].
    pub async fn request(&self, message: RuntimeMessage) -> Result<Option<Value>, MessagingError> {
        let response = self.send(message).await?;
        if response.success {
            Ok(response.data)
        } else {
            Err(MessagingError::Rejected(
                response.error.unwrap_or_else(|| "no reason given".to_string()),
            ))
        }
    }

    /// Like [`MessagingClient::request`] but deserializes the data and falls
    /// back to `T::default()` on any failure.
    pub async fn send_or_default<T>(&self, message: RuntimeMessage) -> T
    where
        T: DeserializeOwned + Default,
    {
        let action = message.action.clone();
        match self.request(message).await {
            Ok(Some(data)) => serde_json::from_value(data).unwrap_or_else(|e| {
                warn!("Unexpected response to '{}': {}", action, e);
                T::default()
            }),
            Ok(None) => T::default(),
            Err(e) => {
                warn!("Message '{}' failed, using default: {}", action, e);
                T::default()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use caselens_protocols::messaging::actions;
    use serde_json::json;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;

    /// Fails with `ReceiverMissing` for the first `failures` calls.
    struct FlakyTransport {
        failures: u32,
        calls: AtomicU32,
        response: RuntimeResponse,
    }

    impl FlakyTransport {
        fn new(failures: u32, response: RuntimeResponse) -> Arc<Self> {
            Arc::new(Self {
                failures,
                calls: AtomicU32::new(0),
                response,
            })
        }
    }

    #[async_trait]
    impl MessageTransport for FlakyTransport {
        async fn send(&self, _message: RuntimeMessage) -> Result<RuntimeResponse, MessagingError> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            if n < self.failures {
                Err(MessagingError::ReceiverMissing("background".to_string()))
            } else {
                Ok(self.response.clone())
            }
        }
    }

    fn config() -> MessagingConfig {
        MessagingConfig {
            max_retries: 3,
            initial_backoff_ms: 100,
            backoff_multiplier: 2.0,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_retries_until_receiver_ready() {
        let transport = FlakyTransport::new(2, RuntimeResponse::ok(Some(json!({"pong": true}))));
        let client = MessagingClient::new(transport.clone(), config());

        let started = tokio::time::Instant::now();
        let data = client.request(RuntimeMessage::new(actions::PING)).await.unwrap();
        assert_eq!(data, Some(json!({"pong": true})));
        assert_eq!(transport.calls.load(Ordering::SeqCst), 3);
        // 100ms + 200ms of backoff.
        assert_eq!(started.elapsed(), Duration::from_millis(300));
    }

    #[tokio::test(start_paused = true)]
    async fn test_gives_up_after_max_retries() {
        let transport = FlakyTransport::new(10, RuntimeResponse::ok(None));
        let client = MessagingClient::new(transport.clone(), config());

        let err = client.send(RuntimeMessage::new(actions::PING)).await.unwrap_err();
        assert!(matches!(err, MessagingError::ReceiverMissing(_)));
        assert_eq!(transport.calls.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn test_unsuccessful_response_is_rejected() {
        let transport = FlakyTransport::new(0, RuntimeResponse::failure("quota"));
        let client = MessagingClient::new(transport, config());
        let err = client
            .request(RuntimeMessage::new(actions::SET_STORAGE))
            .await
            .unwrap_err();
        assert!(matches!(err, MessagingError::Rejected(reason) if reason == "quota"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_send_or_default() {
        let transport = FlakyTransport::new(10, RuntimeResponse::ok(None));
        let client = MessagingClient::new(transport, config());
        let value: Vec<String> = client
            .send_or_default(RuntimeMessage::new(actions::GET_STORAGE))
            .await;
        assert!(value.is_empty());

        let transport = FlakyTransport::new(0, RuntimeResponse::ok(Some(json!(["a", "b"]))));
        let client = MessagingClient::new(transport, config());
        let value: Vec<String> = client
            .send_or_default(RuntimeMessage::new(actions::GET_STORAGE))
            .await;
        assert_eq!(value, vec!["a", "b"]);
    }
}

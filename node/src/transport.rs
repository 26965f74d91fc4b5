//! The outbound half of the transport boundary: delivers a [`Message`] to a
//! peer's `/webdir` endpoint over HTTP and parses its reply.

use async_trait::async_trait;
use webdir_core::{Message, Transport, TransportError};

#[derive(Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    pub fn new() -> Self {
        HttpTransport {
            client: reqwest::Client::new(),
        }
    }
}

impl Default for HttpTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send(&self, addr: &str, msg: Message) -> Result<Message, TransportError> {
        let url = format!("http://{addr}/webdir");
        let response = self
            .client
            .post(&url)
            .json(&msg)
            .send()
            .await
            .map_err(classify)?;

        response.json::<Message>().await.map_err(|e| TransportError::Other(e.to_string()))
    }
}

/// Distinguishes the "peer is gone" shapes the pinger acts on (DNS failure,
/// connection refused, invalid address) from everything else reqwest can
/// return (timeouts, TLS errors, non-2xx bodies), which are logged but not
/// treated as eviction evidence.
fn classify(err: reqwest::Error) -> TransportError {
    if err.is_connect() {
        return TransportError::ConnectionRefused(err.to_string());
    }
    if err.is_builder() || err.is_request() {
        return TransportError::UnreachableAddress(err.to_string());
    }
    TransportError::Other(err.to_string())
}

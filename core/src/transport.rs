//! The transport boundary: the core never opens sockets itself. A host
//! implements [`Transport`] (e.g. over HTTP with `reqwest`) and injects it
//! at node construction, breaking the node/transport cyclic reference
//! (§9 Design notes: the transport calls into the dispatcher, the
//! dispatcher calls out via the transport).

use async_trait::async_trait;
use thiserror::Error;

use crate::message::Message;

#[derive(Debug, Error, Clone)]
pub enum TransportError {
    #[error("address could not be parsed or resolved: {0}")]
    UnreachableAddress(String),
    #[error("connection refused by {0}")]
    ConnectionRefused(String),
    #[error("transport error: {0}")]
    Other(String),
}

impl TransportError {
    /// Matches the "unreachable" shapes §4.6 calls out: malformed address,
    /// DNS not-found, connection refused, or an unknown-network/invalid
    /// address condition. Any other transport error (timeouts, 5xx) is not
    /// considered evidence of eviction.
    pub fn looks_unreachable(&self) -> bool {
        matches!(
            self,
            TransportError::UnreachableAddress(_) | TransportError::ConnectionRefused(_)
        )
    }
}

/// One request/response exchange with a peer addressed by its reachable
/// endpoint string. Implementations deliver exactly one [`Message`] and
/// return exactly one reply.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, addr: &str, msg: Message) -> Result<Message, TransportError>;
}

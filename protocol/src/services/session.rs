//! Point-to-point flow sessions.
//!
//! A session is an ordered, reliable byte pipe between two parties, opened
//! for one named flow protocol. The transport knows nothing about message
//! types; encoding is the flow layer's business.

use crate::ledger::Party;
use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("no message from {counterparty} within {timeout_ms}ms")]
    Timeout { counterparty: String, timeout_ms: u64 },

    /// The other side hung up.
    #[error("session with {counterparty} closed")]
    Closed { counterparty: String },

    /// A payload could not be encoded or decoded.
    #[error("codec error: {0}")]
    Codec(String),

    /// No node with that identity is reachable.
    #[error("unknown party {0}")]
    UnknownParty(String),

    /// The counterparty runs no responder for the requested protocol.
    #[error("{counterparty} does not respond to {protocol}")]
    UnsupportedProtocol {
        counterparty: String,
        protocol: String,
    },
}

#[async_trait]
pub trait Session: Send + Sync {
    fn counterparty(&self) -> &Party;

    async fn send(&mut self, payload: Vec<u8>) -> Result<(), SessionError>;

    /// Waits up to `timeout` for the next payload.
    async fn receive(&mut self, timeout: Duration) -> Result<Vec<u8>, SessionError>;
}

#[async_trait]
pub trait SessionTransport: Send + Sync + 'static {
    /// Opens a session from `from` to `to`, starting the responder registered
    /// for `protocol` on the other side.
    async fn open(
        &self,
        from: &Party,
        to: &Party,
        protocol: &str,
    ) -> Result<Box<dyn Session>, SessionError>;
}

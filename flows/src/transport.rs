//! # In-Process Session Transport
//!
//! Point-to-point, ordered, reliable sessions between parties in the same
//! process. Each session is a pair of bounded tokio channels; opening one
//! hands the far end to the counterparty's inbox, tagged with the protocol
//! name so its dispatcher knows which responder to run.

use async_trait::async_trait;
use dashmap::DashMap;
use obligation_protocol::config::SESSION_CHANNEL_CAPACITY;
use obligation_protocol::crypto::PublicKey;
use obligation_protocol::ledger::Party;
use obligation_protocol::services::{Session, SessionError, SessionTransport};
use std::collections::BTreeSet;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::debug;

/// One end of an in-process session.
pub struct ChannelSession {
    counterparty: Party,
    outbound: mpsc::Sender<Vec<u8>>,
    inbound: mpsc::Receiver<Vec<u8>>,
}

/// Two connected ends. The first belongs to `a` and talks to `b`.
pub fn session_pair(a: &Party, b: &Party) -> (ChannelSession, ChannelSession) {
    let (a_to_b, from_a) = mpsc::channel(SESSION_CHANNEL_CAPACITY);
    let (b_to_a, from_b) = mpsc::channel(SESSION_CHANNEL_CAPACITY);
    (
        ChannelSession {
            counterparty: b.clone(),
            outbound: a_to_b,
            inbound: from_b,
        },
        ChannelSession {
            counterparty: a.clone(),
            outbound: b_to_a,
            inbound: from_a,
        },
    )
}

#[async_trait]
impl Session for ChannelSession {
    fn counterparty(&self) -> &Party {
        &self.counterparty
    }

    async fn send(&mut self, payload: Vec<u8>) -> Result<(), SessionError> {
        self.outbound
            .send(payload)
            .await
            .map_err(|_| SessionError::Closed {
                counterparty: self.counterparty.name.clone(),
            })
    }

    async fn receive(&mut self, timeout: Duration) -> Result<Vec<u8>, SessionError> {
        match tokio::time::timeout(timeout, self.inbound.recv()).await {
            Ok(Some(payload)) => Ok(payload),
            Ok(None) => Err(SessionError::Closed {
                counterparty: self.counterparty.name.clone(),
            }),
            Err(_) => Err(SessionError::Timeout {
                counterparty: self.counterparty.name.clone(),
                timeout_ms: timeout.as_millis() as u64,
            }),
        }
    }
}

/// A session arriving at a node, not yet claimed by a responder.
pub struct IncomingSession {
    pub protocol: String,
    pub session: Box<dyn Session>,
}

struct Endpoint {
    inbox: mpsc::Sender<IncomingSession>,
    protocols: BTreeSet<String>,
}

/// Routes newly opened sessions to the inbox of the target party.
#[derive(Default)]
pub struct InMemoryTransport {
    endpoints: DashMap<PublicKey, Endpoint>,
}

impl InMemoryTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes `party` reachable for the given protocols and returns its inbox.
    /// Registering again replaces the previous inbox.
    pub fn register<'a>(
        &self,
        party: &Party,
        protocols: impl IntoIterator<Item = &'a str>,
    ) -> mpsc::Receiver<IncomingSession> {
        let (inbox, incoming) = mpsc::channel(SESSION_CHANNEL_CAPACITY);
        self.endpoints.insert(
            party.owning_key,
            Endpoint {
                inbox,
                protocols: protocols.into_iter().map(str::to_owned).collect(),
            },
        );
        incoming
    }
}

#[async_trait]
impl SessionTransport for InMemoryTransport {
    async fn open(
        &self,
        from: &Party,
        to: &Party,
        protocol: &str,
    ) -> Result<Box<dyn Session>, SessionError> {
        let inbox = {
            let endpoint = self
                .endpoints
                .get(&to.owning_key)
                .ok_or_else(|| SessionError::UnknownParty(to.name.clone()))?;
            if !endpoint.protocols.contains(protocol) {
                return Err(SessionError::UnsupportedProtocol {
                    counterparty: to.name.clone(),
                    protocol: protocol.to_owned(),
                });
            }
            endpoint.inbox.clone()
        };

        let (ours, theirs) = session_pair(from, to);
        inbox
            .send(IncomingSession {
                protocol: protocol.to_owned(),
                session: Box::new(theirs),
            })
            .await
            .map_err(|_| SessionError::Closed {
                counterparty: to.name.clone(),
            })?;
        debug!(from = %from, to = %to, protocol, "session opened");
        Ok(Box::new(ours))
    }
}

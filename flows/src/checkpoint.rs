//! # Flow State & Checkpoints
//!
//! Both roles are explicit state machines. Their states are plain serde
//! enums, so a responder's progress at a suspension point can be written out
//! as a [`FlowCheckpoint`] and picked up again after a restart.
//!
//! ```text
//! Initiator: Init -> Resolve -> Build -> Sign -> Collect -> Finalize -> Done
//!                  \_________________________________________________/
//!                                         |
//!                                     Aborted(reason)
//!
//! Responder: AwaitProposal -> Verify -> Sign -> AwaitCommit -> Done
//!                          \__________________________________/
//!                                          |
//!                                  Rejected(reason)
//! ```

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use obligation_protocol::crypto::SecureHash;
use obligation_protocol::ledger::Party;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum InitiatorState {
    Init,
    Resolve,
    Build,
    Sign,
    Collect { tx_id: SecureHash },
    Finalize { tx_id: SecureHash },
    Done { tx_id: SecureHash },
    Aborted { reason: String },
}

impl InitiatorState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, InitiatorState::Done { .. } | InitiatorState::Aborted { .. })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ResponderState {
    AwaitProposal,
    Verify { tx_id: SecureHash },
    Sign { tx_id: SecureHash },
    AwaitCommit { tx_id: SecureHash },
    Done { tx_id: SecureHash },
    Rejected { reason: String },
}

impl ResponderState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, ResponderState::Done { .. } | ResponderState::Rejected { .. })
    }
}

impl fmt::Display for ResponderState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResponderState::AwaitProposal => write!(f, "AwaitProposal"),
            ResponderState::Verify { tx_id } => write!(f, "Verify({tx_id})"),
            ResponderState::Sign { tx_id } => write!(f, "Sign({tx_id})"),
            ResponderState::AwaitCommit { tx_id } => write!(f, "AwaitCommit({tx_id})"),
            ResponderState::Done { tx_id } => write!(f, "Done({tx_id})"),
            ResponderState::Rejected { reason } => write!(f, "Rejected({reason})"),
        }
    }
}

/// A responder's progress at a suspension point.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlowCheckpoint {
    pub flow_id: Uuid,
    pub counterparty: Party,
    pub state: ResponderState,
    pub written_at: DateTime<Utc>,
}

impl FlowCheckpoint {
    pub fn new(flow_id: Uuid, counterparty: Party, state: ResponderState) -> Self {
        Self {
            flow_id,
            counterparty,
            state,
            written_at: Utc::now(),
        }
    }
}

#[derive(Debug, Error)]
pub enum CheckpointError {
    #[error("checkpoint encoding failed: {0}")]
    Encoding(#[from] bincode::Error),
}

/// Durable home for responder checkpoints. Written at every suspension
/// point, removed when the flow reaches a terminal state.
pub trait CheckpointStore: Send + Sync {
    fn save(&self, checkpoint: &FlowCheckpoint) -> Result<(), CheckpointError>;

    fn load(&self, flow_id: &Uuid) -> Result<Option<FlowCheckpoint>, CheckpointError>;

    fn remove(&self, flow_id: &Uuid);

    fn all(&self) -> Result<Vec<FlowCheckpoint>, CheckpointError>;
}

/// Keeps checkpoints as encoded bytes, the same form a disk store would.
#[derive(Debug, Default)]
pub struct InMemoryCheckpointStore {
    entries: DashMap<Uuid, Vec<u8>>,
}

impl InMemoryCheckpointStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl CheckpointStore for InMemoryCheckpointStore {
    fn save(&self, checkpoint: &FlowCheckpoint) -> Result<(), CheckpointError> {
        let bytes = bincode::serialize(checkpoint)?;
        self.entries.insert(checkpoint.flow_id, bytes);
        Ok(())
    }

    fn load(&self, flow_id: &Uuid) -> Result<Option<FlowCheckpoint>, CheckpointError> {
        match self.entries.get(flow_id) {
            Some(bytes) => Ok(Some(bincode::deserialize(bytes.value())?)),
            None => Ok(None),
        }
    }

    fn remove(&self, flow_id: &Uuid) {
        self.entries.remove(flow_id);
    }

    fn all(&self) -> Result<Vec<FlowCheckpoint>, CheckpointError> {
        self.entries
            .iter()
            .map(|e| bincode::deserialize(e.value()).map_err(CheckpointError::from))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use obligation_protocol::crypto::{sha256, KeyPair};

    #[test]
    fn save_load_remove() {
        let store = InMemoryCheckpointStore::new();
        let flow_id = Uuid::new_v4();
        let cp = FlowCheckpoint::new(
            flow_id,
            Party::new("Lender", KeyPair::generate().public_key()),
            ResponderState::AwaitCommit {
                tx_id: sha256(b"tx"),
            },
        );
        store.save(&cp).unwrap();
        assert_eq!(store.load(&flow_id).unwrap(), Some(cp.clone()));
        assert_eq!(store.all().unwrap(), vec![cp]);

        store.remove(&flow_id);
        assert!(store.load(&flow_id).unwrap().is_none());
        assert!(store.all().unwrap().is_empty());
    }

    #[test]
    fn terminal_states() {
        assert!(!ResponderState::AwaitProposal.is_terminal());
        assert!(ResponderState::Rejected { reason: "x".into() }.is_terminal());
        assert!(InitiatorState::Done {
            tx_id: sha256(b"t")
        }
        .is_terminal());
        assert!(!InitiatorState::Collect {
            tx_id: sha256(b"t")
        }
        .is_terminal());
    }
}

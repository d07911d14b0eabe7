//! # Obligation Flows
//!
//! The multi-party protocol that turns a request (issue, transfer, settle)
//! into a transaction every participant has signed, the notary has ordered,
//! and every participant has recorded.
//!
//! ## Architecture
//!
//! - **initiator**: state machine run by the party that starts a flow.
//! - **responder**: state machine run for every incoming session.
//! - **confidential**: swap of freshly certified keys for anonymous flows.
//! - **message / transport**: the wire messages and an in-process transport.
//! - **checkpoint**: serialisable responder state and its store.
//! - **node**: a [`FlowNode`] per party and a [`SimulatedNetwork`] to host them.
//!
//! ## Guarantees
//!
//! 1. Nothing is signed that has not passed the contracts on the signing node.
//! 2. No node records a transaction before the notary has signed it.
//! 3. An initiator that fails before notarisation tells every counterparty.

pub mod cash_issue;
pub mod checkpoint;
pub mod confidential;
pub mod error;
pub mod hub;
pub mod initiator;
pub mod message;
pub mod node;
pub mod responder;
pub(crate) mod sessions;
pub mod transport;

pub use cash_issue::self_issue_cash;
pub use checkpoint::{
    CheckpointError, CheckpointStore, FlowCheckpoint, InMemoryCheckpointStore, InitiatorState,
    ResponderState,
};
pub use confidential::ConfidentialIdentities;
pub use error::{ErrorCategory, FlowError};
pub use hub::ServiceHub;
pub use initiator::{Initiator, ObligationRequest};
pub use message::FlowMessage;
pub use node::{FlowNode, SimulatedNetwork};
pub use responder::Responder;
pub use transport::{session_pair, ChannelSession, InMemoryTransport, IncomingSession};

/// Protocol name under which obligation sessions are opened.
pub const OBLIGATION_PROTOCOL: &str = "obligation-flows/obligation";

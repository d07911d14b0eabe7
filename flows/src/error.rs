//! Flow failures, grouped into the five categories callers branch on.
//!
//! No flow error is retried automatically. A retry must build a fresh
//! proposal from freshly read vault state, so the decision belongs to the
//! caller.

use crate::checkpoint::CheckpointError;
use obligation_contracts::{ContractError, RuleViolation};
use obligation_protocol::crypto::{PublicKey, SecureHash};
use obligation_protocol::identity::IdentityError;
use obligation_protocol::ledger::{Amount, AmountError, Currency, StateRef, UniqueIdentifier};
use obligation_protocol::services::{CashError, NotaryError, SessionError, StoreError};
use obligation_protocol::transaction::TransactionError;
use serde::Serialize;
use std::fmt;
use thiserror::Error;

/// Coarse classification of a [`FlowError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    /// A contract rule was broken. Fatal to this transaction.
    RuleViolation,
    /// The wrong party started the flow.
    Authorization,
    /// Something the flow needs is missing: notary, record, funds, identity.
    Resource,
    /// A counterparty declined, went silent, or misbehaved.
    Coordination,
    /// The notary saw a competing spend of the same inputs.
    OrderingConflict,
}

impl ErrorCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCategory::RuleViolation => "rule_violation",
            ErrorCategory::Authorization => "authorization",
            ErrorCategory::Resource => "resource",
            ErrorCategory::Coordination => "coordination",
            ErrorCategory::OrderingConflict => "ordering_conflict",
        }
    }
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error)]
pub enum FlowError {
    // -- Rule violations ----------------------------------------------------
    /// Rejected by a pre-check before any transaction was built.
    #[error("rule violation: {0}")]
    RuleViolation(#[from] RuleViolation),

    /// The proposal failed contract verification on this node.
    #[error("local verification failed: {0}")]
    LocalVerificationFailed(ContractError),

    #[error("amount error: {0}")]
    Amount(#[from] AmountError),

    // -- Authorization ------------------------------------------------------
    #[error("only the {role} may start this flow and {initiator} is not the {role}")]
    NotAuthorized { role: &'static str, initiator: String },

    /// The proposal would have one of our keys sign for more than its part
    /// in the obligation, e.g. spending our own cash.
    #[error("{counterparty} asked {key} to sign for more than its part in the obligation")]
    UnconsentedSignature { counterparty: String, key: PublicKey },

    // -- Resources ----------------------------------------------------------
    #[error("no notary available")]
    NoNotaryAvailable,

    #[error("no unconsumed obligation with id {0}")]
    RecordNotFound(UniqueIdentifier),

    #[error("no {currency} cash to settle with")]
    NoFunds { currency: Currency },

    #[error("only {available} available but {requested} needed")]
    InsufficientFunds { requested: Amount, available: Amount },

    #[error("identity: {0}")]
    Identity(#[from] IdentityError),

    #[error("state store: {0}")]
    Store(#[from] StoreError),

    #[error("checkpoint: {0}")]
    Checkpoint(#[from] CheckpointError),

    // -- Coordination -------------------------------------------------------
    #[error("{counterparty} declined: {reason}")]
    CounterpartyRejected { counterparty: String, reason: String },

    #[error("{counterparty} aborted the flow: {reason}")]
    CounterpartyAborted { counterparty: String, reason: String },

    #[error("session with {counterparty} failed: {source}")]
    SessionFailure {
        counterparty: String,
        #[source]
        source: SessionError,
    },

    #[error("{counterparty} sent {received} while {expected} was expected")]
    ProtocolViolation {
        counterparty: String,
        expected: &'static str,
        received: &'static str,
    },

    #[error("identity exchange with {counterparty} timed out after {timeout_ms}ms")]
    IdentityExchangeTimeout { counterparty: String, timeout_ms: u64 },

    #[error("certificate from {counterparty} rejected: {reason}")]
    IdentityVerificationFailed { counterparty: String, reason: String },

    #[error("finalized transaction {tx_id} not received within {timeout_ms}ms")]
    CommitTimeout { tx_id: SecureHash, timeout_ms: u64 },

    #[error("transaction: {0}")]
    Transaction(#[from] TransactionError),

    #[error("notary: {0}")]
    Notary(NotaryError),

    /// The proposal needs no signature from any key this node holds.
    #[error("nothing to sign in {tx_id}")]
    NothingToSign { tx_id: SecureHash },

    #[error("checkpoint in state {state} cannot be resumed")]
    CheckpointNotResumable { state: String },

    // -- Ordering -----------------------------------------------------------
    /// Another transaction already consumed some of our inputs. Fatal for
    /// this proposal: re-read the vault and build a new one.
    #[error("double spend: {consumed:?} already consumed by {competing_tx}")]
    DoubleSpendRejected {
        consumed: Vec<StateRef>,
        competing_tx: SecureHash,
    },
}

impl FlowError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            FlowError::RuleViolation(_)
            | FlowError::LocalVerificationFailed(_)
            | FlowError::Amount(_) => ErrorCategory::RuleViolation,
            FlowError::NotAuthorized { .. } | FlowError::UnconsentedSignature { .. } => {
                ErrorCategory::Authorization
            }
            FlowError::NoNotaryAvailable
            | FlowError::RecordNotFound(_)
            | FlowError::NoFunds { .. }
            | FlowError::InsufficientFunds { .. }
            | FlowError::Identity(_)
            | FlowError::Store(_)
            | FlowError::Checkpoint(_) => ErrorCategory::Resource,
            FlowError::CounterpartyRejected { .. }
            | FlowError::CounterpartyAborted { .. }
            | FlowError::SessionFailure { .. }
            | FlowError::ProtocolViolation { .. }
            | FlowError::IdentityExchangeTimeout { .. }
            | FlowError::IdentityVerificationFailed { .. }
            | FlowError::CommitTimeout { .. }
            | FlowError::Transaction(_)
            | FlowError::Notary(_)
            | FlowError::NothingToSign { .. }
            | FlowError::CheckpointNotResumable { .. } => ErrorCategory::Coordination,
            FlowError::DoubleSpendRejected { .. } => ErrorCategory::OrderingConflict,
        }
    }

    pub(crate) fn session(counterparty: &impl fmt::Display, source: SessionError) -> Self {
        FlowError::SessionFailure {
            counterparty: counterparty.to_string(),
            source,
        }
    }
}

impl From<CashError> for FlowError {
    fn from(e: CashError) -> Self {
        match e {
            CashError::NoFunds { currency } => FlowError::NoFunds { currency },
            CashError::InsufficientFunds {
                requested,
                available,
            } => FlowError::InsufficientFunds {
                requested,
                available,
            },
            CashError::Store(e) => FlowError::Store(e),
            CashError::Amount(e) => FlowError::Amount(e),
        }
    }
}

impl From<NotaryError> for FlowError {
    fn from(e: NotaryError) -> Self {
        match e {
            NotaryError::Conflict {
                consumed,
                competing_tx,
            } => FlowError::DoubleSpendRejected {
                consumed,
                competing_tx,
            },
            other => FlowError::Notary(other),
        }
    }
}

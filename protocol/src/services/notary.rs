//! # Notary
//!
//! The single ordering authority of the ledger. A notary signs a transaction
//! only if none of its inputs has been consumed by a *different* transaction
//! it signed before, and only while the transaction's time window is open.
//!
//! The commit log is a single-writer map from input ref to the consuming
//! transaction id, guarded by one mutex: the check and the write of all
//! inputs of one transaction happen atomically. Re-notarising the very same
//! transaction is idempotent and returns a fresh signature.

use crate::crypto::{KeyPair, SecureHash};
use crate::ledger::{Party, StateRef};
use crate::transaction::{SignedTransaction, TimeWindow, TransactionError, TransactionSignature};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use std::collections::{BTreeSet, HashMap};
use thiserror::Error;
use tracing::{debug, info, warn};

#[derive(Debug, Error)]
pub enum NotaryError {
    /// Inputs already consumed by another transaction.
    #[error("double spend: inputs {consumed:?} already consumed by {competing_tx}")]
    Conflict {
        consumed: Vec<StateRef>,
        competing_tx: SecureHash,
    },

    /// The notary's clock falls outside the transaction's time window.
    #[error("time window {window} does not contain notary time {now}")]
    TimeWindowInvalid {
        window: TimeWindow,
        now: DateTime<Utc>,
    },

    /// Participant signatures are missing or invalid.
    #[error("invalid signatures: {0}")]
    InvalidSignatures(#[from] TransactionError),

    /// The transaction names a different notary.
    #[error("transaction is assigned to notary {expected:?}, not {actual}")]
    WrongNotary {
        expected: Option<String>,
        actual: String,
    },
}

#[async_trait]
pub trait NotaryService: Send + Sync + 'static {
    fn identity(&self) -> &Party;

    /// Checks uniqueness and the time window; on success returns the
    /// notary's signature, timestamped with its clock.
    async fn notarise(&self, stx: &SignedTransaction) -> Result<TransactionSignature, NotaryError>;
}

/// A validating-by-signature, in-memory uniqueness notary.
#[derive(Debug)]
pub struct InMemoryNotary {
    identity: Party,
    keys: KeyPair,
    committed: Mutex<HashMap<StateRef, SecureHash>>,
}

impl InMemoryNotary {
    pub fn new(name: impl Into<String>) -> Self {
        let keys = KeyPair::generate();
        Self {
            identity: Party::new(name, keys.public_key()),
            keys,
            committed: Mutex::new(HashMap::new()),
        }
    }

    /// Number of input refs in the commit log.
    pub fn committed_inputs(&self) -> usize {
        self.committed.lock().len()
    }

    fn commit(&self, tx_id: SecureHash, inputs: &[StateRef]) -> Result<(), NotaryError> {
        let mut log = self.committed.lock();
        let mut consumed = Vec::new();
        let mut competing_tx = None;
        for input in inputs {
            if let Some(prior) = log.get(input) {
                if *prior != tx_id {
                    consumed.push(*input);
                    competing_tx.get_or_insert(*prior);
                }
            }
        }
        if let Some(competing_tx) = competing_tx {
            return Err(NotaryError::Conflict {
                consumed,
                competing_tx,
            });
        }
        for input in inputs {
            log.insert(*input, tx_id);
        }
        Ok(())
    }
}

#[async_trait]
impl NotaryService for InMemoryNotary {
    fn identity(&self) -> &Party {
        &self.identity
    }

    async fn notarise(&self, stx: &SignedTransaction) -> Result<TransactionSignature, NotaryError> {
        let tx_id = stx.id();
        if stx.tx.notary() != Some(&self.identity) {
            return Err(NotaryError::WrongNotary {
                expected: stx.tx.notary().map(|n| n.name.clone()),
                actual: self.identity.name.clone(),
            });
        }

        let me: BTreeSet<_> = [self.identity.owning_key].into_iter().collect();
        stx.verify_signatures_except(&me)?;

        if let Some(window) = stx.tx.time_window() {
            let now = Utc::now();
            if !window.contains(now) {
                warn!(tx_id = %tx_id, window = %window, "time window rejected");
                return Err(NotaryError::TimeWindowInvalid {
                    window: *window,
                    now,
                });
            }
        }

        let inputs = stx.tx.input_refs();
        if let Err(e) = self.commit(tx_id, &inputs) {
            warn!(tx_id = %tx_id, error = %e, "notarisation conflict");
            return Err(e);
        }

        debug!(tx_id = %tx_id, inputs = inputs.len(), "inputs committed");
        info!(tx_id = %tx_id, notary = %self.identity, "transaction notarised");
        Ok(TransactionSignature::create(&self.keys, tx_id))
    }
}

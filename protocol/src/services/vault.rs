//! The state store ("vault"): finalized transactions and the unconsumed
//! states this node cares about.
//!
//! Write discipline: a transaction is recorded at most once. Recording the
//! same finalized transaction again is a no-op that reports `false`. The
//! vault never arbitrates between two transactions spending the same input;
//! that is the notary's job.

use crate::crypto::SecureHash;
use crate::identity::KeyManagementService;
use crate::ledger::{LedgerState, StateAndRef, StateRef, UniqueIdentifier};
use crate::transaction::{SignedTransaction, TransactionError};
use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum StoreError {
    /// The transaction offered for recording is not fully and validly signed.
    #[error("refusing to record transaction: {0}")]
    Transaction(#[from] TransactionError),

    /// The backing store cannot be reached.
    #[error("state store unavailable: {0}")]
    Unavailable(String),
}

#[async_trait]
pub trait StateStore: Send + Sync + 'static {
    /// The current (unconsumed) version of the obligation with `id`, if any.
    async fn query_unconsumed_by_id(
        &self,
        id: &UniqueIdentifier,
    ) -> Result<Option<StateAndRef>, StoreError>;

    async fn unconsumed_obligations(&self) -> Result<Vec<StateAndRef>, StoreError>;

    /// Unconsumed cash owned by one of this node's keys.
    async fn unconsumed_cash(&self) -> Result<Vec<StateAndRef>, StoreError>;

    /// Durably records a finalized transaction. Returns `false` when it was
    /// already recorded.
    async fn record_finalized(&self, stx: &SignedTransaction) -> Result<bool, StoreError>;

    async fn transaction(&self, id: &SecureHash) -> Result<Option<SignedTransaction>, StoreError>;
}

#[derive(Debug, Default)]
struct VaultInner {
    transactions: HashMap<SecureHash, SignedTransaction>,
    unconsumed: BTreeMap<StateRef, StateAndRef>,
    consumed: HashSet<StateRef>,
}

/// A [`StateStore`] held in memory. States count as relevant when one of
/// their participants is a key this node owns.
#[derive(Debug)]
pub struct InMemoryVault {
    keys: Arc<KeyManagementService>,
    inner: RwLock<VaultInner>,
}

impl InMemoryVault {
    pub fn new(keys: Arc<KeyManagementService>) -> Self {
        Self {
            keys,
            inner: RwLock::new(VaultInner::default()),
        }
    }

    fn is_relevant(&self, state: &LedgerState) -> bool {
        state
            .participants()
            .iter()
            .any(|p| self.keys.owns(&p.owning_key()))
    }

    fn unconsumed_where<F>(&self, pred: F) -> Vec<StateAndRef>
    where
        F: Fn(&StateAndRef) -> bool,
    {
        self.inner
            .read()
            .unconsumed
            .values()
            .filter(|s| pred(s))
            .cloned()
            .collect()
    }
}

#[async_trait]
impl StateStore for InMemoryVault {
    async fn query_unconsumed_by_id(
        &self,
        id: &UniqueIdentifier,
    ) -> Result<Option<StateAndRef>, StoreError> {
        Ok(self
            .unconsumed_where(|s| {
                s.state
                    .as_obligation()
                    .map_or(false, |ob| &ob.linear_id == id)
            })
            .into_iter()
            .next())
    }

    async fn unconsumed_obligations(&self) -> Result<Vec<StateAndRef>, StoreError> {
        Ok(self.unconsumed_where(|s| s.state.as_obligation().is_some()))
    }

    async fn unconsumed_cash(&self) -> Result<Vec<StateAndRef>, StoreError> {
        Ok(self.unconsumed_where(|s| {
            s.state
                .as_cash()
                .map_or(false, |c| self.keys.owns(&c.owner_key()))
        }))
    }

    async fn record_finalized(&self, stx: &SignedTransaction) -> Result<bool, StoreError> {
        stx.verify_required_signatures()?;
        let tx_id = stx.id();

        let mut inner = self.inner.write();
        if inner.transactions.contains_key(&tx_id) {
            debug!(tx_id = %tx_id, "transaction already recorded");
            return Ok(false);
        }

        for input in stx.tx.input_refs() {
            inner.unconsumed.remove(&input);
            inner.consumed.insert(input);
        }
        for out in stx.tx.out_refs() {
            if !inner.consumed.contains(&out.reference) && self.is_relevant(&out.state) {
                inner.unconsumed.insert(out.reference, out);
            }
        }
        inner.transactions.insert(tx_id, stx.clone());
        debug!(
            tx_id = %tx_id,
            owner = %self.keys.legal_identity(),
            unconsumed = inner.unconsumed.len(),
            "recorded finalized transaction"
        );
        Ok(true)
    }

    async fn transaction(&self, id: &SecureHash) -> Result<Option<SignedTransaction>, StoreError> {
        Ok(self.inner.read().transactions.get(id).cloned())
    }
}

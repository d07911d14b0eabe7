//! The unsigned, content-addressed transaction.
//!
//! A [`WireTransaction`] is immutable once built. Its id is the SHA-256 of the
//! bincode encoding of every field except the id itself; the random privacy
//! salt is part of that content, so two otherwise identical proposals never
//! share an id. Everyone signs the id, never the raw content.
//!
//! Input states are carried resolved (state plus provenance) so that contract
//! verification is a pure function of the transaction.

use super::error::TransactionError;
use super::types::{Command, CommandData, TimeWindow};
use crate::crypto::{sha256, PublicKey, SecureHash};
use crate::ledger::{CashState, LedgerState, Obligation, Party, StateAndRef, StateRef};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WireTransaction {
    id: SecureHash,
    inputs: Vec<StateAndRef>,
    outputs: Vec<LedgerState>,
    commands: Vec<Command>,
    notary: Option<Party>,
    time_window: Option<TimeWindow>,
    privacy_salt: [u8; 32],
}

/// The hashed view: every field but the id.
#[derive(Serialize)]
struct Content<'a> {
    inputs: &'a [StateAndRef],
    outputs: &'a [LedgerState],
    commands: &'a [Command],
    notary: &'a Option<Party>,
    time_window: &'a Option<TimeWindow>,
    privacy_salt: &'a [u8; 32],
}

impl WireTransaction {
    pub(crate) fn new(
        inputs: Vec<StateAndRef>,
        outputs: Vec<LedgerState>,
        commands: Vec<Command>,
        notary: Option<Party>,
        time_window: Option<TimeWindow>,
        privacy_salt: [u8; 32],
    ) -> Result<Self, TransactionError> {
        let mut tx = Self {
            id: SecureHash::ZERO,
            inputs,
            outputs,
            commands,
            notary,
            time_window,
            privacy_salt,
        };
        tx.id = tx.compute_id()?;
        Ok(tx)
    }

    fn compute_id(&self) -> Result<SecureHash, TransactionError> {
        let content = Content {
            inputs: &self.inputs,
            outputs: &self.outputs,
            commands: &self.commands,
            notary: &self.notary,
            time_window: &self.time_window,
            privacy_salt: &self.privacy_salt,
        };
        Ok(sha256(&bincode::serialize(&content)?))
    }

    /// Recomputes the id from content. Anything received from a peer goes
    /// through this before its id is trusted.
    pub fn check_id(&self) -> Result<(), TransactionError> {
        let computed = self.compute_id()?;
        if computed != self.id {
            return Err(TransactionError::IdMismatch {
                carried: self.id,
                computed,
            });
        }
        Ok(())
    }

    pub fn id(&self) -> SecureHash {
        self.id
    }

    pub fn inputs(&self) -> &[StateAndRef] {
        &self.inputs
    }

    pub fn input_refs(&self) -> Vec<StateRef> {
        self.inputs.iter().map(|i| i.reference).collect()
    }

    pub fn outputs(&self) -> &[LedgerState] {
        &self.outputs
    }

    pub fn commands(&self) -> &[Command] {
        &self.commands
    }

    pub fn notary(&self) -> Option<&Party> {
        self.notary.as_ref()
    }

    pub fn time_window(&self) -> Option<&TimeWindow> {
        self.time_window.as_ref()
    }

    pub fn obligation_inputs(&self) -> Vec<&Obligation> {
        self.inputs
            .iter()
            .filter_map(|i| i.state.as_obligation())
            .collect()
    }

    pub fn obligation_outputs(&self) -> Vec<&Obligation> {
        self.outputs.iter().filter_map(|o| o.as_obligation()).collect()
    }

    pub fn cash_inputs(&self) -> Vec<&CashState> {
        self.inputs.iter().filter_map(|i| i.state.as_cash()).collect()
    }

    pub fn cash_outputs(&self) -> Vec<&CashState> {
        self.outputs.iter().filter_map(|o| o.as_cash()).collect()
    }

    /// Commands matching `pred`, e.g. every obligation command.
    pub fn commands_where<F>(&self, pred: F) -> Vec<&Command>
    where
        F: Fn(&CommandData) -> bool,
    {
        self.commands.iter().filter(|c| pred(&c.value)).collect()
    }

    /// Every key that must sign before the transaction is valid: the union of
    /// command signers, plus the notary when it has inputs to guard or a
    /// window to check.
    pub fn required_signing_keys(&self) -> BTreeSet<PublicKey> {
        let mut keys: BTreeSet<PublicKey> = self
            .commands
            .iter()
            .flat_map(|c| c.signers.iter().copied())
            .collect();
        if let Some(notary) = self.notary_if_required() {
            keys.insert(notary.owning_key);
        }
        keys
    }

    /// The notary, if this transaction needs notarisation at all.
    pub fn notary_if_required(&self) -> Option<&Party> {
        if self.inputs.is_empty() && self.time_window.is_none() {
            return None;
        }
        self.notary.as_ref()
    }

    /// Output states wrapped with the provenance they get once committed.
    pub fn out_refs(&self) -> Vec<StateAndRef> {
        self.outputs
            .iter()
            .enumerate()
            .map(|(i, state)| StateAndRef::new(state.clone(), StateRef::new(self.id, i as u32)))
            .collect()
    }

    /// Keys of every party that should store this transaction.
    pub fn participant_keys(&self) -> BTreeSet<PublicKey> {
        self.inputs
            .iter()
            .map(|i| &i.state)
            .chain(self.outputs.iter())
            .flat_map(|s| s.participants())
            .map(|p| p.owning_key())
            .collect()
    }
}

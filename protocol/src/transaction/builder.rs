//! Transaction construction.
//!
//! The [`TransactionBuilder`] is mutable scratch space: flows add inputs,
//! outputs and commands, the cash service adds its spend, and finally
//! [`to_wire_transaction`](TransactionBuilder::to_wire_transaction) freezes the
//! lot into a content-addressed [`WireTransaction`].
//!
//! The builder does not sign. Signing lives in [`super::signing`] so that
//! construction is testable without key material.

use super::error::TransactionError;
use super::signing::{SignedTransaction, TransactionSignature};
use super::types::{Command, CommandData, TimeWindow};
use super::wire::WireTransaction;
use crate::config::PRIVACY_SALT_LENGTH;
use crate::crypto::{KeyPair, PublicKey};
use crate::ledger::{LedgerState, Party, StateAndRef};
use rand::RngCore;

#[derive(Debug, Clone)]
pub struct TransactionBuilder {
    notary: Option<Party>,
    inputs: Vec<StateAndRef>,
    outputs: Vec<LedgerState>,
    commands: Vec<Command>,
    time_window: Option<TimeWindow>,
    privacy_salt: [u8; PRIVACY_SALT_LENGTH],
}

impl TransactionBuilder {
    /// An empty builder with a fresh random privacy salt.
    pub fn new(notary: Option<Party>) -> Self {
        let mut privacy_salt = [0u8; PRIVACY_SALT_LENGTH];
        rand::thread_rng().fill_bytes(&mut privacy_salt);
        Self {
            notary,
            inputs: Vec::new(),
            outputs: Vec::new(),
            commands: Vec::new(),
            time_window: None,
            privacy_salt,
        }
    }

    pub fn notary(&self) -> Option<&Party> {
        self.notary.as_ref()
    }

    pub fn add_input_state(&mut self, input: StateAndRef) -> &mut Self {
        self.inputs.push(input);
        self
    }

    pub fn add_output_state(&mut self, output: impl Into<LedgerState>) -> &mut Self {
        self.outputs.push(output.into());
        self
    }

    pub fn add_command(
        &mut self,
        value: CommandData,
        signers: impl IntoIterator<Item = PublicKey>,
    ) -> &mut Self {
        self.commands.push(Command::new(value, signers));
        self
    }

    pub fn set_time_window(&mut self, window: TimeWindow) -> &mut Self {
        self.time_window = Some(window);
        self
    }

    pub fn inputs(&self) -> &[StateAndRef] {
        &self.inputs
    }

    pub fn outputs(&self) -> &[LedgerState] {
        &self.outputs
    }

    pub fn commands(&self) -> &[Command] {
        &self.commands
    }

    /// Freezes the current content into a wire transaction and computes its id.
    pub fn to_wire_transaction(&self) -> Result<WireTransaction, TransactionError> {
        WireTransaction::new(
            self.inputs.clone(),
            self.outputs.clone(),
            self.commands.clone(),
            self.notary.clone(),
            self.time_window,
            self.privacy_salt,
        )
    }

    /// Freezes and signs with each of `keys`. The result is usually still
    /// missing counterparty and notary signatures.
    pub fn sign_initial(&self, keys: &[&KeyPair]) -> Result<SignedTransaction, TransactionError> {
        let wtx = self.to_wire_transaction()?;
        let id = wtx.id();
        let sigs = keys
            .iter()
            .map(|kp| TransactionSignature::create(kp, id))
            .collect();
        Ok(SignedTransaction::new(wtx, sigs))
    }
}

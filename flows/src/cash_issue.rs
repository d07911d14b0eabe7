//! Self-issued cash, so a node has something to settle with.
//!
//! The transaction has no inputs and no time window, so it needs no notary
//! and no counterparty. It is verified, signed and recorded locally.

use crate::error::FlowError;
use crate::hub::ServiceHub;
use obligation_contracts::verify_transaction;
use obligation_protocol::ledger::{Amount, CashState, PartyAndReference};
use obligation_protocol::transaction::{
    CashCommand, CommandData, SignedTransaction, TransactionBuilder,
};
use tracing::info;

/// Issuer reference stamped on self-issued cash.
pub const SELF_ISSUE_REFERENCE: [u8; 1] = [0];

pub async fn self_issue_cash(
    hub: &ServiceHub,
    amount: Amount,
) -> Result<SignedTransaction, FlowError> {
    let me = hub.me().clone();
    let mut builder = TransactionBuilder::new(None);
    builder
        .add_output_state(CashState::new(
            amount.clone(),
            PartyAndReference::new(me.clone(), SELF_ISSUE_REFERENCE.to_vec()),
            me.clone().into(),
        ))
        .add_command(CommandData::Cash(CashCommand::Issue), [me.owning_key]);

    let wtx = builder.to_wire_transaction()?;
    verify_transaction(&wtx).map_err(FlowError::LocalVerificationFailed)?;
    let signers = wtx.required_signing_keys();
    let sigs = hub.keys.sign_with_owned(&signers, wtx.id());
    let stx = SignedTransaction::new(wtx, sigs);
    hub.vault.record_finalized(&stx).await?;

    info!(me = %me, amount = %amount, tx_id = %stx.id(), "cash self-issued");
    Ok(stx)
}

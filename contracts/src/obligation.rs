//! # Obligation Contract
//!
//! A pure predicate over a proposed transaction: inputs, outputs, the single
//! obligation command and the signer set it asserts. No storage, no network,
//! no clock. Every participant and every verifier evaluates the same content
//! and reaches the same answer.
//!
//! ## Rules
//!
//! **Issue**: no inputs; one output; `amount > 0`; `lender != borrower`;
//! signers == {lender, borrower}.
//!
//! **Transfer**: one input, one output; equal ignoring the lender; lender
//! changed; signers == participants(input) ∪ participants(output).
//!
//! **Settle**: one obligation input; cash outputs exist and some pay the
//! lender, in the obligation's currency (issuer ignored); the accepted sum
//! does not exceed `amount - paid`. Full settlement leaves no obligation
//! output; partial settlement leaves exactly one with only `paid` moved, by
//! exactly the accepted sum. Signers == participants(input).

use crate::error::RuleViolation;
use obligation_protocol::crypto::PublicKey;
use obligation_protocol::ledger::{Amount, Obligation};
use obligation_protocol::transaction::{CommandData, ObligationCommand, WireTransaction};
use std::collections::BTreeSet;

/// Namespace for the obligation rules.
pub struct ObligationContract;

impl ObligationContract {
    /// Whether `tx` touches obligations at all.
    pub fn applies_to(tx: &WireTransaction) -> bool {
        !tx.obligation_inputs().is_empty()
            || !tx.obligation_outputs().is_empty()
            || !tx
                .commands_where(|c| matches!(c, CommandData::Obligation(_)))
                .is_empty()
    }

    /// Dispatches on the single obligation command.
    pub fn verify(tx: &WireTransaction) -> Result<(), RuleViolation> {
        let commands = tx.commands_where(|c| matches!(c, CommandData::Obligation(_)));
        let [command] = commands.as_slice() else {
            return Err(RuleViolation::RequireSingleCommand {
                found: commands.len(),
            });
        };
        let CommandData::Obligation(kind) = command.value else {
            return Err(RuleViolation::RequireSingleCommand { found: 0 });
        };
        let signers = &command.signers;

        match kind {
            ObligationCommand::Issue => verify_issue(tx, signers),
            ObligationCommand::Transfer => verify_transfer(tx, signers),
            ObligationCommand::Settle => verify_settle(tx, signers),
        }
    }
}

fn require_signers(
    command: ObligationCommand,
    expected: BTreeSet<PublicKey>,
    actual: &BTreeSet<PublicKey>,
) -> Result<(), RuleViolation> {
    if &expected != actual {
        return Err(RuleViolation::SignersMismatch {
            command,
            expected: expected.into_iter().collect(),
            actual: actual.iter().copied().collect(),
        });
    }
    Ok(())
}

fn verify_issue(tx: &WireTransaction, signers: &BTreeSet<PublicKey>) -> Result<(), RuleViolation> {
    if !tx.inputs().is_empty() {
        return Err(RuleViolation::IssueConsumesInputs {
            count: tx.inputs().len(),
        });
    }
    let outputs = tx.obligation_outputs();
    let [ob] = outputs.as_slice() else {
        return Err(RuleViolation::IssueOutputCount {
            count: outputs.len(),
        });
    };
    if ob.amount.is_zero() {
        return Err(RuleViolation::NonPositiveAmount);
    }
    if ob.lender == ob.borrower {
        return Err(RuleViolation::LenderIsBorrower);
    }
    require_signers(ObligationCommand::Issue, ob.participant_keys(), signers)
}

fn verify_transfer(
    tx: &WireTransaction,
    signers: &BTreeSet<PublicKey>,
) -> Result<(), RuleViolation> {
    let inputs = tx.obligation_inputs();
    let [input] = inputs.as_slice() else {
        return Err(RuleViolation::TransferInputCount {
            count: inputs.len(),
        });
    };
    let outputs = tx.obligation_outputs();
    let [output] = outputs.as_slice() else {
        return Err(RuleViolation::TransferOutputCount {
            count: outputs.len(),
        });
    };
    if input.without_lender() != output.without_lender() {
        return Err(RuleViolation::TransferChangesOtherFields);
    }
    if input.lender == output.lender {
        return Err(RuleViolation::LenderUnchanged);
    }
    let expected = input
        .participant_keys()
        .union(&output.participant_keys())
        .copied()
        .collect();
    require_signers(ObligationCommand::Transfer, expected, signers)
}

fn verify_settle(tx: &WireTransaction, signers: &BTreeSet<PublicKey>) -> Result<(), RuleViolation> {
    let inputs = tx.obligation_inputs();
    let [input] = inputs.as_slice() else {
        return Err(RuleViolation::SettleInputCount {
            count: inputs.len(),
        });
    };

    let cash = tx.cash_outputs();
    if cash.is_empty() {
        return Err(RuleViolation::NoCashOutputs);
    }
    let payments: Vec<&Amount> = cash
        .iter()
        .filter(|c| c.owner == input.lender)
        .map(|c| &c.amount)
        .collect();
    if payments.is_empty() {
        return Err(RuleViolation::NoPaymentToLender);
    }
    if let Some(foreign) = payments
        .iter()
        .find(|a| a.currency != input.amount.currency)
    {
        return Err(RuleViolation::PaymentCurrencyMismatch {
            expected: input.amount.currency.clone(),
            found: foreign.currency.clone(),
        });
    }

    let accepted = Amount::sum(payments, &input.amount.currency)?;
    let outstanding = input.outstanding()?;
    if accepted.quantity > outstanding.quantity {
        return Err(RuleViolation::OverSettlement {
            accepted,
            outstanding,
        });
    }

    let outputs = tx.obligation_outputs();
    if accepted == outstanding {
        if !outputs.is_empty() {
            return Err(RuleViolation::FullySettledHasOutput {
                count: outputs.len(),
            });
        }
    } else {
        let [output] = outputs.as_slice() else {
            return Err(RuleViolation::SettleOutputCount {
                count: outputs.len(),
            });
        };
        verify_partial_settlement(input, output, &accepted)?;
    }

    require_signers(ObligationCommand::Settle, input.participant_keys(), signers)
}

fn verify_partial_settlement(
    input: &Obligation,
    output: &Obligation,
    accepted: &Amount,
) -> Result<(), RuleViolation> {
    if input.amount != output.amount
        || input.borrower != output.borrower
        || input.lender != output.lender
        || input.linear_id != output.linear_id
    {
        return Err(RuleViolation::SettleChangesOtherFields);
    }
    let expected = input.paid.checked_add(accepted)?;
    if output.paid != expected {
        return Err(RuleViolation::UnderpaidMismatch {
            expected,
            found: output.paid.clone(),
        });
    }
    Ok(())
}

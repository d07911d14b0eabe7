//! # Cash Contract
//!
//! Just enough cash rules for settlement transactions to be checkable end to
//! end.
//!
//! - **Issue**: consumes no cash; every output's issuer signs.
//! - **Move**: for every (currency, issuer) group, inputs sum to outputs;
//!   every input owner signs.
//!
//! Zero-valued cash outputs are always rejected.

use crate::error::CashViolation;
use obligation_protocol::crypto::PublicKey;
use obligation_protocol::ledger::{AmountError, CashState, Currency};
use obligation_protocol::transaction::{CashCommand, CommandData, WireTransaction};

pub struct CashContract;

/// Running totals for one (currency, issuer) group.
struct Group {
    currency: Currency,
    issuer: PublicKey,
    inputs: u64,
    outputs: u64,
}

fn group_for<'a>(groups: &'a mut Vec<Group>, cash: &CashState) -> &'a mut Group {
    let issuer = cash.issuer.party.owning_key();
    let pos = groups
        .iter()
        .position(|g| g.currency == cash.amount.currency && g.issuer == issuer);
    match pos {
        Some(i) => &mut groups[i],
        None => {
            groups.push(Group {
                currency: cash.amount.currency.clone(),
                issuer,
                inputs: 0,
                outputs: 0,
            });
            let last = groups.len() - 1;
            &mut groups[last]
        }
    }
}

impl CashContract {
    pub fn applies_to(tx: &WireTransaction) -> bool {
        !tx.cash_inputs().is_empty()
            || !tx.cash_outputs().is_empty()
            || !tx
                .commands_where(|c| matches!(c, CommandData::Cash(_)))
                .is_empty()
    }

    pub fn verify(tx: &WireTransaction) -> Result<(), CashViolation> {
        let commands = tx.commands_where(|c| matches!(c, CommandData::Cash(_)));
        let command = match commands.as_slice() {
            [] => return Err(CashViolation::MissingCommand),
            [single] => *single,
            many => return Err(CashViolation::RequireSingleCommand { found: many.len() }),
        };

        let inputs = tx.cash_inputs();
        let outputs = tx.cash_outputs();
        if outputs.iter().any(|c| c.amount.is_zero()) {
            return Err(CashViolation::ZeroOutput);
        }

        match command.value {
            CommandData::Cash(CashCommand::Issue) => {
                if !inputs.is_empty() {
                    return Err(CashViolation::IssueConsumesInputs {
                        count: inputs.len(),
                    });
                }
                for out in &outputs {
                    let issuer = out.issuer.party.owning_key();
                    if !command.signers.contains(&issuer) {
                        return Err(CashViolation::IssuerMustSign { issuer });
                    }
                }
                Ok(())
            }
            CommandData::Cash(CashCommand::Move) => {
                let mut groups: Vec<Group> = Vec::new();
                for cash in &inputs {
                    let g = group_for(&mut groups, cash);
                    g.inputs = g
                        .inputs
                        .checked_add(cash.amount.quantity)
                        .ok_or(AmountError::Overflow)?;
                    let owner = cash.owner_key();
                    if !command.signers.contains(&owner) {
                        return Err(CashViolation::MissingOwnerSignature { owner });
                    }
                }
                for cash in &outputs {
                    let g = group_for(&mut groups, cash);
                    g.outputs = g
                        .outputs
                        .checked_add(cash.amount.quantity)
                        .ok_or(AmountError::Overflow)?;
                }
                if let Some(g) = groups.into_iter().find(|g| g.inputs != g.outputs) {
                    return Err(CashViolation::Unbalanced {
                        currency: g.currency,
                        issuer: g.issuer,
                        inputs: g.inputs,
                        outputs: g.outputs,
                    });
                }
                Ok(())
            }
            CommandData::Obligation(_) => Err(CashViolation::MissingCommand),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use obligation_protocol::crypto::{sha256, KeyPair};
    use obligation_protocol::ledger::{
        AbstractParty, Amount, LedgerState, Party, PartyAndReference, StateAndRef, StateRef,
    };
    use obligation_protocol::transaction::TransactionBuilder;

    fn party(name: &str) -> AbstractParty {
        Party::new(name, KeyPair::generate().public_key()).into()
    }

    fn usd(bank: &AbstractParty, q: u64, owner: &AbstractParty) -> CashState {
        CashState::new(
            Amount::new(q, Currency::USD),
            PartyAndReference::new(bank.clone(), vec![0]),
            owner.clone(),
        )
    }

    fn spent(cash: CashState, i: u32) -> StateAndRef {
        StateAndRef::new(LedgerState::Cash(cash), StateRef::new(sha256(b"cash"), i))
    }

    fn verify(b: &TransactionBuilder) -> Result<(), CashViolation> {
        CashContract::verify(&b.to_wire_transaction().unwrap())
    }

    #[test]
    fn issue_requires_issuer_signature() {
        let bank = party("Bank");
        let alice = party("Alice");
        let mut b = TransactionBuilder::new(None);
        b.add_output_state(usd(&bank, 100, &alice))
            .add_command(CommandData::Cash(CashCommand::Issue), [bank.owning_key()]);
        verify(&b).unwrap();

        let mut forged = TransactionBuilder::new(None);
        forged
            .add_output_state(usd(&bank, 100, &alice))
            .add_command(CommandData::Cash(CashCommand::Issue), [alice.owning_key()]);
        assert_eq!(
            verify(&forged),
            Err(CashViolation::IssuerMustSign {
                issuer: bank.owning_key()
            })
        );
    }

    #[test]
    fn move_conserves_per_issuer() {
        let bank = party("Bank");
        let alice = party("Alice");
        let bob = party("Bob");
        let mut b = TransactionBuilder::new(None);
        b.add_input_state(spent(usd(&bank, 100, &alice), 0))
            .add_output_state(usd(&bank, 40, &bob))
            .add_output_state(usd(&bank, 60, &alice))
            .add_command(CommandData::Cash(CashCommand::Move), [alice.owning_key()]);
        verify(&b).unwrap();

        let mut inflated = TransactionBuilder::new(None);
        inflated
            .add_input_state(spent(usd(&bank, 100, &alice), 0))
            .add_output_state(usd(&bank, 101, &bob))
            .add_command(CommandData::Cash(CashCommand::Move), [alice.owning_key()]);
        assert!(matches!(
            verify(&inflated),
            Err(CashViolation::Unbalanced {
                inputs: 100,
                outputs: 101,
                ..
            })
        ));
    }

    #[test]
    fn issuers_are_not_fungible() {
        let bank = party("Bank");
        let other_bank = party("Other Bank");
        let alice = party("Alice");
        let mut b = TransactionBuilder::new(None);
        b.add_input_state(spent(usd(&bank, 100, &alice), 0))
            .add_output_state(usd(&other_bank, 100, &alice))
            .add_command(CommandData::Cash(CashCommand::Move), [alice.owning_key()]);
        assert!(matches!(verify(&b), Err(CashViolation::Unbalanced { .. })));
    }

    #[test]
    fn move_requires_owner_signature() {
        let bank = party("Bank");
        let alice = party("Alice");
        let bob = party("Bob");
        let mut b = TransactionBuilder::new(None);
        b.add_input_state(spent(usd(&bank, 100, &alice), 0))
            .add_output_state(usd(&bank, 100, &bob))
            .add_command(CommandData::Cash(CashCommand::Move), [bob.owning_key()]);
        assert_eq!(
            verify(&b),
            Err(CashViolation::MissingOwnerSignature {
                owner: alice.owning_key()
            })
        );
    }

    #[test]
    fn zero_output_and_missing_command() {
        let bank = party("Bank");
        let alice = party("Alice");
        let mut zero = TransactionBuilder::new(None);
        zero.add_output_state(usd(&bank, 0, &alice))
            .add_command(CommandData::Cash(CashCommand::Issue), [bank.owning_key()]);
        assert_eq!(verify(&zero), Err(CashViolation::ZeroOutput));

        let mut bare = TransactionBuilder::new(None);
        bare.add_output_state(usd(&bank, 5, &alice));
        assert_eq!(verify(&bare), Err(CashViolation::MissingCommand));
    }
}

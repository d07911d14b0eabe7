//! # Cash Service
//!
//! Balance queries and coin selection over the vault's unconsumed cash.
//!
//! `generate_spend` picks this node's cash of the requested currency in
//! vault order until the amount is covered, then adds to the builder: the
//! selected inputs, one payment output per issuer to the payee, one change
//! output per issuer back to the node's legal identity, and a single
//! `Cash.Move` command signed by every input owner. Grouping by issuer keeps
//! the cash contract's per-issuer conservation rule satisfied.

use super::vault::{StateStore, StoreError};
use crate::crypto::PublicKey;
use crate::identity::KeyManagementService;
use crate::ledger::{AbstractParty, Amount, AmountError, CashState, Currency, PartyAndReference};
use crate::transaction::{CashCommand, CommandData, TransactionBuilder};
use async_trait::async_trait;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum CashError {
    /// No cash at all in the requested currency.
    #[error("no {currency} cash available")]
    NoFunds { currency: Currency },

    #[error("insufficient funds: requested {requested}, available {available}")]
    InsufficientFunds { requested: Amount, available: Amount },

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Amount(#[from] AmountError),
}

#[async_trait]
pub trait CashService: Send + Sync + 'static {
    async fn balance(&self, currency: &Currency) -> Result<Amount, CashError>;

    /// Totals per currency. Currencies with no cash are absent.
    async fn balances(&self) -> Result<BTreeMap<Currency, Amount>, CashError>;

    /// Adds a spend of `amount` to `payee` to `builder` and returns the keys
    /// that must sign for the selected inputs.
    async fn generate_spend(
        &self,
        builder: &mut TransactionBuilder,
        amount: &Amount,
        payee: &AbstractParty,
    ) -> Result<BTreeSet<PublicKey>, CashError>;
}

/// [`CashService`] backed by a [`StateStore`].
pub struct VaultCashService {
    vault: Arc<dyn StateStore>,
    keys: Arc<KeyManagementService>,
}

impl VaultCashService {
    pub fn new(vault: Arc<dyn StateStore>, keys: Arc<KeyManagementService>) -> Self {
        Self { vault, keys }
    }
}

#[async_trait]
impl CashService for VaultCashService {
    async fn balance(&self, currency: &Currency) -> Result<Amount, CashError> {
        let cash = self.vault.unconsumed_cash().await?;
        let amounts: Vec<&Amount> = cash
            .iter()
            .filter_map(|s| s.state.as_cash())
            .map(|c| &c.amount)
            .filter(|a| &a.currency == currency)
            .collect();
        Ok(Amount::sum(amounts, currency)?)
    }

    async fn balances(&self) -> Result<BTreeMap<Currency, Amount>, CashError> {
        let mut totals: BTreeMap<Currency, Amount> = BTreeMap::new();
        for state in self.vault.unconsumed_cash().await? {
            let Some(cash) = state.state.as_cash() else {
                continue;
            };
            let entry = totals
                .entry(cash.amount.currency.clone())
                .or_insert_with(|| Amount::zero(cash.amount.currency.clone()));
            *entry = entry.checked_add(&cash.amount)?;
        }
        Ok(totals)
    }

    async fn generate_spend(
        &self,
        builder: &mut TransactionBuilder,
        amount: &Amount,
        payee: &AbstractParty,
    ) -> Result<BTreeSet<PublicKey>, CashError> {
        let available = self.balance(&amount.currency).await?;
        if available.is_zero() {
            return Err(CashError::NoFunds {
                currency: amount.currency.clone(),
            });
        }
        if available.quantity < amount.quantity {
            return Err(CashError::InsufficientFunds {
                requested: amount.clone(),
                available,
            });
        }

        // Select inputs in vault order until covered, grouped by issuer.
        let mut selected = Vec::new();
        let mut gathered = Amount::zero(amount.currency.clone());
        for state in self.vault.unconsumed_cash().await? {
            if gathered.quantity >= amount.quantity {
                break;
            }
            let Some(cash) = state.state.as_cash() else {
                continue;
            };
            if cash.amount.currency != amount.currency {
                continue;
            }
            gathered = gathered.checked_add(&cash.amount)?;
            selected.push(state);
        }

        let mut per_issuer: Vec<(PartyAndReference, u64)> = Vec::new();
        let mut signers = BTreeSet::new();
        for state in &selected {
            if let Some(cash) = state.state.as_cash() {
                match per_issuer.iter_mut().find(|(i, _)| *i == cash.issuer) {
                    Some((_, total)) => *total += cash.amount.quantity,
                    None => per_issuer.push((cash.issuer.clone(), cash.amount.quantity)),
                }
                signers.insert(cash.owner_key());
            }
            builder.add_input_state(state.clone());
        }

        let change_owner: AbstractParty = self.keys.legal_identity().clone().into();
        let mut remaining = amount.quantity;
        for (issuer, total) in per_issuer {
            let pay = remaining.min(total);
            remaining -= pay;
            if pay > 0 {
                builder.add_output_state(CashState::new(
                    Amount::new(pay, amount.currency.clone()),
                    issuer.clone(),
                    payee.clone(),
                ));
            }
            if total > pay {
                builder.add_output_state(CashState::new(
                    Amount::new(total - pay, amount.currency.clone()),
                    issuer,
                    change_owner.clone(),
                ));
            }
        }
        builder.add_command(CommandData::Cash(CashCommand::Move), signers.iter().copied());

        debug!(
            amount = %amount,
            payee = %payee,
            inputs = selected.len(),
            "generated cash spend"
        );
        Ok(signers)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::{LedgerState, Party};
    use crate::services::vault::InMemoryVault;
    use crate::transaction::SignedTransaction;

    async fn funded(amounts: &[u64]) -> (VaultCashService, Arc<KeyManagementService>) {
        let keys = Arc::new(KeyManagementService::generate("Bank"));
        let vault = Arc::new(InMemoryVault::new(keys.clone()));
        let me: AbstractParty = keys.legal_identity().clone().into();
        for (i, q) in amounts.iter().enumerate() {
            let mut builder = TransactionBuilder::new(None);
            builder
                .add_output_state(CashState::new(
                    Amount::new(*q, Currency::USD),
                    PartyAndReference::new(keys.legal_identity().clone(), vec![i as u8]),
                    me.clone(),
                ))
                .add_command(
                    CommandData::Cash(CashCommand::Issue),
                    [keys.legal_identity().owning_key],
                );
            let wtx = builder.to_wire_transaction().unwrap();
            let sigs = keys.sign_with_owned(&[keys.legal_identity().owning_key], wtx.id());
            vault
                .record_finalized(&SignedTransaction::new(wtx, sigs))
                .await
                .unwrap();
        }
        (VaultCashService::new(vault, keys.clone()), keys)
    }

    fn payee() -> AbstractParty {
        Party::new("Payee", crate::crypto::KeyPair::generate().public_key()).into()
    }

    #[tokio::test]
    async fn balances_sum_per_currency() {
        let (cash, _) = funded(&[30, 70]).await;
        assert_eq!(
            cash.balance(&Currency::USD).await.unwrap(),
            Amount::new(100, Currency::USD)
        );
        assert_eq!(
            cash.balance(&Currency::EUR).await.unwrap(),
            Amount::zero(Currency::EUR)
        );
        assert_eq!(cash.balances().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn spend_conserves_value_with_change() {
        let (cash, keys) = funded(&[30, 70]).await;
        let to = payee();
        let mut builder = TransactionBuilder::new(None);
        let signers = cash
            .generate_spend(&mut builder, &Amount::new(40, Currency::USD), &to)
            .await
            .unwrap();
        assert_eq!(signers, [keys.legal_identity().owning_key].into_iter().collect());

        let outputs: Vec<&CashState> = builder
            .outputs()
            .iter()
            .filter_map(LedgerState::as_cash)
            .collect();
        let paid: u64 = outputs
            .iter()
            .filter(|c| c.owner == to)
            .map(|c| c.amount.quantity)
            .sum();
        let total_out: u64 = outputs.iter().map(|c| c.amount.quantity).sum();
        assert_eq!(paid, 40);
        assert_eq!(total_out, 100);
        assert_eq!(builder.commands().len(), 1);
    }

    #[tokio::test]
    async fn no_funds_vs_insufficient() {
        let (empty, _) = funded(&[]).await;
        let mut builder = TransactionBuilder::new(None);
        assert!(matches!(
            empty
                .generate_spend(&mut builder, &Amount::new(1, Currency::USD), &payee())
                .await,
            Err(CashError::NoFunds { .. })
        ));

        let (poor, _) = funded(&[10]).await;
        assert!(matches!(
            poor.generate_spend(&mut builder, &Amount::new(11, Currency::USD), &payee())
                .await,
            Err(CashError::InsufficientFunds { .. })
        ));
        assert!(builder.inputs().is_empty());
    }
}

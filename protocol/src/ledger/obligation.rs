//! # Obligation Record
//!
//! A bilateral debt: `borrower` owes `lender` an `amount`, of which `paid` has
//! been settled so far. The record is an immutable value. Every change
//! ([`pay`](Obligation::pay), [`with_new_lender`](Obligation::with_new_lender))
//! returns a new version that keeps the same `linear_id`; the consumed version
//! stays untouched in the transaction that spent it.
//!
//! ## Invariants
//!
//! - `paid` has the same currency as `amount` and never exceeds it.
//! - `linear_id` is fixed at issuance.
//! - `lender != borrower` at issuance (enforced by the contract, not here,
//!   so that the contract can report the violation).

use super::amount::{Amount, AmountError};
use super::ids::UniqueIdentifier;
use super::party::AbstractParty;
use crate::crypto::PublicKey;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Obligation {
    pub amount: Amount,
    pub lender: AbstractParty,
    pub borrower: AbstractParty,
    pub paid: Amount,
    pub linear_id: UniqueIdentifier,
}

/// Projection of an [`Obligation`] with the lender removed. Two versions
/// that differ only in their lender project to equal values.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObligationWithoutLender<'a> {
    pub amount: &'a Amount,
    pub borrower: &'a AbstractParty,
    pub paid: &'a Amount,
    pub linear_id: &'a UniqueIdentifier,
}

impl Obligation {
    /// A fresh, unpaid obligation with a new identifier.
    pub fn new(amount: Amount, lender: AbstractParty, borrower: AbstractParty) -> Self {
        let paid = Amount::zero(amount.currency.clone());
        Self {
            amount,
            lender,
            borrower,
            paid,
            linear_id: UniqueIdentifier::new(),
        }
    }

    /// The next version after a payment of `amount`.
    ///
    /// Fails with `CurrencyMismatch` for a foreign currency and with
    /// `NegativeAmount` when the new paid total would exceed the debt.
    pub fn pay(&self, amount: &Amount) -> Result<Obligation, AmountError> {
        let paid = self.paid.checked_add(amount)?;
        self.amount.checked_sub(&paid)?;
        Ok(Obligation {
            paid,
            ..self.clone()
        })
    }

    /// The next version with `new_lender` as lender; everything else unchanged.
    pub fn with_new_lender(&self, new_lender: AbstractParty) -> Obligation {
        Obligation {
            lender: new_lender,
            ..self.clone()
        }
    }

    pub fn without_lender(&self) -> ObligationWithoutLender<'_> {
        ObligationWithoutLender {
            amount: &self.amount,
            borrower: &self.borrower,
            paid: &self.paid,
            linear_id: &self.linear_id,
        }
    }

    /// `amount - paid`.
    pub fn outstanding(&self) -> Result<Amount, AmountError> {
        self.amount.checked_sub(&self.paid)
    }

    pub fn is_fully_paid(&self) -> bool {
        self.paid == self.amount
    }

    /// Lender first, borrower second.
    pub fn participants(&self) -> Vec<AbstractParty> {
        vec![self.lender.clone(), self.borrower.clone()]
    }

    pub fn participant_keys(&self) -> BTreeSet<PublicKey> {
        [self.lender.owning_key(), self.borrower.owning_key()]
            .into_iter()
            .collect()
    }
}

impl fmt::Display for Obligation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Obligation({}): {} owes {} {} and has paid {} so far.",
            self.linear_id, self.borrower, self.lender, self.amount, self.paid
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::KeyPair;
    use crate::ledger::amount::Currency;
    use crate::ledger::party::{AnonymousParty, Party};

    fn party(name: &str) -> AbstractParty {
        Party::new(name, KeyPair::generate().public_key()).into()
    }

    fn usd(q: u64) -> Amount {
        Amount::new(q, Currency::USD)
    }

    #[test]
    fn new_obligation_is_unpaid() {
        let ob = Obligation::new(usd(100), party("Lender"), party("Borrower"));
        assert_eq!(ob.paid, usd(0));
        assert_eq!(ob.outstanding().unwrap(), usd(100));
        assert!(!ob.is_fully_paid());
    }

    #[test]
    fn pay_keeps_identity_and_accumulates() {
        let ob = Obligation::new(usd(100), party("L"), party("B"));
        let after = ob.pay(&usd(40)).unwrap();
        assert_eq!(after.paid, usd(40));
        assert_eq!(after.linear_id, ob.linear_id);
        assert_eq!(after.amount, ob.amount);
        // The original value is untouched.
        assert_eq!(ob.paid, usd(0));

        let settled = after.pay(&usd(60)).unwrap();
        assert!(settled.is_fully_paid());
    }

    #[test]
    fn overpay_is_rejected() {
        let ob = Obligation::new(usd(100), party("L"), party("B"));
        assert!(matches!(
            ob.pay(&usd(101)),
            Err(AmountError::NegativeAmount { .. })
        ));
        assert!(matches!(
            ob.pay(&Amount::new(1, Currency::EUR)),
            Err(AmountError::CurrencyMismatch { .. })
        ));
    }

    #[test]
    fn new_lender_differs_only_in_lender() {
        let ob = Obligation::new(usd(100), party("L"), party("B"));
        let moved = ob.with_new_lender(party("L2"));
        assert_ne!(ob, moved);
        assert_eq!(ob.without_lender(), moved.without_lender());
        assert_ne!(ob.without_lender(), ob.pay(&usd(1)).unwrap().without_lender());
    }

    #[test]
    fn participants_are_lender_then_borrower() {
        let l = party("L");
        let b = party("B");
        let ob = Obligation::new(usd(5), l.clone(), b.clone());
        assert_eq!(ob.participants(), vec![l.clone(), b.clone()]);
        assert_eq!(ob.participant_keys().len(), 2);
        assert!(ob.participant_keys().contains(&l.owning_key()));
    }

    #[test]
    fn display_format() {
        let b_key = KeyPair::generate().public_key();
        let ob = Obligation::new(
            usd(100),
            party("Lender"),
            AnonymousParty::new(b_key).into(),
        );
        assert_eq!(
            ob.to_string(),
            format!(
                "Obligation({}): {} owes Lender 100 USD and has paid 0 USD so far.",
                ob.linear_id,
                b_key.to_base58()
            )
        );
    }
}

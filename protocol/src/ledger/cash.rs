//! Cash states: the asset that pays obligations off.

use super::amount::Amount;
use super::party::{AbstractParty, PartyAndReference};
use crate::crypto::PublicKey;
use serde::{Deserialize, Serialize};
use std::fmt;

/// An amount of cash issued by `issuer` and currently owned by `owner`.
///
/// Cash from different issuers is not fungible on the ledger, but settlement
/// only cares about the currency, so the contract ignores the issuer there.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CashState {
    pub amount: Amount,
    pub issuer: PartyAndReference,
    pub owner: AbstractParty,
}

impl CashState {
    pub fn new(amount: Amount, issuer: PartyAndReference, owner: AbstractParty) -> Self {
        Self {
            amount,
            issuer,
            owner,
        }
    }

    pub fn with_new_owner(&self, owner: AbstractParty) -> CashState {
        CashState {
            owner,
            ..self.clone()
        }
    }

    pub fn owner_key(&self) -> PublicKey {
        self.owner.owning_key()
    }
}

impl fmt::Display for CashState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} issued by {} owned by {}",
            self.amount, self.issuer.party, self.owner
        )
    }
}

//! The closed set of states a transaction can consume or produce.

use super::cash::CashState;
use super::ids::StateRef;
use super::obligation::Obligation;
use super::party::AbstractParty;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum LedgerState {
    Obligation(Obligation),
    Cash(CashState),
}

impl LedgerState {
    /// Parties that must record a transaction producing this state.
    pub fn participants(&self) -> Vec<AbstractParty> {
        match self {
            Self::Obligation(ob) => ob.participants(),
            Self::Cash(cash) => vec![cash.owner.clone()],
        }
    }

    pub fn as_obligation(&self) -> Option<&Obligation> {
        match self {
            Self::Obligation(ob) => Some(ob),
            Self::Cash(_) => None,
        }
    }

    pub fn as_cash(&self) -> Option<&CashState> {
        match self {
            Self::Cash(cash) => Some(cash),
            Self::Obligation(_) => None,
        }
    }
}

impl From<Obligation> for LedgerState {
    fn from(ob: Obligation) -> Self {
        Self::Obligation(ob)
    }
}

impl From<CashState> for LedgerState {
    fn from(cash: CashState) -> Self {
        Self::Cash(cash)
    }
}

/// A state together with its provenance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateAndRef {
    pub state: LedgerState,
    pub reference: StateRef,
}

impl StateAndRef {
    pub fn new(state: LedgerState, reference: StateRef) -> Self {
        Self { state, reference }
    }
}

//! # Ledger Vocabulary
//!
//! Value types that live on the ledger: amounts, identifiers, parties and the
//! two state kinds (obligations and cash). All of them are immutable values;
//! a "change" is always a new value plus a transaction that consumes the old.

pub mod amount;
pub mod cash;
pub mod ids;
pub mod obligation;
pub mod party;
pub mod state;

pub use amount::{Amount, AmountError, Currency};
pub use cash::CashState;
pub use ids::{StateRef, UniqueIdentifier};
pub use obligation::{Obligation, ObligationWithoutLender};
pub use party::{AbstractParty, AnonymousParty, Party, PartyAndReference};
pub use state::{LedgerState, StateAndRef};

//! # Obligation Ledger Contracts
//!
//! The rules that decide whether a proposed transaction is a legal state
//! transition:
//!
//! - **Obligation**: issue, transfer and settle of bilateral debts.
//! - **Cash**: issue and move of the asset that settles them.
//!
//! ## Design Principles
//!
//! 1. Contracts are pure functions of transaction content. No storage, no
//!    network, no clock: every party reaches the same verdict.
//! 2. One error variant per rule clause, so a rejection names the clause.
//! 3. All amount arithmetic is checked.
//! 4. Signatures are not checked here. A contract checks the signer set a
//!    command *asserts*; the transaction layer checks that those keys signed.

pub mod cash;
pub mod error;
pub mod obligation;

pub use cash::CashContract;
pub use error::{CashViolation, ContractError, RuleViolation};
pub use obligation::ObligationContract;

use obligation_protocol::transaction::WireTransaction;

/// Runs every contract that governs a state or command in `tx`.
pub fn verify_transaction(tx: &WireTransaction) -> Result<(), ContractError> {
    if ObligationContract::applies_to(tx) {
        ObligationContract::verify(tx)?;
    }
    if CashContract::applies_to(tx) {
        CashContract::verify(tx)?;
    }
    Ok(())
}

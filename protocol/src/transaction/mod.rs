//! # Transaction Module
//!
//! Construction, hashing and signing of ledger transactions.
//!
//! ```text
//! types.rs   : Commands (Obligation / Cash) and notarisation time windows
//! builder.rs : Mutable TransactionBuilder, frozen into a WireTransaction
//! wire.rs    : Immutable, content-addressed WireTransaction
//! signing.rs : TransactionSignature and the SignedTransaction envelope
//! error.rs   : TransactionError
//! ```
//!
//! ## Lifecycle
//!
//! 1. **Build**: flows and the cash service fill a [`TransactionBuilder`].
//! 2. **Freeze**: [`TransactionBuilder::to_wire_transaction`] computes the id.
//! 3. **Sign**: every required party signs the id.
//! 4. **Notarise**: the notary adds its signature, which is also its timestamp.
//!
//! Contract verification is not here; it lives in the contracts crate so that
//! this crate stays free of business rules.

pub mod builder;
pub mod error;
pub mod signing;
pub mod types;
pub mod wire;

pub use builder::TransactionBuilder;
pub use error::TransactionError;
pub use signing::{SignedTransaction, TransactionSignature};
pub use types::{CashCommand, Command, CommandData, ObligationCommand, TimeWindow};
pub use wire::WireTransaction;

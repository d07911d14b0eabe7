//! Errors raised while building, hashing or signature-checking transactions.

use crate::crypto::{PublicKey, SecureHash};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TransactionError {
    /// The transaction content could not be encoded for hashing.
    #[error("transaction encoding failed: {0}")]
    Encoding(String),

    /// The carried id does not match the content. The transaction was
    /// tampered with or corrupted in transit.
    #[error("transaction id mismatch: carried {carried}, computed {computed}")]
    IdMismatch {
        carried: SecureHash,
        computed: SecureHash,
    },

    /// A signature does not verify against the transaction id.
    #[error("invalid signature by {by} on transaction {tx_id}")]
    InvalidSignature { tx_id: SecureHash, by: PublicKey },

    /// A signature from a key that no command or notary requires.
    #[error("unexpected signer {by} on transaction {tx_id}")]
    UnexpectedSigner { tx_id: SecureHash, by: PublicKey },

    /// Required keys that have not signed yet.
    #[error("transaction {tx_id} is missing signatures from {missing:?}")]
    MissingSignatures {
        tx_id: SecureHash,
        missing: Vec<PublicKey>,
    },
}

impl From<bincode::Error> for TransactionError {
    fn from(e: bincode::Error) -> Self {
        TransactionError::Encoding(e.to_string())
    }
}

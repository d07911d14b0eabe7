//! # Cryptographic Primitives
//!
//! Every signature and every transaction id on the ledger flows through here.
//!
//! - **Ed25519** for signatures: parties, notaries and identity certificates.
//! - **SHA-256** for transaction content hashes.
//! - **BLAKE3** for domain-separated certificate payloads.
//!
//! Everything is a thin, type-safe wrapper around audited implementations.

pub mod hash;
pub mod keys;

pub use hash::{domain_separated_hash, sha256, SecureHash};
pub use keys::{KeyError, KeyPair, PublicKey, Signature};

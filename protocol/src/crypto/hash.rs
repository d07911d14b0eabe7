//! # Hashing Utilities
//!
//! Two hash functions, two jobs:
//!
//! - **SHA-256** for transaction ids. The id is what every participant signs,
//!   so it has to be boring and universally available.
//! - **BLAKE3** (derive-key mode) for identity certificate payloads, where the
//!   built-in domain separation keeps a certificate signature from ever being
//!   replayable as a transaction signature.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

/// A 32-byte digest. Transaction ids are `SecureHash`es.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SecureHash([u8; 32]);

impl SecureHash {
    /// The all-zero hash. Never the id of a real transaction.
    pub const ZERO: SecureHash = SecureHash([0u8; 32]);

    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Parses a 64-character hex string. Returns `None` on any malformed input.
    pub fn from_hex(s: &str) -> Option<Self> {
        let bytes = hex::decode(s).ok()?;
        let arr: [u8; 32] = bytes.as_slice().try_into().ok()?;
        Some(Self(arr))
    }
}

impl fmt::Display for SecureHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl fmt::Debug for SecureHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SecureHash({}..)", &self.to_hex()[..12])
    }
}

/// Compute the SHA-256 hash of the input data.
///
/// # Example
///
/// ```
/// use obligation_protocol::crypto::sha256;
///
/// let hash = sha256(b"obligation");
/// assert_eq!(hash.as_bytes().len(), 32);
/// ```
pub fn sha256(data: &[u8]) -> SecureHash {
    let mut hasher = Sha256::new();
    hasher.update(data);
    let mut output = [0u8; 32];
    output.copy_from_slice(&hasher.finalize());
    SecureHash(output)
}

/// Compute a domain-separated hash using BLAKE3 with a context string.
///
/// `derive_key` uses a different internal IV per context, so two contexts
/// never collide even on identical data.
pub fn domain_separated_hash(context: &str, data: &[u8]) -> [u8; 32] {
    let mut hasher = blake3::Hasher::new_derive_key(context);
    hasher.update(data);
    *hasher.finalize().as_bytes()
}

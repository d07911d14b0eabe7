//! Signatures over transaction ids, and the signed transaction envelope.
//!
//! Each signature covers `id || signed_at` so that the notary's signature
//! doubles as its timestamp. A [`SignedTransaction`] accumulates signatures
//! as it travels between parties; nothing here decides *whether* a key
//! should sign, only whether the signatures present are genuine and complete.

use super::error::TransactionError;
use super::wire::WireTransaction;
use crate::crypto::{KeyPair, PublicKey, SecureHash, Signature};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// One party's signature over a transaction id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionSignature {
    pub by: PublicKey,
    pub signed_at: DateTime<Utc>,
    pub signature: Signature,
}

fn signable_bytes(tx_id: SecureHash, signed_at: DateTime<Utc>) -> Vec<u8> {
    let mut buf = Vec::with_capacity(40);
    buf.extend_from_slice(tx_id.as_bytes());
    buf.extend_from_slice(&signed_at.timestamp_millis().to_le_bytes());
    buf
}

impl TransactionSignature {
    /// Signs `tx_id` now.
    pub fn create(keypair: &KeyPair, tx_id: SecureHash) -> Self {
        let signed_at = Utc::now();
        Self {
            by: keypair.public_key(),
            signed_at,
            signature: keypair.sign(&signable_bytes(tx_id, signed_at)),
        }
    }

    pub fn verify(&self, tx_id: SecureHash) -> bool {
        self.by
            .verify(&signable_bytes(tx_id, self.signed_at), &self.signature)
    }
}

// ---------------------------------------------------------------------------
// SignedTransaction
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignedTransaction {
    pub tx: WireTransaction,
    pub sigs: Vec<TransactionSignature>,
}

impl SignedTransaction {
    pub fn new(tx: WireTransaction, sigs: Vec<TransactionSignature>) -> Self {
        Self { tx, sigs }
    }

    pub fn id(&self) -> SecureHash {
        self.tx.id()
    }

    /// A copy with `sig` appended. A second signature by the same key
    /// replaces the first.
    pub fn with_signature(&self, sig: TransactionSignature) -> Self {
        let mut sigs: Vec<TransactionSignature> =
            self.sigs.iter().filter(|s| s.by != sig.by).cloned().collect();
        sigs.push(sig);
        Self {
            tx: self.tx.clone(),
            sigs,
        }
    }

    pub fn with_signatures(&self, sigs: impl IntoIterator<Item = TransactionSignature>) -> Self {
        sigs.into_iter()
            .fold(self.clone(), |stx, sig| stx.with_signature(sig))
    }

    /// Keys that have signed, valid or not.
    pub fn signing_keys(&self) -> BTreeSet<PublicKey> {
        self.sigs.iter().map(|s| s.by).collect()
    }

    /// Required keys with no signature yet.
    pub fn missing_signers(&self) -> BTreeSet<PublicKey> {
        let signed = self.signing_keys();
        self.tx
            .required_signing_keys()
            .into_iter()
            .filter(|k| !signed.contains(k))
            .collect()
    }

    /// Checks the id, every present signature, and that every required key
    /// other than those in `allowed_to_be_missing` has signed.
    pub fn verify_signatures_except(
        &self,
        allowed_to_be_missing: &BTreeSet<PublicKey>,
    ) -> Result<(), TransactionError> {
        self.tx.check_id()?;
        let tx_id = self.id();
        let required = self.tx.required_signing_keys();

        for sig in &self.sigs {
            if !required.contains(&sig.by) {
                return Err(TransactionError::UnexpectedSigner { tx_id, by: sig.by });
            }
            if !sig.verify(tx_id) {
                return Err(TransactionError::InvalidSignature { tx_id, by: sig.by });
            }
        }

        let missing: Vec<PublicKey> = self
            .missing_signers()
            .into_iter()
            .filter(|k| !allowed_to_be_missing.contains(k))
            .collect();
        if !missing.is_empty() {
            return Err(TransactionError::MissingSignatures { tx_id, missing });
        }
        Ok(())
    }

    /// Every required signature present and valid.
    pub fn verify_required_signatures(&self) -> Result<(), TransactionError> {
        self.verify_signatures_except(&BTreeSet::new())
    }
}

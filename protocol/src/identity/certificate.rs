//! Identity certificates: the proof that an anonymous key belongs to a
//! well-known party.
//!
//! A certificate carries two signatures over the same domain-separated
//! payload `(anonymous key, owner name, owner key)`:
//!
//! 1. the **owner** signs with its well-known key, vouching for the binding;
//! 2. the **anonymous** key signs too, proving the owner actually holds it.
//!
//! Without (2) a party could claim someone else's anonymous key as its own.

use super::IdentityError;
use crate::config::CERTIFICATE_DOMAIN;
use crate::crypto::{domain_separated_hash, KeyPair, PublicKey, Signature};
use crate::ledger::{AnonymousParty, Party};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentityCertificate {
    pub anonymous_key: PublicKey,
    pub owner: Party,
    pub owner_signature: Signature,
    pub possession_signature: Signature,
}

#[derive(Serialize)]
struct Binding<'a> {
    anonymous_key: &'a PublicKey,
    owner_name: &'a str,
    owner_key: &'a PublicKey,
}

fn binding_payload(anonymous_key: &PublicKey, owner: &Party) -> Result<[u8; 32], IdentityError> {
    let encoded = bincode::serialize(&Binding {
        anonymous_key,
        owner_name: &owner.name,
        owner_key: &owner.owning_key,
    })
    .map_err(|e| IdentityError::CertificateInvalid {
        reason: e.to_string(),
    })?;
    Ok(domain_separated_hash(CERTIFICATE_DOMAIN, &encoded))
}

impl IdentityCertificate {
    /// Binds `anonymous` to `owner`. `owner_keys` must be the owner's
    /// well-known keypair.
    pub fn issue(
        owner: &Party,
        owner_keys: &KeyPair,
        anonymous: &KeyPair,
    ) -> Result<Self, IdentityError> {
        if owner_keys.public_key() != owner.owning_key {
            return Err(IdentityError::CertificateInvalid {
                reason: "owner keypair does not match owner identity".into(),
            });
        }
        let anonymous_key = anonymous.public_key();
        let payload = binding_payload(&anonymous_key, owner)?;
        Ok(Self {
            anonymous_key,
            owner: owner.clone(),
            owner_signature: owner_keys.sign(&payload),
            possession_signature: anonymous.sign(&payload),
        })
    }

    pub fn anonymous_party(&self) -> AnonymousParty {
        AnonymousParty::new(self.anonymous_key)
    }

    /// Checks both signatures.
    pub fn verify(&self) -> Result<(), IdentityError> {
        let payload = binding_payload(&self.anonymous_key, &self.owner)?;
        if !self.owner.owning_key.verify(&payload, &self.owner_signature) {
            return Err(IdentityError::CertificateInvalid {
                reason: format!("owner signature by {} does not verify", self.owner.name),
            });
        }
        if !self.anonymous_key.verify(&payload, &self.possession_signature) {
            return Err(IdentityError::CertificateInvalid {
                reason: "possession signature does not verify".into(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn owner() -> (Party, KeyPair) {
        let kp = KeyPair::generate();
        (Party::new("Alice", kp.public_key()), kp)
    }

    #[test]
    fn issued_certificate_verifies() {
        let (alice, keys) = owner();
        let anon = KeyPair::generate();
        let cert = IdentityCertificate::issue(&alice, &keys, &anon).unwrap();
        cert.verify().unwrap();
        assert_eq!(cert.anonymous_party().owning_key, anon.public_key());
    }

    #[test]
    fn wrong_owner_keys_rejected_at_issue() {
        let (alice, _) = owner();
        let impostor = KeyPair::generate();
        assert!(IdentityCertificate::issue(&alice, &impostor, &KeyPair::generate()).is_err());
    }

    #[test]
    fn claiming_someone_elses_key_fails() {
        let (alice, keys) = owner();
        let mut cert = IdentityCertificate::issue(&alice, &keys, &KeyPair::generate()).unwrap();
        // Swap in a key Alice does not hold.
        cert.anonymous_key = KeyPair::generate().public_key();
        assert!(cert.verify().is_err());
    }

    #[test]
    fn renamed_owner_fails() {
        let (alice, keys) = owner();
        let mut cert = IdentityCertificate::issue(&alice, &keys, &KeyPair::generate()).unwrap();
        cert.owner.name = "Mallory".into();
        assert!(cert.verify().is_err());
    }
}

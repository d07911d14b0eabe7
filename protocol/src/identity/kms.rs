//! Key management: the node's legal identity plus every fresh key it mints.

use super::certificate::IdentityCertificate;
use super::IdentityError;
use crate::crypto::{KeyError, KeyPair, PublicKey, SecureHash};
use crate::ledger::Party;
use crate::transaction::TransactionSignature;
use dashmap::DashMap;
use tracing::debug;

/// Holds private keys. Never hands a keypair out; callers ask it to sign.
#[derive(Debug)]
pub struct KeyManagementService {
    legal_identity: Party,
    keys: DashMap<PublicKey, KeyPair>,
}

impl KeyManagementService {
    /// A node named `name` with a freshly generated legal identity key.
    pub fn generate(name: impl Into<String>) -> Self {
        Self::from_keypair(name, KeyPair::generate())
    }

    pub fn from_keypair(name: impl Into<String>, legal_keys: KeyPair) -> Self {
        let legal_identity = Party::new(name, legal_keys.public_key());
        let keys = DashMap::new();
        keys.insert(legal_keys.public_key(), legal_keys);
        Self {
            legal_identity,
            keys,
        }
    }

    pub fn legal_identity(&self) -> &Party {
        &self.legal_identity
    }

    pub fn owns(&self, key: &PublicKey) -> bool {
        self.keys.contains_key(key)
    }

    /// Mints a fresh anonymous key and a certificate binding it to the legal
    /// identity.
    pub fn fresh_key_and_cert(&self) -> Result<IdentityCertificate, IdentityError> {
        let anonymous = KeyPair::generate();
        let cert = {
            let legal = self
                .keys
                .get(&self.legal_identity.owning_key)
                .ok_or(IdentityError::Key(KeyError::UnknownKey(
                    self.legal_identity.owning_key,
                )))?;
            IdentityCertificate::issue(&self.legal_identity, legal.value(), &anonymous)?
        };
        debug!(
            owner = %self.legal_identity.name,
            anonymous_key = %cert.anonymous_key,
            "minted confidential identity"
        );
        self.keys.insert(anonymous.public_key(), anonymous);
        Ok(cert)
    }

    /// Signs `tx_id` with the private half of `key`.
    pub fn sign(&self, key: &PublicKey, tx_id: SecureHash) -> Result<TransactionSignature, KeyError> {
        let keypair = self.keys.get(key).ok_or(KeyError::UnknownKey(*key))?;
        Ok(TransactionSignature::create(keypair.value(), tx_id))
    }

    /// Signs with every key in `keys` that this node holds; unknown keys are skipped.
    pub fn sign_with_owned<'a>(
        &self,
        keys: impl IntoIterator<Item = &'a PublicKey>,
        tx_id: SecureHash,
    ) -> Vec<TransactionSignature> {
        keys.into_iter()
            .filter_map(|k| self.sign(k, tx_id).ok())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_keys_are_owned_and_certified() {
        let kms = KeyManagementService::generate("Alice");
        let cert = kms.fresh_key_and_cert().unwrap();
        assert!(kms.owns(&cert.anonymous_key));
        assert_eq!(cert.owner, *kms.legal_identity());
        cert.verify().unwrap();
    }

    #[test]
    fn signing_with_foreign_key_fails() {
        let kms = KeyManagementService::generate("Alice");
        let foreign = KeyPair::generate().public_key();
        assert!(matches!(
            kms.sign(&foreign, SecureHash::ZERO),
            Err(KeyError::UnknownKey(k)) if k == foreign
        ));
    }

    #[test]
    fn sign_with_owned_skips_unknown_keys() {
        let kms = KeyManagementService::generate("Alice");
        let mine = kms.legal_identity().owning_key;
        let foreign = KeyPair::generate().public_key();
        let sigs = kms.sign_with_owned([&mine, &foreign], SecureHash::ZERO);
        assert_eq!(sigs.len(), 1);
        assert!(sigs[0].verify(SecureHash::ZERO));
    }
}

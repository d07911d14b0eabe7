//! Identity resolution: anonymous key to well-known party.

use super::certificate::IdentityCertificate;
use super::IdentityError;
use crate::crypto::PublicKey;
use crate::ledger::{AbstractParty, Party};
use dashmap::DashMap;
use tracing::debug;

/// Maps keys to the well-known parties that own them.
///
/// Lookups are local (the node's own cache of certificates and the network
/// map), so the trait is synchronous.
pub trait IdentityService: Send + Sync {
    /// The well-known owner of `key`.
    fn resolve(&self, key: &PublicKey) -> Result<Party, IdentityError>;

    /// Verifies and stores a certificate. Registering the same binding twice
    /// is a no-op; rebinding a key to a different owner is an error.
    fn register_certificate(&self, cert: IdentityCertificate) -> Result<(), IdentityError>;

    fn certificate(&self, anonymous_key: &PublicKey) -> Option<IdentityCertificate>;

    fn register_well_known(&self, party: Party);

    /// Resolves either kind of party reference to a well-known identity.
    fn well_known_party(&self, party: &AbstractParty) -> Result<Party, IdentityError> {
        match party {
            AbstractParty::WellKnown(p) => Ok(p.clone()),
            AbstractParty::Anonymous(a) => self.resolve(&a.owning_key),
        }
    }
}

#[derive(Debug, Default)]
pub struct InMemoryIdentityService {
    well_known: DashMap<PublicKey, Party>,
    certificates: DashMap<PublicKey, IdentityCertificate>,
}

impl InMemoryIdentityService {
    pub fn new() -> Self {
        Self::default()
    }
}

impl IdentityService for InMemoryIdentityService {
    fn resolve(&self, key: &PublicKey) -> Result<Party, IdentityError> {
        if let Some(p) = self.well_known.get(key) {
            return Ok(p.value().clone());
        }
        self.certificates
            .get(key)
            .map(|c| c.owner.clone())
            .ok_or(IdentityError::Unresolvable(*key))
    }

    fn register_certificate(&self, cert: IdentityCertificate) -> Result<(), IdentityError> {
        cert.verify()?;
        if let Some(existing) = self.certificates.get(&cert.anonymous_key) {
            if existing.owner != cert.owner {
                return Err(IdentityError::CertificateInvalid {
                    reason: format!(
                        "key {} already bound to {}",
                        cert.anonymous_key, existing.owner
                    ),
                });
            }
            return Ok(());
        }
        debug!(
            anonymous_key = %cert.anonymous_key,
            owner = %cert.owner,
            "registered identity certificate"
        );
        self.certificates.insert(cert.anonymous_key, cert);
        Ok(())
    }

    fn certificate(&self, anonymous_key: &PublicKey) -> Option<IdentityCertificate> {
        self.certificates.get(anonymous_key).map(|c| c.value().clone())
    }

    fn register_well_known(&self, party: Party) {
        self.well_known.insert(party.owning_key, party);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::KeyPair;
    use crate::identity::kms::KeyManagementService;
    use crate::ledger::AnonymousParty;

    #[test]
    fn resolves_well_known_and_certified_keys() {
        let ids = InMemoryIdentityService::new();
        let alice = KeyManagementService::generate("Alice");
        ids.register_well_known(alice.legal_identity().clone());

        let cert = alice.fresh_key_and_cert().unwrap();
        let anon = AbstractParty::from(cert.anonymous_party());
        assert!(matches!(
            ids.well_known_party(&anon),
            Err(IdentityError::Unresolvable(_))
        ));

        ids.register_certificate(cert).unwrap();
        assert_eq!(ids.well_known_party(&anon).unwrap().name, "Alice");
    }

    #[test]
    fn tampered_certificate_is_not_registered() {
        let ids = InMemoryIdentityService::new();
        let alice = KeyManagementService::generate("Alice");
        let mut cert = alice.fresh_key_and_cert().unwrap();
        cert.owner = Party::new("Alice", KeyPair::generate().public_key());
        assert!(ids.register_certificate(cert.clone()).is_err());
        assert!(ids.certificate(&cert.anonymous_key).is_none());
    }

    #[test]
    fn unknown_key_is_unresolvable() {
        let ids = InMemoryIdentityService::new();
        let key = KeyPair::generate().public_key();
        assert!(ids
            .well_known_party(&AnonymousParty::new(key).into())
            .is_err());
    }
}

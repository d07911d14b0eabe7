//! The services a flow runs against.

use crate::checkpoint::CheckpointStore;
use crate::error::FlowError;
use obligation_protocol::config::FlowConfig;
use obligation_protocol::crypto::PublicKey;
use obligation_protocol::identity::{
    IdentityCertificate, IdentityError, IdentityService, KeyManagementService,
};
use obligation_protocol::ledger::{AbstractParty, Party};
use obligation_protocol::services::{
    CashService, NetworkMap, NotaryService, SessionTransport, StateStore,
};
use obligation_protocol::transaction::WireTransaction;
use std::sync::Arc;

/// Everything a node lends to the flows it runs.
pub struct ServiceHub {
    pub keys: Arc<KeyManagementService>,
    pub identity: Arc<dyn IdentityService>,
    pub vault: Arc<dyn StateStore>,
    pub cash: Arc<dyn CashService>,
    pub network_map: Arc<dyn NetworkMap>,
    pub transport: Arc<dyn SessionTransport>,
    pub checkpoints: Arc<dyn CheckpointStore>,
    pub config: FlowConfig,
}

impl ServiceHub {
    pub fn me(&self) -> &Party {
        self.keys.legal_identity()
    }

    /// The well-known owner of `key`: a certified confidential key, or a
    /// legal identity from the network map.
    pub fn resolve_key(&self, key: &PublicKey) -> Option<Party> {
        self.identity.resolve(key).ok().or_else(|| {
            self.network_map
                .all_parties()
                .into_iter()
                .find(|p| &p.owning_key == key)
        })
    }

    pub fn well_known(&self, party: &AbstractParty) -> Result<Party, FlowError> {
        match party {
            AbstractParty::WellKnown(p) => Ok(p.clone()),
            AbstractParty::Anonymous(a) => self
                .resolve_key(&a.owning_key)
                .ok_or_else(|| IdentityError::Unresolvable(a.owning_key).into()),
        }
    }

    /// First advertised notary.
    pub fn select_notary(&self) -> Result<(Party, Arc<dyn NotaryService>), FlowError> {
        let party = self
            .network_map
            .notary_identities()
            .into_iter()
            .next()
            .ok_or(FlowError::NoNotaryAvailable)?;
        let service = self
            .network_map
            .notary_service(&party)
            .ok_or(FlowError::NoNotaryAvailable)?;
        Ok((party, service))
    }

    /// Certificates for every anonymous participant of `tx` this node can
    /// vouch for.
    pub fn certificates_for(&self, tx: &WireTransaction) -> Vec<IdentityCertificate> {
        tx.inputs()
            .iter()
            .map(|i| &i.state)
            .chain(tx.outputs().iter())
            .flat_map(|s| s.participants())
            .filter(|p| p.is_anonymous())
            .filter_map(|p| self.identity.certificate(&p.owning_key()))
            .fold(Vec::new(), |mut certs, cert| {
                if !certs.iter().any(|c: &IdentityCertificate| c.anonymous_key == cert.anonymous_key) {
                    certs.push(cert);
                }
                certs
            })
    }

    /// Mints a confidential identity and registers its certificate locally.
    pub fn fresh_identity(&self) -> Result<IdentityCertificate, FlowError> {
        let cert = self.keys.fresh_key_and_cert()?;
        self.identity.register_certificate(cert.clone())?;
        Ok(cert)
    }
}

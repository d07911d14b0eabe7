//! The network map: who is on the network, and which notaries it advertises.

use super::notary::NotaryService;
use crate::ledger::Party;
use parking_lot::RwLock;
use std::sync::Arc;

pub trait NetworkMap: Send + Sync {
    /// Every registered node identity, notaries excluded.
    fn all_parties(&self) -> Vec<Party>;

    fn party_from_name(&self, name: &str) -> Option<Party>;

    /// Notary identities in advertisement order.
    fn notary_identities(&self) -> Vec<Party>;

    /// A handle to the notary service behind `notary`.
    fn notary_service(&self, notary: &Party) -> Option<Arc<dyn NotaryService>>;
}

#[derive(Default)]
pub struct InMemoryNetworkMap {
    parties: RwLock<Vec<Party>>,
    notaries: RwLock<Vec<Arc<dyn NotaryService>>>,
}

impl InMemoryNetworkMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds `party`, replacing any previous entry with the same name.
    pub fn register_party(&self, party: Party) {
        let mut parties = self.parties.write();
        parties.retain(|p| p.name != party.name);
        parties.push(party);
    }

    pub fn register_notary(&self, notary: Arc<dyn NotaryService>) {
        self.notaries.write().push(notary);
    }
}

impl NetworkMap for InMemoryNetworkMap {
    fn all_parties(&self) -> Vec<Party> {
        self.parties.read().clone()
    }

    fn party_from_name(&self, name: &str) -> Option<Party> {
        self.parties.read().iter().find(|p| p.name == name).cloned()
    }

    fn notary_identities(&self) -> Vec<Party> {
        self.notaries
            .read()
            .iter()
            .map(|n| n.identity().clone())
            .collect()
    }

    fn notary_service(&self, notary: &Party) -> Option<Arc<dyn NotaryService>> {
        self.notaries
            .read()
            .iter()
            .find(|n| n.identity() == notary)
            .cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::KeyPair;
    use crate::services::notary::InMemoryNotary;

    #[test]
    fn lookup_by_name_and_notary() {
        let map = InMemoryNetworkMap::new();
        assert!(map.notary_identities().is_empty());

        let alice = Party::new("Alice", KeyPair::generate().public_key());
        map.register_party(alice.clone());
        let notary: Arc<dyn NotaryService> = Arc::new(InMemoryNotary::new("Notary"));
        map.register_notary(notary.clone());

        assert_eq!(map.party_from_name("Alice"), Some(alice));
        assert!(map.party_from_name("Bob").is_none());
        assert_eq!(map.notary_identities(), vec![notary.identity().clone()]);
        assert!(map.notary_service(notary.identity()).is_some());
    }

    #[test]
    fn reregistering_replaces() {
        let map = InMemoryNetworkMap::new();
        map.register_party(Party::new("Alice", KeyPair::generate().public_key()));
        let rotated = Party::new("Alice", KeyPair::generate().public_key());
        map.register_party(rotated.clone());
        assert_eq!(map.all_parties(), vec![rotated]);
    }
}

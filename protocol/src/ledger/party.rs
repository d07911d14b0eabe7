//! Party references.
//!
//! A party is either well-known (a legal name plus its public key, as listed
//! on the network map) or anonymous (a bare key minted during a confidential
//! identity exchange). Equality is always by key: two references to the same
//! key are the same party no matter how they were obtained.

use crate::crypto::PublicKey;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::hash::{Hash, Hasher};

/// A well-known identity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Party {
    pub name: String,
    pub owning_key: PublicKey,
}

impl Party {
    pub fn new(name: impl Into<String>, owning_key: PublicKey) -> Self {
        Self {
            name: name.into(),
            owning_key,
        }
    }

    pub fn anonymise(&self) -> AnonymousParty {
        AnonymousParty::new(self.owning_key)
    }
}

impl PartialEq for Party {
    fn eq(&self, other: &Self) -> bool {
        self.owning_key == other.owning_key
    }
}

impl Eq for Party {}

impl Hash for Party {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.owning_key.hash(state);
    }
}

impl fmt::Display for Party {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

/// A key-only identity, resolvable to exactly one [`Party`] by whoever holds
/// its certificate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AnonymousParty {
    pub owning_key: PublicKey,
}

impl AnonymousParty {
    pub fn new(owning_key: PublicKey) -> Self {
        Self { owning_key }
    }
}

impl fmt::Display for AnonymousParty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.owning_key.to_base58())
    }
}

/// Either kind of party, as stored in ledger states.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum AbstractParty {
    WellKnown(Party),
    Anonymous(AnonymousParty),
}

impl AbstractParty {
    pub fn owning_key(&self) -> PublicKey {
        match self {
            Self::WellKnown(p) => p.owning_key,
            Self::Anonymous(a) => a.owning_key,
        }
    }

    /// The well-known identity, if this reference already carries one.
    pub fn well_known(&self) -> Option<&Party> {
        match self {
            Self::WellKnown(p) => Some(p),
            Self::Anonymous(_) => None,
        }
    }

    pub fn is_anonymous(&self) -> bool {
        matches!(self, Self::Anonymous(_))
    }
}

impl PartialEq for AbstractParty {
    fn eq(&self, other: &Self) -> bool {
        self.owning_key() == other.owning_key()
    }
}

impl Eq for AbstractParty {}

impl Hash for AbstractParty {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.owning_key().hash(state);
    }
}

impl fmt::Display for AbstractParty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::WellKnown(p) => p.fmt(f),
            Self::Anonymous(a) => a.fmt(f),
        }
    }
}

impl From<Party> for AbstractParty {
    fn from(p: Party) -> Self {
        Self::WellKnown(p)
    }
}

impl From<AnonymousParty> for AbstractParty {
    fn from(a: AnonymousParty) -> Self {
        Self::Anonymous(a)
    }
}

/// A party plus an opaque reference, used to tag the issuer of cash.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PartyAndReference {
    pub party: AbstractParty,
    pub reference: Vec<u8>,
}

impl PartyAndReference {
    pub fn new(party: impl Into<AbstractParty>, reference: impl Into<Vec<u8>>) -> Self {
        Self {
            party: party.into(),
            reference: reference.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::KeyPair;

    #[test]
    fn equality_is_by_key() {
        let key = KeyPair::generate().public_key();
        let named = AbstractParty::from(Party::new("Alice", key));
        let anon = AbstractParty::from(AnonymousParty::new(key));
        assert_eq!(named, anon);

        let renamed = Party::new("Alicia", key);
        assert_eq!(Party::new("Alice", key), renamed);
    }

    #[test]
    fn display_uses_name_or_base58() {
        let key = KeyPair::generate().public_key();
        assert_eq!(AbstractParty::from(Party::new("Bob", key)).to_string(), "Bob");
        assert_eq!(
            AbstractParty::from(AnonymousParty::new(key)).to_string(),
            key.to_base58()
        );
    }
}

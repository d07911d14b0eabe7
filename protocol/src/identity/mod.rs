//! # Identity Module
//!
//! Who owns which key.
//!
//! 1. **KeyManagementService**: private keys of this node, the legal identity
//!    key plus every confidential key minted for a transaction.
//! 2. **IdentityCertificate**: a doubly-signed binding of an anonymous key to
//!    its well-known owner. Shipped to counterparties so they can resolve it.
//! 3. **IdentityService**: the resolution cache built from the network map
//!    and verified certificates.

pub mod certificate;
pub mod kms;
pub mod service;

pub use certificate::IdentityCertificate;
pub use kms::KeyManagementService;
pub use service::{IdentityService, InMemoryIdentityService};

use crate::crypto::{KeyError, PublicKey};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum IdentityError {
    /// No well-known party is known for this key.
    #[error("cannot resolve key {0} to a well-known party")]
    Unresolvable(PublicKey),

    /// A certificate failed signature checks or contradicts a known binding.
    #[error("invalid identity certificate: {reason}")]
    CertificateInvalid { reason: String },

    #[error(transparent)]
    Key(#[from] KeyError),
}

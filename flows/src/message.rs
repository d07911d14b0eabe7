//! Messages exchanged over a flow session.
//!
//! Every payload is a bincode-encoded [`Envelope`] stamped with
//! [`WIRE_PROTOCOL_VERSION`]. A peer speaking another version is refused at
//! decode time rather than misread.
//!
//! ```text
//! initiator                                   responder
//!   IdentityRequest          ------------>                 (anonymous only)
//!                            <------------   IdentityOffer
//!   IdentityOffer            ------------>
//!   Propose{stx, certs}      ------------>
//!                            <------------   Signatures | Decline
//!   Finalized | Abort        ------------>
//!                            <------------   Recorded
//! ```

use obligation_protocol::config::WIRE_PROTOCOL_VERSION;
use obligation_protocol::crypto::SecureHash;
use obligation_protocol::identity::IdentityCertificate;
use obligation_protocol::services::SessionError;
use obligation_protocol::transaction::{SignedTransaction, TransactionSignature};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum FlowMessage {
    /// Asks the counterparty for a fresh confidential identity.
    IdentityRequest,
    IdentityOffer {
        certificate: IdentityCertificate,
    },
    /// A proposal signed by the initiator, plus certificates for the
    /// anonymous participants the initiator can vouch for.
    Propose {
        stx: SignedTransaction,
        certificates: Vec<IdentityCertificate>,
    },
    Signatures(Vec<TransactionSignature>),
    Decline {
        reason: String,
    },
    /// The notarised transaction, ready to record.
    Finalized {
        stx: SignedTransaction,
    },
    Abort {
        reason: String,
    },
    Recorded {
        tx_id: SecureHash,
    },
}

#[derive(Serialize, Deserialize)]
struct Envelope {
    version: u16,
    message: FlowMessage,
}

impl FlowMessage {
    /// Variant name, for logs and protocol-violation errors.
    pub fn kind(&self) -> &'static str {
        match self {
            FlowMessage::IdentityRequest => "IdentityRequest",
            FlowMessage::IdentityOffer { .. } => "IdentityOffer",
            FlowMessage::Propose { .. } => "Propose",
            FlowMessage::Signatures(_) => "Signatures",
            FlowMessage::Decline { .. } => "Decline",
            FlowMessage::Finalized { .. } => "Finalized",
            FlowMessage::Abort { .. } => "Abort",
            FlowMessage::Recorded { .. } => "Recorded",
        }
    }

    pub fn encode(&self) -> Result<Vec<u8>, SessionError> {
        bincode::serialize(&Envelope {
            version: WIRE_PROTOCOL_VERSION,
            message: self.clone(),
        })
        .map_err(|e| SessionError::Codec(e.to_string()))
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, SessionError> {
        let envelope: Envelope =
            bincode::deserialize(bytes).map_err(|e| SessionError::Codec(e.to_string()))?;
        if envelope.version != WIRE_PROTOCOL_VERSION {
            return Err(SessionError::Codec(format!(
                "wire version {} not supported, expected {}",
                envelope.version, WIRE_PROTOCOL_VERSION
            )));
        }
        Ok(envelope.message)
    }
}

//! # Protocol Configuration & Constants
//!
//! Every magic number in the ledger lives here. If you're hardcoding a
//! timeout somewhere else, move it here.
//!
//! Constants are compile-time defaults. [`FlowConfig`] is the runtime knob set
//! the node hands to every flow it starts; it serializes durations as plain
//! milliseconds so config files and `OBLIGATION_*` env vars stay readable.

use serde::{Deserialize, Serialize};
use std::time::Duration;

// ---------------------------------------------------------------------------
// Protocol Version
// ---------------------------------------------------------------------------

/// The full protocol version string. Carried in every flow session handshake.
pub const PROTOCOL_VERSION: &str = "0.1.0";

/// Wire protocol version for flow messages. Bump whenever the bincode layout
/// of `FlowMessage` changes.
pub const WIRE_PROTOCOL_VERSION: u16 = 1;

// ---------------------------------------------------------------------------
// Cryptographic Parameters
// ---------------------------------------------------------------------------

/// Ed25519 for every signature on the ledger: parties, notaries, certificates.
pub const SIGNING_ALGORITHM: &str = "Ed25519";

/// Ed25519 signature length. Always 64 bytes.
pub const SIGNATURE_LENGTH: usize = 64;

/// Transaction ids are SHA-256 digests of the canonical wire encoding.
pub const TX_HASH_ALGORITHM: &str = "SHA-256";

/// Length of the random privacy salt mixed into every transaction id.
pub const PRIVACY_SALT_LENGTH: usize = 32;

/// BLAKE3 derive-key context for identity certificate payloads.
pub const CERTIFICATE_DOMAIN: &str = "obligation-ledger 2026 identity certificate v1";

// ---------------------------------------------------------------------------
// Timing Constants
// ---------------------------------------------------------------------------

/// Length of the notarisation window attached to issue transactions.
/// The notary rejects a transaction whose window does not contain its clock.
pub const DEFAULT_TIME_WINDOW: Duration = Duration::from_secs(30);

/// How long a flow waits for any single counterparty message.
pub const DEFAULT_SESSION_TIMEOUT: Duration = Duration::from_secs(30);

/// How long the initiator waits for every certificate during an identity swap.
pub const DEFAULT_IDENTITY_EXCHANGE_TIMEOUT: Duration = Duration::from_secs(10);

/// How long a responder waits for the finalized transaction after signing.
pub const DEFAULT_COMMIT_TIMEOUT: Duration = Duration::from_secs(60);

// ---------------------------------------------------------------------------
// Network Parameters
// ---------------------------------------------------------------------------

/// Default HTTP API port of the node binary.
pub const DEFAULT_API_PORT: u16 = 10007;

/// Default metrics (Prometheus) port.
pub const DEFAULT_METRICS_PORT: u16 = 10008;

/// Capacity of each direction of an in-process flow session.
pub const SESSION_CHANNEL_CAPACITY: usize = 32;

// ---------------------------------------------------------------------------
// FlowConfig
// ---------------------------------------------------------------------------

/// Runtime timeouts shared by every flow a node runs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FlowConfig {
    /// Bound on every single `receive` from a counterparty session.
    #[serde(with = "duration_ms")]
    pub session_timeout: Duration,
    /// Bound on the whole confidential identity exchange.
    #[serde(with = "duration_ms")]
    pub identity_exchange_timeout: Duration,
    /// Bound on a responder's wait for the finalized transaction.
    #[serde(with = "duration_ms")]
    pub commit_timeout: Duration,
    /// Length of the notarisation window on issued transactions.
    #[serde(with = "duration_ms")]
    pub time_window: Duration,
}

impl Default for FlowConfig {
    fn default() -> Self {
        Self {
            session_timeout: DEFAULT_SESSION_TIMEOUT,
            identity_exchange_timeout: DEFAULT_IDENTITY_EXCHANGE_TIMEOUT,
            commit_timeout: DEFAULT_COMMIT_TIMEOUT,
            time_window: DEFAULT_TIME_WINDOW,
        }
    }
}

mod duration_ms {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        Ok(Duration::from_millis(u64::deserialize(d)?))
    }
}

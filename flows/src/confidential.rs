//! # Confidential Identity Exchange
//!
//! Swaps freshly minted keys between the initiator and its counterparties so
//! a transaction can name them without revealing who they are to anyone
//! outside the deal.
//!
//! 1. The initiator sends `IdentityRequest` to every counterparty.
//! 2. Each counterparty mints a key, certifies it against its legal identity
//!    and replies with `IdentityOffer`.
//! 3. The initiator checks every certificate (signatures valid, owner is the
//!    party the session is with), mints its own, and offers it back.
//!
//! The whole exchange is bounded by `identity_exchange_timeout`.

use crate::error::FlowError;
use crate::hub::ServiceHub;
use crate::message::FlowMessage;
use crate::sessions::{self, SessionSet};
use obligation_protocol::identity::IdentityCertificate;
use obligation_protocol::ledger::{AnonymousParty, Party};
use obligation_protocol::services::{Session, SessionError};
use std::collections::HashMap;
use tracing::{debug, info};

/// Well-known identity to the confidential identity it will use.
pub type ConfidentialIdentities = HashMap<Party, AnonymousParty>;

/// Accepts `cert` as `counterparty`'s confidential identity.
fn accept_certificate(
    hub: &ServiceHub,
    counterparty: &Party,
    cert: IdentityCertificate,
) -> Result<AnonymousParty, FlowError> {
    if &cert.owner != counterparty {
        return Err(FlowError::IdentityVerificationFailed {
            counterparty: counterparty.name.clone(),
            reason: format!("certificate is owned by {}", cert.owner),
        });
    }
    let anonymous = cert.anonymous_party();
    hub.identity
        .register_certificate(cert)
        .map_err(|e| FlowError::IdentityVerificationFailed {
            counterparty: counterparty.name.clone(),
            reason: e.to_string(),
        })?;
    Ok(anonymous)
}

fn timed_out(counterparty: &Party, hub: &ServiceHub) -> FlowError {
    FlowError::IdentityExchangeTimeout {
        counterparty: counterparty.name.clone(),
        timeout_ms: hub.config.identity_exchange_timeout.as_millis() as u64,
    }
}

/// A session timeout during the exchange is an exchange timeout.
fn exchange_error(hub: &ServiceHub, counterparty: &Party, e: FlowError) -> FlowError {
    match e {
        FlowError::SessionFailure {
            source: SessionError::Timeout { .. },
            ..
        } => timed_out(counterparty, hub),
        other => other,
    }
}

/// Initiator side. Returns an entry for every counterparty and for this node.
pub(crate) async fn request_identities(
    hub: &ServiceHub,
    sessions: &mut SessionSet,
    counterparties: &[Party],
) -> Result<ConfidentialIdentities, FlowError> {
    let deadline = hub.config.identity_exchange_timeout;
    // The counterparty whose offer we are waiting on, if any.
    let mut pending: Option<&Party> = None;
    let exchange = async {
        for party in counterparties {
            sessions.send(party, &FlowMessage::IdentityRequest).await?;
        }

        let mut identities = ConfidentialIdentities::new();
        for party in counterparties {
            pending = Some(party);
            let reply = sessions
                .receive(party, deadline)
                .await
                .map_err(|e| exchange_error(hub, party, e))?;
            let anonymous = match reply {
                FlowMessage::IdentityOffer { certificate } => {
                    accept_certificate(hub, party, certificate)?
                }
                other => {
                    return Err(FlowError::ProtocolViolation {
                        counterparty: party.name.clone(),
                        expected: "IdentityOffer",
                        received: other.kind(),
                    })
                }
            };
            identities.insert(party.clone(), anonymous);
        }
        pending = None;

        let ours = hub.fresh_identity()?;
        for party in counterparties {
            sessions
                .send(
                    party,
                    &FlowMessage::IdentityOffer {
                        certificate: ours.clone(),
                    },
                )
                .await?;
        }
        identities.insert(hub.me().clone(), ours.anonymous_party());
        Ok::<_, FlowError>(identities)
    };

    let outcome = tokio::time::timeout(deadline, exchange).await;
    let identities = match outcome {
        Ok(result) => result?,
        Err(_) => {
            let silent = pending.or(counterparties.first()).unwrap_or(hub.me());
            return Err(timed_out(silent, hub));
        }
    };
    info!(
        me = %hub.me(),
        counterparties = counterparties.len(),
        "confidential identities exchanged"
    );
    Ok(identities)
}

/// Responder side, entered after an `IdentityRequest` arrives. Returns the
/// initiator's confidential identity.
pub(crate) async fn offer_identity(
    hub: &ServiceHub,
    session: &mut dyn Session,
) -> Result<AnonymousParty, FlowError> {
    let counterparty = session.counterparty().clone();
    let ours = hub.fresh_identity()?;
    debug!(counterparty = %counterparty, key = %ours.anonymous_key, "offering confidential identity");
    sessions::send(session, &FlowMessage::IdentityOffer { certificate: ours }).await?;

    let reply = sessions::receive(session, hub.config.identity_exchange_timeout)
        .await
        .map_err(|e| exchange_error(hub, &counterparty, e))?;
    match reply {
        FlowMessage::IdentityOffer { certificate } => {
            accept_certificate(hub, &counterparty, certificate)
        }
        other => Err(FlowError::ProtocolViolation {
            counterparty: counterparty.name.clone(),
            expected: "IdentityOffer",
            received: other.kind(),
        }),
    }
}

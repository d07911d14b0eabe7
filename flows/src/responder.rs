//! # Responder
//!
//! The counterparty side of every obligation flow. One responder runs per
//! incoming session and answers whichever proposal arrives: the contracts
//! decide what is acceptable, not the flow variant.
//!
//! A responder never signs a proposal it has not verified itself, and once
//! it has signed it cannot back out: only an `Abort` from the initiator or
//! the commit timeout ends the wait. Progress is checkpointed at each wait.

use crate::checkpoint::{FlowCheckpoint, ResponderState};
use crate::confidential;
use crate::error::FlowError;
use crate::hub::ServiceHub;
use crate::message::FlowMessage;
use crate::sessions;
use obligation_contracts::verify_transaction;
use obligation_protocol::crypto::{PublicKey, SecureHash};
use obligation_protocol::identity::IdentityCertificate;
use obligation_protocol::services::{Session, SessionError};
use obligation_protocol::transaction::{CommandData, SignedTransaction};
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

pub struct Responder {
    hub: Arc<ServiceHub>,
    session: Box<dyn Session>,
    flow_id: Uuid,
    state: ResponderState,
}

impl Responder {
    pub fn new(hub: Arc<ServiceHub>, session: Box<dyn Session>) -> Self {
        Self {
            hub,
            session,
            flow_id: Uuid::new_v4(),
            state: ResponderState::AwaitProposal,
        }
    }

    /// Picks up a checkpointed responder on a new session with the same
    /// counterparty. Only a responder waiting for the commit can resume.
    pub fn resume(
        hub: Arc<ServiceHub>,
        checkpoint: FlowCheckpoint,
        session: Box<dyn Session>,
    ) -> Result<Self, FlowError> {
        if !matches!(checkpoint.state, ResponderState::AwaitCommit { .. }) {
            return Err(FlowError::CheckpointNotResumable {
                state: checkpoint.state.to_string(),
            });
        }
        if session.counterparty() != &checkpoint.counterparty {
            return Err(FlowError::CheckpointNotResumable {
                state: format!(
                    "{} with {} (session is with {})",
                    checkpoint.state,
                    checkpoint.counterparty,
                    session.counterparty()
                ),
            });
        }
        info!(flow_id = %checkpoint.flow_id, state = %checkpoint.state, "resuming responder");
        Ok(Self {
            hub,
            session,
            flow_id: checkpoint.flow_id,
            state: checkpoint.state,
        })
    }

    pub fn flow_id(&self) -> Uuid {
        self.flow_id
    }

    pub fn state(&self) -> &ResponderState {
        &self.state
    }

    fn persist(&self) -> Result<(), FlowError> {
        match &self.state {
            ResponderState::AwaitProposal | ResponderState::AwaitCommit { .. } => {
                self.hub.checkpoints.save(&FlowCheckpoint::new(
                    self.flow_id,
                    self.session.counterparty().clone(),
                    self.state.clone(),
                ))?;
            }
            s if s.is_terminal() => self.hub.checkpoints.remove(&self.flow_id),
            _ => {}
        }
        Ok(())
    }

    fn transition(&mut self, next: ResponderState) -> Result<(), FlowError> {
        debug!(
            flow_id = %self.flow_id,
            counterparty = %self.session.counterparty(),
            from = %self.state,
            to = %next,
            "responder transition"
        );
        self.state = next;
        self.persist()
    }

    pub async fn run(mut self) -> Result<SignedTransaction, FlowError> {
        let outcome = match self.state.clone() {
            ResponderState::AwaitProposal => match self.persist() {
                Ok(()) => self.respond().await,
                Err(e) => Err(e),
            },
            ResponderState::AwaitCommit { tx_id } => self.await_commit(tx_id).await,
            other => Err(FlowError::CheckpointNotResumable {
                state: other.to_string(),
            }),
        };

        match outcome {
            Ok(stx) => {
                self.transition(ResponderState::Done { tx_id: stx.id() })?;
                info!(
                    flow_id = %self.flow_id,
                    counterparty = %self.session.counterparty(),
                    tx_id = %stx.id(),
                    "responder recorded transaction"
                );
                Ok(stx)
            }
            Err(e) => {
                if let Err(cleanup) = self.transition(ResponderState::Rejected {
                    reason: e.to_string(),
                }) {
                    warn!(flow_id = %self.flow_id, error = %cleanup, "checkpoint cleanup failed");
                }
                warn!(
                    flow_id = %self.flow_id,
                    counterparty = %self.session.counterparty(),
                    category = %e.category(),
                    error = %e,
                    "responder rejected"
                );
                Err(e)
            }
        }
    }

    async fn respond(&mut self) -> Result<SignedTransaction, FlowError> {
        let timeout = self.hub.config.session_timeout;
        let (stx, certificates) = loop {
            match sessions::receive(self.session.as_mut(), timeout).await? {
                FlowMessage::IdentityRequest => {
                    confidential::offer_identity(&self.hub, self.session.as_mut()).await?;
                }
                FlowMessage::Propose { stx, certificates } => break (stx, certificates),
                FlowMessage::Abort { reason } => {
                    return Err(FlowError::CounterpartyAborted {
                        counterparty: self.session.counterparty().name.clone(),
                        reason,
                    });
                }
                other => {
                    return Err(FlowError::ProtocolViolation {
                        counterparty: self.session.counterparty().name.clone(),
                        expected: "Propose",
                        received: other.kind(),
                    });
                }
            }
        };

        let tx_id = stx.id();
        self.transition(ResponderState::Verify { tx_id })?;
        let our_keys = match self.verify(&stx, certificates) {
            Ok(keys) => keys,
            Err(e) => {
                let decline = FlowMessage::Decline {
                    reason: e.to_string(),
                };
                if let Err(send_err) = sessions::send(self.session.as_mut(), &decline).await {
                    warn!(flow_id = %self.flow_id, error = %send_err, "decline not delivered");
                }
                return Err(e);
            }
        };

        self.transition(ResponderState::Sign { tx_id })?;
        let sigs = self.hub.keys.sign_with_owned(&our_keys, tx_id);
        // Checkpointed before the signatures leave: a crash after sending
        // must still find a resumable responder.
        self.transition(ResponderState::AwaitCommit { tx_id })?;
        sessions::send(self.session.as_mut(), &FlowMessage::Signatures(sigs)).await?;
        self.await_commit(tx_id).await
    }

    /// Checks a proposal and returns the keys this node will sign with.
    fn verify(
        &self,
        stx: &SignedTransaction,
        certificates: Vec<IdentityCertificate>,
    ) -> Result<BTreeSet<PublicKey>, FlowError> {
        let counterparty = self.session.counterparty();
        for cert in certificates {
            self.hub
                .identity
                .register_certificate(cert)
                .map_err(|e| FlowError::IdentityVerificationFailed {
                    counterparty: counterparty.name.clone(),
                    reason: e.to_string(),
                })?;
        }

        let required = stx.tx.required_signing_keys();
        // Every signature present must be valid. Missing ones are expected.
        stx.verify_signatures_except(&required)?;

        let proposer_signed = stx
            .sigs
            .iter()
            .any(|s| self.hub.resolve_key(&s.by).as_ref() == Some(counterparty));
        if !proposer_signed {
            return Err(FlowError::NotAuthorized {
                role: "signing participant",
                initiator: counterparty.name.clone(),
            });
        }

        verify_transaction(&stx.tx).map_err(FlowError::LocalVerificationFailed)?;

        // A responder is never the payer: spending our cash needs our own flow.
        if let Some(coin) = stx
            .tx
            .cash_inputs()
            .into_iter()
            .find(|c| self.hub.keys.owns(&c.owner_key()))
        {
            return Err(FlowError::UnconsentedSignature {
                counterparty: counterparty.name.clone(),
                key: coin.owner_key(),
            });
        }
        // Otherwise we sign only as a party to the obligation command.
        let consented: BTreeSet<&PublicKey> = stx
            .tx
            .commands_where(|c| matches!(c, CommandData::Obligation(_)))
            .into_iter()
            .flat_map(|c| c.signers.iter())
            .collect();
        let ours: BTreeSet<PublicKey> = required
            .into_iter()
            .filter(|k| self.hub.keys.owns(k))
            .collect();
        if let Some(key) = ours.iter().find(|k| !consented.contains(k)) {
            return Err(FlowError::UnconsentedSignature {
                counterparty: counterparty.name.clone(),
                key: *key,
            });
        }
        if ours.is_empty() {
            return Err(FlowError::NothingToSign { tx_id: stx.id() });
        }
        debug!(flow_id = %self.flow_id, tx_id = %stx.id(), keys = ours.len(), "proposal verified");
        Ok(ours)
    }

    async fn await_commit(&mut self, tx_id: SecureHash) -> Result<SignedTransaction, FlowError> {
        let timeout = self.hub.config.commit_timeout;
        let msg = match sessions::receive(self.session.as_mut(), timeout).await {
            Err(FlowError::SessionFailure {
                source: SessionError::Timeout { .. },
                ..
            }) => {
                return Err(FlowError::CommitTimeout {
                    tx_id,
                    timeout_ms: timeout.as_millis() as u64,
                })
            }
            other => other?,
        };

        let counterparty = self.session.counterparty().name.clone();
        match msg {
            FlowMessage::Finalized { stx } if stx.id() == tx_id => {
                self.hub.vault.record_finalized(&stx).await?;
                if let Err(e) =
                    sessions::send(self.session.as_mut(), &FlowMessage::Recorded { tx_id }).await
                {
                    warn!(flow_id = %self.flow_id, error = %e, "recording acknowledgement not delivered");
                }
                Ok(stx)
            }
            FlowMessage::Finalized { .. } => Err(FlowError::ProtocolViolation {
                counterparty,
                expected: "Finalized",
                received: "Finalized for another transaction",
            }),
            FlowMessage::Abort { reason } => Err(FlowError::CounterpartyAborted {
                counterparty,
                reason,
            }),
            other => Err(FlowError::ProtocolViolation {
                counterparty,
                expected: "Finalized",
                received: other.kind(),
            }),
        }
    }
}

//! # Initiator
//!
//! Drives one proposal from request to a finalized transaction:
//!
//! 1. **Resolve**: load the record, resolve parties, check the caller's role
//!    (borrower issues, lender transfers, borrower settles) and run the
//!    settlement pre-checks.
//! 2. **Build**: pick a notary, swap confidential identities if asked, and
//!    assemble states, command and signer set.
//! 3. **Sign**: verify locally, then sign. Nothing leaves the node until the
//!    proposal passes the contracts.
//! 4. **Collect**: send the proposal to every counterparty at once, then
//!    gather signatures in counterparty order. One decline ends the flow.
//! 5. **Finalize**: notarise, record, distribute.
//!
//! Any failure before notarisation sends `Abort` to every open session.

use crate::checkpoint::InitiatorState;
use crate::confidential::{self, ConfidentialIdentities};
use crate::error::FlowError;
use crate::hub::ServiceHub;
use crate::message::FlowMessage;
use crate::sessions::SessionSet;
use obligation_contracts::{verify_transaction, RuleViolation};
use obligation_protocol::crypto::PublicKey;
use obligation_protocol::ledger::{
    AbstractParty, Amount, AnonymousParty, Obligation, Party, StateAndRef, UniqueIdentifier,
};
use obligation_protocol::services::NotaryService;
use obligation_protocol::transaction::{
    CommandData, ObligationCommand, SignedTransaction, TimeWindow, TransactionBuilder,
    TransactionError,
};
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// What the caller wants done.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ObligationRequest {
    /// Borrow `amount` from `lender`. Started by the borrower.
    Issue {
        amount: Amount,
        lender: Party,
        anonymous: bool,
    },
    /// Hand the obligation to `new_lender`. Started by the current lender.
    Transfer {
        linear_id: UniqueIdentifier,
        new_lender: Party,
        anonymous: bool,
    },
    /// Pay `amount` towards the obligation. Started by the borrower.
    Settle {
        linear_id: UniqueIdentifier,
        amount: Amount,
    },
}

impl ObligationRequest {
    pub fn name(&self) -> &'static str {
        match self {
            ObligationRequest::Issue { .. } => "issue",
            ObligationRequest::Transfer { .. } => "transfer",
            ObligationRequest::Settle { .. } => "settle",
        }
    }
}

/// Output of Resolve.
enum Plan {
    Issue {
        amount: Amount,
        lender: Party,
        anonymous: bool,
    },
    Transfer {
        input: StateAndRef,
        obligation: Obligation,
        borrower: Party,
        new_lender: Party,
        anonymous: bool,
    },
    Settle {
        input: StateAndRef,
        obligation: Obligation,
        lender: Party,
        amount: Amount,
    },
}

/// Output of Build.
struct Proposal {
    builder: TransactionBuilder,
    counterparties: Vec<Party>,
    notary: Arc<dyn NotaryService>,
}

pub struct Initiator {
    hub: Arc<ServiceHub>,
    request: ObligationRequest,
    flow_id: Uuid,
    state: InitiatorState,
    sessions: SessionSet,
    notarised: bool,
}

impl Initiator {
    pub fn new(hub: Arc<ServiceHub>, request: ObligationRequest) -> Self {
        Self {
            sessions: SessionSet::new(hub.clone()),
            hub,
            request,
            flow_id: Uuid::new_v4(),
            state: InitiatorState::Init,
            notarised: false,
        }
    }

    pub fn flow_id(&self) -> Uuid {
        self.flow_id
    }

    pub fn state(&self) -> &InitiatorState {
        &self.state
    }

    fn transition(&mut self, next: InitiatorState) {
        debug!(
            flow_id = %self.flow_id,
            flow = self.request.name(),
            from = ?self.state,
            to = ?next,
            "initiator transition"
        );
        self.state = next;
    }

    pub async fn run(mut self) -> Result<SignedTransaction, FlowError> {
        match self.drive().await {
            Ok(stx) => {
                self.transition(InitiatorState::Done { tx_id: stx.id() });
                info!(
                    flow_id = %self.flow_id,
                    flow = self.request.name(),
                    tx_id = %stx.id(),
                    "flow completed"
                );
                Ok(stx)
            }
            Err(e) => {
                if !self.notarised {
                    self.sessions
                        .broadcast(&FlowMessage::Abort {
                            reason: e.to_string(),
                        })
                        .await;
                }
                self.transition(InitiatorState::Aborted {
                    reason: e.to_string(),
                });
                warn!(
                    flow_id = %self.flow_id,
                    flow = self.request.name(),
                    category = %e.category(),
                    error = %e,
                    "flow aborted"
                );
                Err(e)
            }
        }
    }

    async fn drive(&mut self) -> Result<SignedTransaction, FlowError> {
        self.transition(InitiatorState::Resolve);
        let plan = self.resolve().await?;

        self.transition(InitiatorState::Build);
        let proposal = self.build(plan).await?;

        self.transition(InitiatorState::Sign);
        let ptx = self.sign(&proposal.builder)?;

        self.transition(InitiatorState::Collect { tx_id: ptx.id() });
        let stx = self.collect(ptx, &proposal.counterparties).await?;

        self.transition(InitiatorState::Finalize { tx_id: stx.id() });
        self.finalize(stx, proposal.notary).await
    }

    // -----------------------------------------------------------------------
    // Resolve
    // -----------------------------------------------------------------------

    async fn load(&self, linear_id: &UniqueIdentifier) -> Result<(StateAndRef, Obligation), FlowError> {
        let found = self
            .hub
            .vault
            .query_unconsumed_by_id(linear_id)
            .await?
            .ok_or_else(|| FlowError::RecordNotFound(linear_id.clone()))?;
        let obligation = found
            .state
            .as_obligation()
            .cloned()
            .ok_or_else(|| FlowError::RecordNotFound(linear_id.clone()))?;
        Ok((found, obligation))
    }

    fn require_role(&self, role: &'static str, holder: &AbstractParty) -> Result<Party, FlowError> {
        let party = self.hub.well_known(holder)?;
        if &party != self.hub.me() {
            return Err(FlowError::NotAuthorized {
                role,
                initiator: self.hub.me().name.clone(),
            });
        }
        Ok(party)
    }

    async fn resolve(&self) -> Result<Plan, FlowError> {
        let me = self.hub.me();
        match &self.request {
            ObligationRequest::Issue {
                amount,
                lender,
                anonymous,
            } => {
                if lender == me {
                    return Err(RuleViolation::LenderIsBorrower.into());
                }
                Ok(Plan::Issue {
                    amount: amount.clone(),
                    lender: lender.clone(),
                    anonymous: *anonymous,
                })
            }
            ObligationRequest::Transfer {
                linear_id,
                new_lender,
                anonymous,
            } => {
                let (input, obligation) = self.load(linear_id).await?;
                self.require_role("lender", &obligation.lender)?;
                if new_lender == me {
                    return Err(RuleViolation::LenderUnchanged.into());
                }
                let borrower = self.hub.well_known(&obligation.borrower)?;
                Ok(Plan::Transfer {
                    input,
                    obligation,
                    borrower,
                    new_lender: new_lender.clone(),
                    anonymous: *anonymous,
                })
            }
            ObligationRequest::Settle { linear_id, amount } => {
                let (input, obligation) = self.load(linear_id).await?;
                self.require_role("borrower", &obligation.borrower)?;
                let lender = self.hub.well_known(&obligation.lender)?;
                self.check_settlement(&obligation, amount).await?;
                Ok(Plan::Settle {
                    input,
                    obligation,
                    lender,
                    amount: amount.clone(),
                })
            }
        }
    }

    /// Settlement pre-checks: right currency, some cash, enough cash, and
    /// no more than what is still owed.
    async fn check_settlement(&self, obligation: &Obligation, amount: &Amount) -> Result<(), FlowError> {
        if amount.currency != obligation.amount.currency {
            return Err(RuleViolation::PaymentCurrencyMismatch {
                expected: obligation.amount.currency.clone(),
                found: amount.currency.clone(),
            }
            .into());
        }
        let balance = self.hub.cash.balance(&amount.currency).await?;
        if balance.is_zero() {
            return Err(FlowError::NoFunds {
                currency: amount.currency.clone(),
            });
        }
        if balance.quantity < amount.quantity {
            return Err(FlowError::InsufficientFunds {
                requested: amount.clone(),
                available: balance,
            });
        }
        let outstanding = obligation.outstanding()?;
        if amount.quantity > outstanding.quantity {
            return Err(RuleViolation::OverSettlement {
                accepted: amount.clone(),
                outstanding,
            }
            .into());
        }
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Build
    // -----------------------------------------------------------------------

    async fn swap(&mut self, counterparty: &Party) -> Result<ConfidentialIdentities, FlowError> {
        confidential::request_identities(
            &self.hub,
            &mut self.sessions,
            std::slice::from_ref(counterparty),
        )
        .await
    }

    async fn build(&mut self, plan: Plan) -> Result<Proposal, FlowError> {
        let (notary_party, notary) = self.hub.select_notary()?;
        let mut builder = TransactionBuilder::new(Some(notary_party));
        let me = self.hub.me().clone();

        let counterparties = match plan {
            Plan::Issue {
                amount,
                lender,
                anonymous,
            } => {
                let (lender_ref, borrower_ref): (AbstractParty, AbstractParty) = if anonymous {
                    let identities = self.swap(&lender).await?;
                    (
                        confidential_of(&identities, &lender)?.into(),
                        confidential_of(&identities, &me)?.into(),
                    )
                } else {
                    (lender.clone().into(), me.clone().into())
                };
                let obligation = Obligation::new(amount, lender_ref, borrower_ref);
                builder
                    .add_command(
                        CommandData::Obligation(ObligationCommand::Issue),
                        obligation.participant_keys(),
                    )
                    .add_output_state(obligation)
                    .set_time_window(TimeWindow::from_now(self.hub.config.time_window));
                vec![lender]
            }
            Plan::Transfer {
                input,
                obligation,
                borrower,
                new_lender,
                anonymous,
            } => {
                let new_lender_ref: AbstractParty = if anonymous {
                    let identities = self.swap(&new_lender).await?;
                    confidential_of(&identities, &new_lender)?.into()
                } else {
                    new_lender.clone().into()
                };
                let output = obligation.with_new_lender(new_lender_ref);
                let signers: BTreeSet<PublicKey> = obligation
                    .participant_keys()
                    .union(&output.participant_keys())
                    .copied()
                    .collect();
                builder
                    .add_input_state(input)
                    .add_output_state(output)
                    .add_command(CommandData::Obligation(ObligationCommand::Transfer), signers);
                let mut counterparties = vec![borrower];
                if !counterparties.contains(&new_lender) {
                    counterparties.push(new_lender);
                }
                counterparties.retain(|p| p != &me);
                counterparties
            }
            Plan::Settle {
                input,
                obligation,
                lender,
                amount,
            } => {
                builder.add_input_state(input).add_command(
                    CommandData::Obligation(ObligationCommand::Settle),
                    obligation.participant_keys(),
                );
                let cash_keys = self
                    .hub
                    .cash
                    .generate_spend(&mut builder, &amount, &obligation.lender)
                    .await?;
                debug!(flow_id = %self.flow_id, cash_keys = cash_keys.len(), "cash spend added");
                let outstanding = obligation.outstanding()?;
                if amount.quantity < outstanding.quantity {
                    builder.add_output_state(obligation.pay(&amount)?);
                }
                vec![lender]
            }
        };

        Ok(Proposal {
            builder,
            counterparties,
            notary,
        })
    }

    // -----------------------------------------------------------------------
    // Sign
    // -----------------------------------------------------------------------

    fn sign(&self, builder: &TransactionBuilder) -> Result<SignedTransaction, FlowError> {
        let wtx = builder.to_wire_transaction()?;
        verify_transaction(&wtx).map_err(FlowError::LocalVerificationFailed)?;
        let sigs = self
            .hub
            .keys
            .sign_with_owned(&wtx.required_signing_keys(), wtx.id());
        debug!(flow_id = %self.flow_id, tx_id = %wtx.id(), signatures = sigs.len(), "signed proposal");
        Ok(SignedTransaction::new(wtx, sigs))
    }

    // -----------------------------------------------------------------------
    // Collect
    // -----------------------------------------------------------------------

    async fn collect(
        &mut self,
        ptx: SignedTransaction,
        counterparties: &[Party],
    ) -> Result<SignedTransaction, FlowError> {
        let proposal = FlowMessage::Propose {
            certificates: self.hub.certificates_for(&ptx.tx),
            stx: ptx.clone(),
        };
        for party in counterparties {
            self.sessions.send(party, &proposal).await?;
        }

        let tx_id = ptx.id();
        let required = ptx.tx.required_signing_keys();
        let timeout = self.hub.config.session_timeout;
        let mut stx = ptx;
        for party in counterparties {
            match self.sessions.receive(party, timeout).await? {
                FlowMessage::Signatures(sigs) => {
                    for sig in &sigs {
                        if !required.contains(&sig.by) {
                            return Err(TransactionError::UnexpectedSigner { tx_id, by: sig.by }.into());
                        }
                        if !sig.verify(tx_id) {
                            return Err(TransactionError::InvalidSignature { tx_id, by: sig.by }.into());
                        }
                    }
                    debug!(
                        flow_id = %self.flow_id,
                        counterparty = %party,
                        signatures = sigs.len(),
                        "signatures collected"
                    );
                    stx = stx.with_signatures(sigs);
                }
                FlowMessage::Decline { reason } => {
                    return Err(FlowError::CounterpartyRejected {
                        counterparty: party.name.clone(),
                        reason,
                    });
                }
                other => {
                    return Err(FlowError::ProtocolViolation {
                        counterparty: party.name.clone(),
                        expected: "Signatures",
                        received: other.kind(),
                    });
                }
            }
        }

        let notary_key: BTreeSet<PublicKey> = stx
            .tx
            .notary_if_required()
            .map(|n| n.owning_key)
            .into_iter()
            .collect();
        stx.verify_signatures_except(&notary_key)?;
        Ok(stx)
    }

    // -----------------------------------------------------------------------
    // Finalize
    // -----------------------------------------------------------------------

    async fn finalize(
        &mut self,
        stx: SignedTransaction,
        notary: Arc<dyn NotaryService>,
    ) -> Result<SignedTransaction, FlowError> {
        let tx_id = stx.id();
        let stx = if stx.tx.notary_if_required().is_some() {
            let sig = notary.notarise(&stx).await?;
            stx.with_signature(sig)
        } else {
            stx
        };
        self.notarised = true;

        // Committed at the notary: counterparties get Finalized even when our
        // own recording fails.
        let recorded = self.hub.vault.record_finalized(&stx).await;
        if let Err(e) = &recorded {
            warn!(flow_id = %self.flow_id, tx_id = %tx_id, error = %e, "local recording failed");
        }

        let reached = self
            .sessions
            .broadcast(&FlowMessage::Finalized { stx: stx.clone() })
            .await;
        let timeout = self.hub.config.session_timeout;
        for party in reached {
            match self.sessions.receive(&party, timeout).await {
                Ok(FlowMessage::Recorded { tx_id: recorded }) if recorded == tx_id => {
                    debug!(flow_id = %self.flow_id, counterparty = %party, "counterparty recorded");
                }
                Ok(other) => warn!(
                    flow_id = %self.flow_id,
                    counterparty = %party,
                    message = other.kind(),
                    "unexpected reply to Finalized"
                ),
                Err(e) => warn!(
                    flow_id = %self.flow_id,
                    counterparty = %party,
                    error = %e,
                    "recording not confirmed"
                ),
            }
        }
        recorded?;
        Ok(stx)
    }
}

fn confidential_of(identities: &ConfidentialIdentities, party: &Party) -> Result<AnonymousParty, FlowError> {
    identities
        .get(party)
        .copied()
        .ok_or_else(|| FlowError::IdentityVerificationFailed {
            counterparty: party.name.clone(),
            reason: "no confidential identity returned".into(),
        })
}

//! Timeouts, aborts and checkpoint recovery.
//!
//! These tests drive one side of a session by hand so they can stop talking
//! at exactly the point under test.

use async_trait::async_trait;
use obligation_flows::{
    session_pair, ErrorCategory, FlowError, FlowMessage, FlowNode, Initiator, ObligationRequest,
    ResponderState, Responder, ServiceHub, SimulatedNetwork, OBLIGATION_PROTOCOL,
};
use obligation_protocol::config::FlowConfig;
use obligation_protocol::crypto::{KeyPair, SecureHash};
use obligation_protocol::ledger::{Amount, Currency, Obligation, Party, StateAndRef, UniqueIdentifier};
use obligation_protocol::services::{NotaryService, Session, StateStore, StoreError};
use obligation_protocol::transaction::{
    CommandData, ObligationCommand, SignedTransaction, TimeWindow, TransactionBuilder,
};
use std::sync::Arc;
use std::time::Duration;

// ---------------------------------------------------------------------------
// Test Helpers
// ---------------------------------------------------------------------------

const WAIT: Duration = Duration::from_secs(5);

/// An issue proposal from `borrower` to `lender`, signed by the borrower.
fn issue_proposal(net: &SimulatedNetwork, borrower: &FlowNode, lender: &FlowNode) -> SignedTransaction {
    let notary = net.network_map().notary_identities().remove(0);
    let obligation = Obligation::new(
        Amount::new(100, Currency::USD),
        lender.me().clone().into(),
        borrower.me().clone().into(),
    );
    let mut builder = TransactionBuilder::new(Some(notary));
    builder
        .add_command(
            CommandData::Obligation(ObligationCommand::Issue),
            obligation.participant_keys(),
        )
        .add_output_state(obligation)
        .set_time_window(TimeWindow::from_now(Duration::from_secs(30)));
    let wtx = builder.to_wire_transaction().unwrap();
    let sigs = borrower
        .hub()
        .keys
        .sign_with_owned(&wtx.required_signing_keys(), wtx.id());
    SignedTransaction::new(wtx, sigs)
}

async fn send(session: &mut dyn Session, msg: FlowMessage) {
    session.send(msg.encode().unwrap()).await.unwrap();
}

async fn receive(session: &mut dyn Session) -> FlowMessage {
    FlowMessage::decode(&session.receive(WAIT).await.unwrap()).unwrap()
}

async fn signatures(session: &mut dyn Session) -> Vec<obligation_protocol::transaction::TransactionSignature> {
    match receive(session).await {
        FlowMessage::Signatures(sigs) => sigs,
        other => panic!("expected signatures, got {}", other.kind()),
    }
}

/// Reads through to the wrapped vault but cannot record anything.
struct UnwritableVault(Arc<dyn StateStore>);

#[async_trait]
impl StateStore for UnwritableVault {
    async fn query_unconsumed_by_id(
        &self,
        id: &UniqueIdentifier,
    ) -> Result<Option<StateAndRef>, StoreError> {
        self.0.query_unconsumed_by_id(id).await
    }

    async fn unconsumed_obligations(&self) -> Result<Vec<StateAndRef>, StoreError> {
        self.0.unconsumed_obligations().await
    }

    async fn unconsumed_cash(&self) -> Result<Vec<StateAndRef>, StoreError> {
        self.0.unconsumed_cash().await
    }

    async fn record_finalized(&self, _stx: &SignedTransaction) -> Result<bool, StoreError> {
        Err(StoreError::Unavailable("disk full".into()))
    }

    async fn transaction(&self, id: &SecureHash) -> Result<Option<SignedTransaction>, StoreError> {
        self.0.transaction(id).await
    }
}

/// `node`'s services with its vault swapped for an [`UnwritableVault`].
fn with_unwritable_vault(node: &FlowNode) -> Arc<ServiceHub> {
    let hub = node.hub();
    Arc::new(ServiceHub {
        keys: hub.keys.clone(),
        identity: hub.identity.clone(),
        vault: Arc::new(UnwritableVault(hub.vault.clone())),
        cash: hub.cash.clone(),
        network_map: hub.network_map.clone(),
        transport: hub.transport.clone(),
        checkpoints: hub.checkpoints.clone(),
        config: hub.config.clone(),
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[tokio::test]
async fn responder_resumes_from_await_commit() {
    let net = SimulatedNetwork::new(FlowConfig::default());
    let notary = net.add_notary("Notary");
    let alice = net.add_node("Alice");
    let bob = net.add_node("Bob");
    let ptx = issue_proposal(&net, &alice, &bob);

    // First run: Bob signs, then the process "crashes" before the commit.
    let (mut ours, theirs) = session_pair(alice.me(), bob.me());
    let first = tokio::spawn(Responder::new(bob.hub().clone(), Box::new(theirs)).run());
    send(
        &mut ours,
        FlowMessage::Propose {
            stx: ptx.clone(),
            certificates: vec![],
        },
    )
    .await;
    let sigs = signatures(&mut ours).await;

    // Saved before the signatures were sent, so it is there already.
    let checkpoint = bob
        .hub()
        .checkpoints
        .all()
        .unwrap()
        .into_iter()
        .find(|c| matches!(c.state, ResponderState::AwaitCommit { .. }))
        .expect("checkpoint at AwaitCommit");
    assert_eq!(checkpoint.state, ResponderState::AwaitCommit { tx_id: ptx.id() });
    assert_eq!(&checkpoint.counterparty, alice.me());
    first.abort();
    let _ = first.await;

    let stx = ptx.with_signatures(sigs);
    let stx = stx.with_signature(notary.notarise(&stx).await.unwrap());

    // Second run on a fresh session picks up where the first stopped.
    let (mut ours, theirs) = session_pair(alice.me(), bob.me());
    let resumed = Responder::resume(bob.hub().clone(), checkpoint, Box::new(theirs)).unwrap();
    let second = tokio::spawn(resumed.run());
    send(&mut ours, FlowMessage::Finalized { stx: stx.clone() }).await;
    assert_eq!(receive(&mut ours).await, FlowMessage::Recorded { tx_id: stx.id() });

    let recorded = second.await.unwrap().unwrap();
    assert_eq!(recorded.id(), stx.id());
    assert!(bob.hub().vault.transaction(&stx.id()).await.unwrap().is_some());
    assert_eq!(bob.obligations().await.unwrap().len(), 1);
    assert!(bob.hub().checkpoints.all().unwrap().is_empty());
}

#[tokio::test]
async fn resume_refuses_another_counterparty() {
    let net = SimulatedNetwork::new(FlowConfig::default());
    net.add_notary("Notary");
    let alice = net.add_node("Alice");
    let bob = net.add_node("Bob");
    let carol = net.add_node("Carol");
    let ptx = issue_proposal(&net, &alice, &bob);

    let checkpoint = obligation_flows::FlowCheckpoint::new(
        uuid::Uuid::new_v4(),
        alice.me().clone(),
        ResponderState::AwaitCommit { tx_id: ptx.id() },
    );
    let (_ours, theirs) = session_pair(carol.me(), bob.me());
    let err = Responder::resume(bob.hub().clone(), checkpoint, Box::new(theirs))
        .err()
        .unwrap();
    assert!(matches!(err, FlowError::CheckpointNotResumable { .. }));
}

#[tokio::test(start_paused = true)]
async fn responder_gives_up_waiting_for_the_commit() {
    let config = FlowConfig::default();
    let commit_timeout = config.commit_timeout;
    let net = SimulatedNetwork::new(config);
    net.add_notary("Notary");
    let alice = net.add_node("Alice");
    let bob = net.add_node("Bob");
    let ptx = issue_proposal(&net, &alice, &bob);

    let (mut ours, theirs) = session_pair(alice.me(), bob.me());
    let handle = tokio::spawn(Responder::new(bob.hub().clone(), Box::new(theirs)).run());
    send(
        &mut ours,
        FlowMessage::Propose {
            stx: ptx.clone(),
            certificates: vec![],
        },
    )
    .await;
    signatures(&mut ours).await;

    let err = handle.await.unwrap().unwrap_err();
    match err {
        FlowError::CommitTimeout { tx_id, timeout_ms } => {
            assert_eq!(tx_id, ptx.id());
            assert_eq!(timeout_ms, commit_timeout.as_millis() as u64);
        }
        other => panic!("unexpected {other}"),
    }
    assert!(bob.hub().vault.transaction(&ptx.id()).await.unwrap().is_none());
    assert!(bob.hub().checkpoints.all().unwrap().is_empty());
}

#[tokio::test(start_paused = true)]
async fn silent_counterparty_times_out_the_identity_exchange() {
    let net = SimulatedNetwork::new(FlowConfig::default());
    net.add_notary("Notary");
    let alice = net.add_node("Alice");

    // Reachable, but nobody reads its inbox.
    let ghost = Party::new("Ghost", KeyPair::generate().public_key());
    let _inbox = net.transport().register(&ghost, [OBLIGATION_PROTOCOL]);

    let err = alice
        .issue(Amount::new(100, Currency::USD), ghost, true)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        FlowError::IdentityExchangeTimeout { ref counterparty, .. } if counterparty == "Ghost"
    ));
    assert!(alice.obligations().await.unwrap().is_empty());
}

#[tokio::test]
async fn unreachable_lender_is_a_session_failure() {
    let net = SimulatedNetwork::new(FlowConfig::default());
    net.add_notary("Notary");
    let alice = net.add_node("Alice");
    let stranger = Party::new("Stranger", KeyPair::generate().public_key());

    let err = alice
        .issue(Amount::new(100, Currency::USD), stranger, false)
        .await
        .unwrap_err();
    assert!(matches!(err, FlowError::SessionFailure { .. }));
    assert_eq!(err.category(), ErrorCategory::Coordination);
}

#[tokio::test]
async fn counterparties_record_even_when_the_initiator_cannot() {
    let net = SimulatedNetwork::new(FlowConfig::default());
    net.add_notary("Notary");
    let alice = net.add_node("Alice");
    let bob = net.add_node("Bob");

    let request = ObligationRequest::Issue {
        amount: Amount::new(100, Currency::USD),
        lender: bob.me().clone(),
        anonymous: false,
    };
    let err = Initiator::new(with_unwritable_vault(&alice), request)
        .run()
        .await
        .unwrap_err();
    assert!(matches!(err, FlowError::Store(StoreError::Unavailable(_))));
    assert_eq!(err.category(), ErrorCategory::Resource);

    // Bob acknowledged Finalized before Alice's flow returned.
    let held = bob.obligations().await.unwrap();
    assert_eq!(held.len(), 1);
    assert!(bob.hub().vault.transaction(&held[0].reference.txhash).await.unwrap().is_some());
    assert!(alice.obligations().await.unwrap().is_empty());
}

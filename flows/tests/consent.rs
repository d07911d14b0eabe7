//! Proposals a counterparty must refuse, and how the initiator hears of it.
//!
//! Some tests play the misbehaving side by hand: either a proposer handing a
//! real responder a crafted transaction, or a scripted peer answering a real
//! initiator.

use obligation_flows::{
    session_pair, ErrorCategory, FlowError, FlowMessage, FlowNode, IncomingSession, Responder,
    SimulatedNetwork, OBLIGATION_PROTOCOL,
};
use obligation_protocol::config::FlowConfig;
use obligation_protocol::crypto::KeyPair;
use obligation_protocol::identity::IdentityCertificate;
use obligation_protocol::ledger::{AbstractParty, Amount, CashState, Currency, Obligation, Party};
use obligation_protocol::services::Session;
use obligation_protocol::transaction::{
    CashCommand, CommandData, ObligationCommand, SignedTransaction, TimeWindow, TransactionBuilder,
};
use std::time::Duration;
use tokio::sync::mpsc;

// ---------------------------------------------------------------------------
// Test Helpers
// ---------------------------------------------------------------------------

const WAIT: Duration = Duration::from_secs(5);

fn usd(quantity: u64) -> Amount {
    Amount::new(quantity, Currency::USD)
}

fn network(names: &[&str]) -> (SimulatedNetwork, Vec<FlowNode>) {
    let net = SimulatedNetwork::new(FlowConfig::default());
    net.add_notary("Notary");
    let nodes = names.iter().map(|n| net.add_node(n)).collect();
    (net, nodes)
}

async fn send(session: &mut dyn Session, msg: FlowMessage) {
    session.send(msg.encode().unwrap()).await.unwrap();
}

async fn receive(session: &mut dyn Session) -> FlowMessage {
    FlowMessage::decode(&session.receive(WAIT).await.unwrap()).unwrap()
}

/// A party reachable on the network whose sessions the test answers itself.
fn scripted_peer(net: &SimulatedNetwork, name: &str) -> (Party, mpsc::Receiver<IncomingSession>) {
    let party = Party::new(name, KeyPair::generate().public_key());
    let inbox = net.transport().register(&party, [OBLIGATION_PROTOCOL]);
    (party, inbox)
}

/// Proposes `stx` from `from` to a fresh responder on `to` and returns the
/// reply together with the responder's outcome.
async fn propose(
    from: &FlowNode,
    to: &FlowNode,
    stx: SignedTransaction,
    certificates: Vec<IdentityCertificate>,
) -> (FlowMessage, Result<SignedTransaction, FlowError>) {
    let (mut ours, theirs) = session_pair(from.me(), to.me());
    let handle = tokio::spawn(Responder::new(to.hub().clone(), Box::new(theirs)).run());
    send(&mut ours, FlowMessage::Propose { stx, certificates }).await;
    let reply = receive(&mut ours).await;
    (reply, handle.await.unwrap())
}

// ---------------------------------------------------------------------------
// Responder Refusals
// ---------------------------------------------------------------------------

#[tokio::test]
async fn lender_will_not_sign_away_its_own_cash() {
    let (net, nodes) = network(&["Alice", "Bob"]);
    let (alice, bob) = (&nodes[0], &nodes[1]);

    alice.issue(usd(100), bob.me().clone(), false).await.unwrap();
    alice.self_issue_cash(usd(100)).await.unwrap();
    bob.self_issue_cash(usd(1000)).await.unwrap();

    let input = alice.obligations().await.unwrap().remove(0);
    let obligation = input.state.as_obligation().unwrap().clone();
    let alices_coin = alice.cash().await.unwrap().remove(0);
    let bobs_coin = bob.cash().await.unwrap().remove(0);
    let alices_cash = alices_coin.state.as_cash().unwrap().clone();
    let bobs_cash = bobs_coin.state.as_cash().unwrap().clone();
    let to_alice: AbstractParty = alice.me().clone().into();

    // Pays Bob 40, and quietly moves Bob's 1000 to Alice under one Cash.Move.
    let notary = net.network_map().notary_identities().remove(0);
    let mut builder = TransactionBuilder::new(Some(notary));
    builder
        .add_input_state(input)
        .add_input_state(alices_coin)
        .add_input_state(bobs_coin)
        .add_output_state(obligation.pay(&usd(40)).unwrap())
        .add_output_state(CashState::new(
            usd(40),
            alices_cash.issuer.clone(),
            obligation.lender.clone(),
        ))
        .add_output_state(CashState::new(usd(60), alices_cash.issuer.clone(), to_alice.clone()))
        .add_output_state(bobs_cash.with_new_owner(to_alice))
        .add_command(
            CommandData::Obligation(ObligationCommand::Settle),
            obligation.participant_keys(),
        )
        .add_command(
            CommandData::Cash(CashCommand::Move),
            [alice.me().owning_key, bob.me().owning_key],
        );
    let wtx = builder.to_wire_transaction().unwrap();
    let sigs = alice
        .hub()
        .keys
        .sign_with_owned(&wtx.required_signing_keys(), wtx.id());
    let ptx = SignedTransaction::new(wtx, sigs);

    let (reply, outcome) = propose(alice, bob, ptx, vec![]).await;
    assert!(matches!(reply, FlowMessage::Decline { .. }));
    let err = outcome.unwrap_err();
    match &err {
        FlowError::UnconsentedSignature { counterparty, key } => {
            assert_eq!(counterparty, "Alice");
            assert_eq!(key, &bob.me().owning_key);
        }
        other => panic!("unexpected {other}"),
    }
    assert_eq!(err.category(), ErrorCategory::Authorization);

    assert_eq!(bob.cash_balances().await.unwrap()[&Currency::USD], usd(1000));
    assert_eq!(bob.obligations().await.unwrap().len(), 1);
    assert!(bob.hub().checkpoints.all().unwrap().is_empty());
}

#[tokio::test]
async fn proposal_with_a_forged_certificate_is_declined() {
    let (net, nodes) = network(&["Alice", "Bob", "Carol"]);
    let (alice, bob, carol) = (&nodes[0], &nodes[1], &nodes[2]);

    let notary = net.network_map().notary_identities().remove(0);
    let obligation = Obligation::new(usd(100), bob.me().clone().into(), alice.me().clone().into());
    let mut builder = TransactionBuilder::new(Some(notary));
    builder
        .add_command(
            CommandData::Obligation(ObligationCommand::Issue),
            obligation.participant_keys(),
        )
        .add_output_state(obligation)
        .set_time_window(TimeWindow::from_now(Duration::from_secs(30)));
    let wtx = builder.to_wire_transaction().unwrap();
    let sigs = alice
        .hub()
        .keys
        .sign_with_owned(&wtx.required_signing_keys(), wtx.id());
    let ptx = SignedTransaction::new(wtx, sigs);

    // Carol's key, relabelled as Alice's.
    let mut forged = carol.hub().fresh_identity().unwrap();
    forged.owner = alice.me().clone();

    let (reply, outcome) = propose(alice, bob, ptx.clone(), vec![forged]).await;
    assert!(matches!(reply, FlowMessage::Decline { .. }));
    let err = outcome.unwrap_err();
    assert!(matches!(
        err,
        FlowError::IdentityVerificationFailed { ref counterparty, .. } if counterparty == "Alice"
    ));
    assert!(bob.hub().vault.transaction(&ptx.id()).await.unwrap().is_none());
}

// ---------------------------------------------------------------------------
// Initiator Side
// ---------------------------------------------------------------------------

#[tokio::test]
async fn declined_proposal_fails_the_flow() {
    let (net, nodes) = network(&["Alice"]);
    let alice = &nodes[0];
    let (mallory, mut inbox) = scripted_peer(&net, "Mallory");

    let peer = tokio::spawn(async move {
        let mut incoming = inbox.recv().await.unwrap();
        let session = incoming.session.as_mut();
        let propose = receive(session).await;
        assert_eq!(propose.kind(), "Propose");
        send(
            session,
            FlowMessage::Decline {
                reason: "not today".into(),
            },
        )
        .await;
        receive(session).await
    });

    let err = alice.issue(usd(100), mallory, false).await.unwrap_err();
    match &err {
        FlowError::CounterpartyRejected { counterparty, reason } => {
            assert_eq!(counterparty, "Mallory");
            assert_eq!(reason, "not today");
        }
        other => panic!("unexpected {other}"),
    }
    assert_eq!(err.category(), ErrorCategory::Coordination);

    // The peer is told the flow is over.
    assert!(matches!(peer.await.unwrap(), FlowMessage::Abort { .. }));
    assert!(alice.obligations().await.unwrap().is_empty());
    assert!(alice.hub().checkpoints.all().unwrap().is_empty());
}

#[tokio::test]
async fn identity_offer_must_certify_the_session_party() {
    let (net, nodes) = network(&["Alice", "Carol"]);
    let (alice, carol) = (&nodes[0], &nodes[1]);
    let (mallory, mut inbox) = scripted_peer(&net, "Mallory");
    let carols = carol.hub().fresh_identity().unwrap();

    let peer = tokio::spawn(async move {
        let mut incoming = inbox.recv().await.unwrap();
        let session = incoming.session.as_mut();
        assert_eq!(receive(session).await, FlowMessage::IdentityRequest);
        send(session, FlowMessage::IdentityOffer { certificate: carols }).await;
        receive(session).await
    });

    let err = alice.issue(usd(100), mallory, true).await.unwrap_err();
    match &err {
        FlowError::IdentityVerificationFailed { counterparty, reason } => {
            assert_eq!(counterparty, "Mallory");
            assert!(reason.contains("Carol"));
        }
        other => panic!("unexpected {other}"),
    }
    assert_eq!(err.category(), ErrorCategory::Coordination);
    assert!(matches!(peer.await.unwrap(), FlowMessage::Abort { .. }));
    assert!(alice.obligations().await.unwrap().is_empty());
}

//! # Flow Node
//!
//! A node owns a [`ServiceHub`], answers every incoming obligation session
//! with a [`Responder`], and starts initiator flows on request.
//! [`SimulatedNetwork`] wires several nodes and notaries together in one
//! process over [`InMemoryTransport`].

use crate::cash_issue;
use crate::checkpoint::InMemoryCheckpointStore;
use crate::error::FlowError;
use crate::hub::ServiceHub;
use crate::initiator::{Initiator, ObligationRequest};
use crate::responder::Responder;
use crate::transport::{IncomingSession, InMemoryTransport};
use crate::OBLIGATION_PROTOCOL;
use obligation_protocol::config::FlowConfig;
use obligation_protocol::identity::{IdentityService, InMemoryIdentityService, KeyManagementService};
use obligation_protocol::ledger::{Amount, Currency, Party, StateAndRef, UniqueIdentifier};
use obligation_protocol::services::{
    InMemoryNetworkMap, InMemoryNotary, InMemoryVault, NetworkMap, StateStore, VaultCashService,
};
use obligation_protocol::transaction::SignedTransaction;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

#[derive(Clone)]
pub struct FlowNode {
    hub: Arc<ServiceHub>,
}

impl FlowNode {
    /// Spawns the dispatch loop that answers sessions arriving on `inbox`.
    /// Must be called from within a tokio runtime.
    pub fn start(hub: Arc<ServiceHub>, mut inbox: mpsc::Receiver<IncomingSession>) -> Self {
        let dispatch_hub = hub.clone();
        tokio::spawn(async move {
            while let Some(incoming) = inbox.recv().await {
                if incoming.protocol != OBLIGATION_PROTOCOL {
                    warn!(
                        me = %dispatch_hub.me(),
                        protocol = %incoming.protocol,
                        "no responder for protocol"
                    );
                    continue;
                }
                let responder = Responder::new(dispatch_hub.clone(), incoming.session);
                let flow_id = responder.flow_id();
                tokio::spawn(async move {
                    match responder.run().await {
                        Ok(stx) => debug!(%flow_id, tx_id = %stx.id(), "responder finished"),
                        Err(e) => debug!(%flow_id, error = %e, "responder finished with error"),
                    }
                });
            }
            debug!(me = %dispatch_hub.me(), "inbox closed");
        });
        Self { hub }
    }

    pub fn hub(&self) -> &Arc<ServiceHub> {
        &self.hub
    }

    pub fn me(&self) -> &Party {
        self.hub.me()
    }

    pub async fn run(&self, request: ObligationRequest) -> Result<SignedTransaction, FlowError> {
        Initiator::new(self.hub.clone(), request).run().await
    }

    pub async fn issue(
        &self,
        amount: Amount,
        lender: Party,
        anonymous: bool,
    ) -> Result<SignedTransaction, FlowError> {
        self.run(ObligationRequest::Issue {
            amount,
            lender,
            anonymous,
        })
        .await
    }

    pub async fn transfer(
        &self,
        linear_id: UniqueIdentifier,
        new_lender: Party,
        anonymous: bool,
    ) -> Result<SignedTransaction, FlowError> {
        self.run(ObligationRequest::Transfer {
            linear_id,
            new_lender,
            anonymous,
        })
        .await
    }

    pub async fn settle(
        &self,
        linear_id: UniqueIdentifier,
        amount: Amount,
    ) -> Result<SignedTransaction, FlowError> {
        self.run(ObligationRequest::Settle { linear_id, amount }).await
    }

    pub async fn self_issue_cash(&self, amount: Amount) -> Result<SignedTransaction, FlowError> {
        cash_issue::self_issue_cash(&self.hub, amount).await
    }

    // -- Queries ------------------------------------------------------------

    pub async fn obligations(&self) -> Result<Vec<StateAndRef>, FlowError> {
        Ok(self.hub.vault.unconsumed_obligations().await?)
    }

    pub async fn cash(&self) -> Result<Vec<StateAndRef>, FlowError> {
        Ok(self.hub.vault.unconsumed_cash().await?)
    }

    pub async fn cash_balances(&self) -> Result<BTreeMap<Currency, Amount>, FlowError> {
        Ok(self.hub.cash.balances().await?)
    }

    /// Face value per currency of every obligation this node is
    /// not the lender of.
    pub async fn owed_per_currency(&self) -> Result<BTreeMap<Currency, Amount>, FlowError> {
        let mut owed: BTreeMap<Currency, Amount> = BTreeMap::new();
        for record in self.obligations().await? {
            let Some(obligation) = record.state.as_obligation() else {
                continue;
            };
            if self.hub.keys.owns(&obligation.lender.owning_key()) {
                continue;
            }
            let entry = owed
                .entry(obligation.amount.currency.clone())
                .or_insert_with(|| Amount::zero(obligation.amount.currency.clone()));
            *entry = entry.checked_add(&obligation.amount)?;
        }
        Ok(owed)
    }
}

/// Nodes and notaries sharing one network map and one transport.
pub struct SimulatedNetwork {
    map: Arc<InMemoryNetworkMap>,
    transport: Arc<InMemoryTransport>,
    config: FlowConfig,
}

impl SimulatedNetwork {
    pub fn new(config: FlowConfig) -> Self {
        Self {
            map: Arc::new(InMemoryNetworkMap::new()),
            transport: Arc::new(InMemoryTransport::new()),
            config,
        }
    }

    pub fn add_notary(&self, name: &str) -> Arc<InMemoryNotary> {
        let notary = Arc::new(InMemoryNotary::new(name));
        self.map.register_notary(notary.clone());
        info!(notary = %name, "notary joined");
        notary
    }

    /// Creates a node with fresh keys and empty stores and starts it.
    pub fn add_node(&self, name: &str) -> FlowNode {
        let keys = Arc::new(KeyManagementService::generate(name));
        let me = keys.legal_identity().clone();

        let identity = Arc::new(InMemoryIdentityService::new());
        identity.register_well_known(me.clone());
        let vault: Arc<dyn StateStore> = Arc::new(InMemoryVault::new(keys.clone()));
        let cash = Arc::new(VaultCashService::new(vault.clone(), keys.clone()));

        self.map.register_party(me.clone());
        let inbox = self.transport.register(&me, [OBLIGATION_PROTOCOL]);

        let hub = Arc::new(ServiceHub {
            keys,
            identity,
            vault,
            cash,
            network_map: self.map.clone(),
            transport: self.transport.clone(),
            checkpoints: Arc::new(InMemoryCheckpointStore::new()),
            config: self.config.clone(),
        });
        info!(party = %me, "node joined");
        FlowNode::start(hub, inbox)
    }

    pub fn network_map(&self) -> Arc<dyn NetworkMap> {
        self.map.clone()
    }

    pub fn transport(&self) -> &Arc<InMemoryTransport> {
        &self.transport
    }

    pub fn config(&self) -> &FlowConfig {
        &self.config
    }
}

//! Typed message I/O over the sessions an initiator holds.

use crate::error::FlowError;
use crate::hub::ServiceHub;
use crate::message::FlowMessage;
use crate::OBLIGATION_PROTOCOL;
use obligation_protocol::ledger::Party;
use obligation_protocol::services::Session;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

pub(crate) async fn send(session: &mut dyn Session, msg: &FlowMessage) -> Result<(), FlowError> {
    let counterparty = session.counterparty().clone();
    let bytes = msg.encode().map_err(|e| FlowError::session(&counterparty, e))?;
    debug!(counterparty = %counterparty, message = msg.kind(), "send");
    session
        .send(bytes)
        .await
        .map_err(|e| FlowError::session(&counterparty, e))
}

pub(crate) async fn receive(
    session: &mut dyn Session,
    timeout: Duration,
) -> Result<FlowMessage, FlowError> {
    let counterparty = session.counterparty().clone();
    let bytes = session
        .receive(timeout)
        .await
        .map_err(|e| FlowError::session(&counterparty, e))?;
    let msg = FlowMessage::decode(&bytes).map_err(|e| FlowError::session(&counterparty, e))?;
    debug!(counterparty = %counterparty, message = msg.kind(), "receive");
    Ok(msg)
}

/// Sessions opened lazily, one per counterparty, reused across every step
/// of a flow.
pub(crate) struct SessionSet {
    hub: Arc<ServiceHub>,
    open: Vec<Box<dyn Session>>,
}

impl SessionSet {
    pub(crate) fn new(hub: Arc<ServiceHub>) -> Self {
        Self {
            hub,
            open: Vec::new(),
        }
    }

    pub(crate) async fn get(&mut self, party: &Party) -> Result<&mut dyn Session, FlowError> {
        let index = match self.open.iter().position(|s| s.counterparty() == party) {
            Some(i) => i,
            None => {
                let session = self
                    .hub
                    .transport
                    .open(self.hub.me(), party, OBLIGATION_PROTOCOL)
                    .await
                    .map_err(|e| FlowError::session(party, e))?;
                self.open.push(session);
                self.open.len() - 1
            }
        };
        Ok(self.open[index].as_mut())
    }

    pub(crate) async fn send(&mut self, party: &Party, msg: &FlowMessage) -> Result<(), FlowError> {
        send(self.get(party).await?, msg).await
    }

    pub(crate) async fn receive(
        &mut self,
        party: &Party,
        timeout: Duration,
    ) -> Result<FlowMessage, FlowError> {
        receive(self.get(party).await?, timeout).await
    }

    /// Sends `msg` to every open session, logging failures instead of
    /// returning them.
    pub(crate) async fn broadcast(&mut self, msg: &FlowMessage) -> Vec<Party> {
        let mut reached = Vec::new();
        for session in self.open.iter_mut() {
            let counterparty = session.counterparty().clone();
            match send(session.as_mut(), msg).await {
                Ok(()) => reached.push(counterparty),
                Err(e) => warn!(counterparty = %counterparty, error = %e, "broadcast failed"),
            }
        }
        reached
    }
}

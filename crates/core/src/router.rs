//! Response Router (spec §4.5): correlates inbound responses to pending
//! outbound request promises, and the client façade that creates them.

use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

use dashmap::DashMap;
use serde_json::Value;
use tokio::sync::oneshot;

use lrpc_protocol::{internal_error, JsonRpcError, JsonRpcNotification, JsonRpcRequest, RequestId};

use crate::error::CoreError;
use crate::output::OutputHandler;

type Outcome = Result<Value, JsonRpcError>;

/// Routes inbound responses to their pending outbound request, and exposes
/// the client-facing `invoke_request`/`invoke_notification` API (spec §6).
pub struct ResponseRouter {
    output: Arc<OutputHandler>,
    pending: DashMap<RequestId, oneshot::Sender<Outcome>>,
    next_id: AtomicI64,
}

impl ResponseRouter {
    /// Build a router that sends outbound frames through `output`.
    pub fn new(output: Arc<OutputHandler>) -> Arc<Self> {
        Arc::new(Self { output, pending: DashMap::new(), next_id: AtomicI64::new(1) })
    }

    /// Send a request and await its matched response.
    ///
    /// The id is assigned from a strictly-monotone per-connection counter
    /// (spec §3 invariant). If `output` is already closed the promise is
    /// rejected immediately with [`CoreError::ConnectionLost`] without ever
    /// registering a pending entry.
    pub async fn invoke_request(&self, method: impl Into<String>, params: Option<Value>) -> Result<Outcome, CoreError> {
        let id = RequestId::Number(self.next_id.fetch_add(1, Ordering::Relaxed));
        let (tx, rx) = oneshot::channel();
        self.pending.insert(id.clone(), tx);

        let request = JsonRpcRequest { jsonrpc: "2.0", id: id.clone(), method: method.into(), params };
        if let Err(err) = self.output.send_request(&request) {
            self.pending.remove(&id);
            return Err(err);
        }

        rx.await.map_err(|_| CoreError::ConnectionLost)
    }

    /// Send a fire-and-forget outbound notification.
    pub fn invoke_notification(&self, method: impl Into<String>, params: Option<Value>) -> Result<(), CoreError> {
        let notification = JsonRpcNotification { jsonrpc: "2.0", method: method.into(), params };
        self.output.send_notification(&notification)
    }

    /// Request the peer's outbound-side cancellation of `id` by sending
    /// `$/cancelRequest` (spec §4.5: "an implementation may support the
    /// outbound side ... when a local await is cancelled before completion").
    pub fn cancel_outbound(&self, id: RequestId) -> Result<(), CoreError> {
        self.invoke_notification(
            lrpc_protocol::methods::CANCEL_REQUEST,
            Some(serde_json::json!({ "id": id })),
        )
    }

    /// Settle the pending promise for `id` with an inbound response. A
    /// response for an id with no matching entry is discarded silently
    /// (spec §3 invariant), after logging.
    pub fn settle(&self, id: RequestId, outcome: Outcome) {
        match self.pending.remove(&id) {
            Some((_, tx)) => {
                let _ = tx.send(outcome); // a dropped receiver means the local await was abandoned
            }
            None => {
                eprintln!("[lrpc:router] {}", CoreError::UnmatchedResponse { id });
            }
        }
    }

    /// The connection has ended: reject every still-pending promise with a
    /// connection-lost error (spec §3, §4.5, §7).
    pub fn connection_lost(&self) {
        let ids: Vec<RequestId> = self.pending.iter().map(|entry| entry.key().clone()).collect();
        for id in ids {
            if let Some((_, tx)) = self.pending.remove(&id) {
                let _ = tx.send(Err(internal_error("connection lost")));
            }
        }
    }
}

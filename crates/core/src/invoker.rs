//! Request Invoker (spec §4.4): the heart of the core.
//!
//! Schedules each inbound request's handler under the cancellation, timeout,
//! serial-group, and concurrency policies of spec §4.4–§5, and guarantees
//! exactly one reply per request id (spec §8).

use std::sync::Arc;

use dashmap::DashMap;
use serde_json::Value;
use tokio::sync::{oneshot, Semaphore};

use lrpc_protocol::{content_modified, invalid_params, method_not_found, request_cancelled, JsonRpcResponse, RequestId};

use crate::cancellation::{CancelReason, CancelToken};
use crate::config::InvokerConfig;
use crate::output::OutputHandler;
use crate::registry::{Handler, HandlerRegistry, RequestBinding, ResultValidator};

struct InFlightEntry {
    cancel: CancelToken,
    uri: Option<String>,
}

/// Executes registered handlers under composed cancellation, timeout, serial
/// group, and concurrency policies (spec §4.4).
///
/// The in-flight table uses `dashmap` for fine-grained concurrent map
/// semantics (spec §5's "atomic insert/remove/lookup, no long-held global
/// lock") rather than a single `Mutex<HashMap<_>>`.
pub struct RequestInvoker {
    registry: HandlerRegistry,
    config: InvokerConfig,
    output: Arc<OutputHandler>,
    in_flight: DashMap<RequestId, InFlightEntry>,
    serial_tails: DashMap<String, oneshot::Receiver<()>>,
    concurrency: Option<Arc<Semaphore>>,
}

impl RequestInvoker {
    /// Build a new invoker that writes completed responses to `output`.
    pub fn new(registry: HandlerRegistry, config: InvokerConfig, output: Arc<OutputHandler>) -> Arc<Self> {
        let concurrency = (config.concurrency > 0).then(|| Arc::new(Semaphore::new(config.concurrency)));
        Arc::new(Self {
            registry,
            config,
            output,
            in_flight: DashMap::new(),
            serial_tails: DashMap::new(),
            concurrency,
        })
    }

    /// The scheduler handler dispatch and related background tasks run on
    /// (spec §6's `input_scheduler`).
    pub fn scheduler(&self) -> &tokio::runtime::Handle {
        &self.config.input_scheduler
    }

    /// Schedule a request for dispatch.
    ///
    /// Never blocks on the handler body (spec §4.6): the work runs on a
    /// spawned task and the reply is queued on the Output Handler once it
    /// settles. Params are validated against the descriptor's `params_schema`
    /// (spec §3) before anything is scheduled; a rejection replies
    /// `InvalidParams` without ever entering the in-flight table.
    pub fn dispatch_request(self: &Arc<Self>, id: RequestId, method: String, params: Option<Value>) {
        let Some(binding) = self.registry.lookup_request(&method) else {
            self.reply(JsonRpcResponse::failure(Some(id), method_not_found(&method)));
            return;
        };

        if let Some(validator) = &binding.params_schema {
            if let Err(reason) = validator(&params) {
                self.reply(JsonRpcResponse::failure(Some(id), invalid_params(&reason)));
                return;
            }
        }

        let uri = if self.config.supports_content_modified { extract_uri(&params) } else { None };
        let cancel = CancelToken::new();
        self.in_flight.insert(id.clone(), InFlightEntry { cancel: cancel.clone(), uri: uri.clone() });

        if let Some(timeout) = self.config.maximum_request_timeout {
            let watchdog_cancel = cancel.clone();
            self.config.input_scheduler.spawn(async move {
                tokio::time::sleep(timeout).await;
                watchdog_cancel.cancel(CancelReason::TimedOut);
            });
        }

        let this = self.clone();
        self.config.input_scheduler.spawn(async move {
            let response = this.run_request(id.clone(), binding, params, cancel, uri).await;
            this.in_flight.remove(&id);
            if let Some(response) = response {
                this.reply(response);
            }
        });
    }

    /// Consume a peer `$/cancelRequest` (spec §4.4 item 1). Never reaches
    /// user handlers.
    pub fn cancel_request(&self, id: &RequestId) {
        if let Some(entry) = self.in_flight.get(id) {
            entry.cancel.cancel(CancelReason::PeerCancelled);
        }
        // A cancel for an id not yet registered (or already completed) is
        // dropped silently: no retroactive queue (spec §4.4 item 1).
    }

    /// A content-modified trigger notification arrived targeting `uri`:
    /// cancel every in-flight request serving that document (spec §4.4 item
    /// 2, §6).
    pub fn content_modified(&self, uri: &str) {
        if !self.config.supports_content_modified {
            return;
        }
        for entry in self.in_flight.iter() {
            if entry.uri.as_deref() == Some(uri) {
                entry.cancel.cancel(CancelReason::ContentModified);
            }
        }
    }

    /// If `method` is one of the configured content-modified triggers and
    /// `params` carries a `textDocument.uri`, cancel in-flight requests
    /// targeting that document. No-op otherwise (spec §6's trigger set).
    pub fn notify_if_content_modified_trigger(&self, method: &str, params: &Option<Value>) {
        if !self.config.supports_content_modified {
            return;
        }
        if !self.config.content_modified_triggers.iter().any(|trigger| trigger == method) {
            return;
        }
        if let Some(uri) = extract_uri(params) {
            self.content_modified(&uri);
        }
    }

    /// Host-initiated shutdown: cancel every in-flight handle (spec §4.4 item 4).
    pub fn shutdown(&self) {
        for entry in self.in_flight.iter() {
            entry.cancel.cancel(CancelReason::ShutDown);
        }
    }

    /// Number of requests currently in flight (for tests/diagnostics).
    pub fn in_flight_count(&self) -> usize {
        self.in_flight.len()
    }

    async fn run_request(
        &self,
        id: RequestId,
        binding: RequestBinding,
        params: Option<Value>,
        cancel: CancelToken,
        uri: Option<String>,
    ) -> Option<JsonRpcResponse> {
        let RequestBinding { handler, serial_group, result_schema, .. } = binding;

        let Some(group) = serial_group else {
            return self.run_with_concurrency_limit(&id, &handler, params, &cancel, uri.as_deref(), result_schema.as_ref()).await;
        };

        let (ticket, release) = self.join_serial_group(&group);
        tokio::select! {
            _ = ticket => {}
            _ = cancel.cancelled() => {
                let _ = release.send(());
                return cancelled_response(id, &cancel, uri.as_deref());
            }
        }
        let response =
            self.run_with_concurrency_limit(&id, &handler, params, &cancel, uri.as_deref(), result_schema.as_ref()).await;
        let _ = release.send(());
        response
    }

    async fn run_with_concurrency_limit(
        &self,
        id: &RequestId,
        handler: &Arc<dyn Handler>,
        params: Option<Value>,
        cancel: &CancelToken,
        uri: Option<&str>,
        result_schema: Option<&ResultValidator>,
    ) -> Option<JsonRpcResponse> {
        let _permit = if let Some(semaphore) = &self.concurrency {
            tokio::select! {
                permit = semaphore.clone().acquire_owned() => {
                    if permit.is_err() {
                        return cancelled_response(id.clone(), cancel, uri);
                    }
                    permit.ok()
                }
                _ = cancel.cancelled() => return cancelled_response(id.clone(), cancel, uri),
            }
        } else {
            None
        };

        if cancel.is_cancelled() {
            return cancelled_response(id.clone(), cancel, uri);
        }

        tokio::select! {
            outcome = handler.handle(params, cancel.clone()) => {
                if cancel.is_cancelled() {
                    // A cancel source fired concurrently with (or just after)
                    // completion: the result is discarded, cancellation wins
                    // (spec §4.4 "Policy precedence", §8).
                    cancelled_response(id.clone(), cancel, uri)
                } else {
                    Some(match outcome {
                        Ok(result) => match result_schema.map(|validator| validator(&result)) {
                            Some(Err(reason)) => {
                                eprintln!(
                                    "[lrpc:invoker] handler for id {id:?} produced a result failing its schema: {reason}"
                                );
                                JsonRpcResponse::failure(
                                    Some(id.clone()),
                                    lrpc_protocol::internal_error(&format!("handler result failed validation: {reason}")),
                                )
                            }
                            _ => JsonRpcResponse::success(Some(id.clone()), result),
                        },
                        Err(error) => JsonRpcResponse::failure(Some(id.clone()), error),
                    })
                }
            }
            _ = cancel.cancelled() => cancelled_response(id.clone(), cancel, uri),
        }
    }

    /// Join `group`'s FIFO: returns a ticket to await before running, and a
    /// release to fire once this request's turn is over (completed or
    /// cancelled), handing off to whichever request joined next.
    fn join_serial_group(&self, group: &str) -> (oneshot::Receiver<()>, oneshot::Sender<()>) {
        let (tx, rx) = oneshot::channel();
        let mut slot = self.serial_tails.entry(group.to_string()).or_insert_with(|| {
            let (tx0, rx0) = oneshot::channel();
            let _ = tx0.send(());
            rx0
        });
        let prev = std::mem::replace(&mut *slot, rx);
        (prev, tx)
    }

    fn reply(&self, response: JsonRpcResponse) {
        if let Err(err) = self.output.send_response(&response) {
            eprintln!("[lrpc:invoker] failed to queue response for id {:?}: {err}", response.id);
        }
    }
}

/// Build the one reply a cancellation produces, or `None` for a shutdown
/// (spec §4.4 item 4: "no replies are emitted beyond those already in-flight").
fn cancelled_response(id: RequestId, cancel: &CancelToken, uri: Option<&str>) -> Option<JsonRpcResponse> {
    let reason = cancel.reason().unwrap_or(CancelReason::ShutDown);
    let error = match reason {
        CancelReason::ShutDown => return None,
        CancelReason::ContentModified => content_modified(uri.unwrap_or("<unknown>")),
        CancelReason::PeerCancelled | CancelReason::TimedOut => request_cancelled("request cancelled"),
    };
    Some(JsonRpcResponse::failure(Some(id), error))
}

fn extract_uri(params: &Option<Value>) -> Option<String> {
    params.as_ref()?.pointer("/textDocument/uri")?.as_str().map(str::to_string)
}

//! Input Handler (spec §4.6): drives Framer → Receiver → dispatch.

use std::sync::Arc;

use serde_json::Value;

use lrpc_protocol::{classify, invalid_request, parse_error, value_to_request_id, JsonRpcError, JsonRpcResponse, Message, RawMessage, RequestId};

use crate::invoker::RequestInvoker;
use crate::output::OutputHandler;
use crate::registry::HandlerRegistry;
use crate::router::ResponseRouter;

/// Drives the read loop: frame a message, parse JSON, classify, and route it
/// to the invoker, the registry's notification handlers, or the response
/// router. Never blocks the framer on handler execution (spec §4.6):
/// dispatch returns as soon as the work has been scheduled.
///
/// Because this loop processes one frame at a time on a single task,
/// sequential calls to `router.settle` already happen in received order —
/// the "internal ordered queue of side-effect units" spec §4.6 calls for
/// falls directly out of the loop's structure rather than needing a
/// separate queue abstraction.
pub struct InputHandler {
    registry: HandlerRegistry,
    invoker: Arc<RequestInvoker>,
    router: Arc<ResponseRouter>,
    output: Arc<OutputHandler>,
}

impl InputHandler {
    /// Build an input handler wired to the given components.
    pub fn new(
        registry: HandlerRegistry,
        invoker: Arc<RequestInvoker>,
        router: Arc<ResponseRouter>,
        output: Arc<OutputHandler>,
    ) -> Self {
        Self { registry, invoker, router, output }
    }

    /// Run the read loop to completion: clean EOF, or a fatal I/O error.
    ///
    /// On return, the connection is considered ended: all pending outbound
    /// requests are rejected and all in-flight handles are cancelled (spec §7
    /// "Framing fatal errors").
    pub async fn run<R>(&self, mut reader: R) -> std::io::Result<()>
    where
        R: tokio::io::AsyncBufRead + Unpin,
    {
        loop {
            match lrpc_transport::read_frame(&mut reader).await {
                Ok(Some(body)) => self.handle_frame(&body),
                Ok(None) => break,
                Err(err) => {
                    eprintln!("[lrpc:input] fatal I/O error, terminating: {err}");
                    self.terminate();
                    return Err(err);
                }
            }
        }

        self.terminate();
        Ok(())
    }

    fn handle_frame(&self, frame: &[u8]) {
        let raw: RawMessage = match serde_json::from_slice(frame) {
            Ok(raw) => raw,
            Err(err) => {
                eprintln!("[lrpc:input] parse error: {err}");
                self.reply_error(None, parse_error(&err.to_string()));
                return;
            }
        };

        match classify(raw) {
            Ok(Message::Request { id, method, params }) => self.invoker.dispatch_request(id, method, params),
            Ok(Message::Notification { method, params }) => self.handle_notification(method, params),
            Ok(Message::Response { id, outcome }) => self.router.settle(id, outcome),
            Err(invalid) => {
                eprintln!("[lrpc:input] invalid envelope: {}", invalid.reason);
                self.reply_error(invalid.recovered_id, invalid_request(&invalid.reason));
            }
        }
    }

    fn handle_notification(&self, method: String, params: Option<Value>) {
        if method == lrpc_protocol::methods::CANCEL_REQUEST {
            // Consumed here; never reaches user handlers (spec §4.4).
            if let Some(id) = params.as_ref().and_then(|p| p.get("id")).and_then(value_to_request_id) {
                self.invoker.cancel_request(&id);
            }
            return;
        }

        self.invoker.notify_if_content_modified_trigger(&method, &params);

        // Fan out in registration order; each handler runs fire-and-forget
        // (spec §4.4 "Notification handling").
        for handler in self.registry.lookup_notifications(&method) {
            let params = params.clone();
            self.invoker.scheduler().spawn(async move {
                handler.handle(params).await;
            });
        }
    }

    fn reply_error(&self, id: Option<RequestId>, error: JsonRpcError) {
        let response = JsonRpcResponse::failure(id, error);
        if let Err(err) = self.output.send_response(&response) {
            eprintln!("[lrpc:input] failed to queue error reply: {err}");
        }
    }

    fn terminate(&self) {
        self.invoker.shutdown();
        self.router.connection_lost();
    }
}

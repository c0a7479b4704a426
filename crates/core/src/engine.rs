//! Wires the Framer, Handler Registry, Request Invoker, Response Router,
//! Input Handler, and Output Handler into one running connection.

use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncBufRead, AsyncWrite};
use tokio::task::JoinHandle;

use crate::config::InvokerConfig;
use crate::input::InputHandler;
use crate::invoker::RequestInvoker;
use crate::output::OutputHandler;
use crate::registry::HandlerRegistry;
use crate::router::ResponseRouter;

/// A running connection: one Input Handler task reading `reader`, one Output
/// Handler task writing `writer`, and the invoker/router coordinating
/// everything in between (spec §5: "exactly one task reads ... exactly one
/// task writes").
pub struct Engine {
    registry: HandlerRegistry,
    invoker: Arc<RequestInvoker>,
    router: Arc<ResponseRouter>,
    output: Arc<OutputHandler>,
    input_task: JoinHandle<std::io::Result<()>>,
}

impl Engine {
    /// Start a connection over `reader`/`writer` with the given `registry`
    /// and `config`. The registry is shared with the caller so handlers can
    /// be registered and deregistered while the engine runs.
    pub fn start<R, W>(reader: R, writer: W, registry: HandlerRegistry, config: InvokerConfig) -> Self
    where
        R: AsyncBufRead + Unpin + Send + 'static,
        W: AsyncWrite + Unpin + Send + 'static,
    {
        let output = Arc::new(OutputHandler::spawn(writer));
        let invoker = RequestInvoker::new(registry.clone(), config, output.clone());
        let router = ResponseRouter::new(output.clone());

        let input = InputHandler::new(registry.clone(), invoker.clone(), router.clone(), output.clone());
        let input_task = tokio::spawn(async move { input.run(reader).await });

        Self { registry, invoker, router, output, input_task }
    }

    /// The shared handler registry: register/deregister request and
    /// notification handlers while the engine is running (spec §4.3).
    pub fn registry(&self) -> &HandlerRegistry {
        &self.registry
    }

    /// The client façade for outbound requests/notifications (spec §4.5, §6).
    pub fn router(&self) -> &Arc<ResponseRouter> {
        &self.router
    }

    /// Number of requests currently in flight.
    pub fn in_flight_count(&self) -> usize {
        self.invoker.in_flight_count()
    }

    /// Host-initiated shutdown (spec §4.4 item 4): cancel every in-flight
    /// handle, reject every pending outbound promise, and drain the Output
    /// Handler's queue up to `drain_deadline` before returning.
    pub async fn shutdown(self, drain_deadline: Duration) -> std::io::Result<()> {
        self.invoker.shutdown();
        self.router.connection_lost();
        self.output.stop(drain_deadline).await;
        self.input_task.await.unwrap_or(Ok(()))
    }

    /// Wait for the input loop to end on its own (clean EOF or fatal I/O
    /// error) without initiating shutdown.
    pub async fn join(self) -> std::io::Result<()> {
        self.input_task.await.unwrap_or(Ok(()))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::registry::{Handler, RequestDescriptor};
    use async_trait::async_trait;
    use lrpc_protocol::JsonRpcError;
    use serde_json::Value;
    use std::sync::Arc as StdArc;
    use tokio::io::BufReader;

    struct Echo;

    #[async_trait]
    impl Handler for Echo {
        async fn handle(
            &self,
            params: Option<Value>,
            _cancel: crate::cancellation::CancelToken,
        ) -> Result<Value, JsonRpcError> {
            Ok(params.unwrap_or(Value::Null))
        }
    }

    #[tokio::test]
    async fn round_trips_a_request_through_the_whole_pipeline() {
        let (mut test_writer, engine_reader) = tokio::io::duplex(65536);
        let (engine_writer, test_reader) = tokio::io::duplex(65536);
        let mut test_reader = BufReader::new(test_reader);

        let registry = HandlerRegistry::new();
        let _handle = registry.register_request(RequestDescriptor::new("echo", StdArc::new(Echo))).unwrap();
        let engine = Engine::start(BufReader::new(engine_reader), engine_writer, registry, InvokerConfig::default());

        lrpc_transport::write_frame(
            &mut test_writer,
            br#"{"jsonrpc":"2.0","id":7,"method":"echo","params":{"n":42}}"#,
        )
        .await
        .unwrap();

        let body = lrpc_transport::read_frame(&mut test_reader).await.unwrap().unwrap();
        let text = String::from_utf8(body).unwrap();
        assert!(text.contains("\"id\":7"));
        assert!(text.contains("42"));

        drop(test_writer);
        engine.shutdown(Duration::from_millis(200)).await.unwrap();
    }
}

//! Shared test fixtures: an in-memory duplex pipe standing in for the peer,
//! plus small frame read/write helpers (spec §9.4).
#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::time::Duration;

use lrpc_core::{Engine, HandlerRegistry, InvokerConfig};
use tokio::io::{AsyncWrite, BufReader, DuplexStream};

/// One end of an in-memory connection with a running [`Engine`] on the other.
pub struct TestPeer {
    pub registry: HandlerRegistry,
    pub engine: Engine,
    pub writer: DuplexStream,
    pub reader: BufReader<DuplexStream>,
}

/// Spin up an [`Engine`] wired to `registry`, connected to an in-memory pipe
/// this test drives as the peer.
pub fn spawn_engine(registry: HandlerRegistry, config: InvokerConfig) -> TestPeer {
    let (test_writer, engine_reader) = tokio::io::duplex(1 << 16);
    let (engine_writer, test_reader) = tokio::io::duplex(1 << 16);
    let engine = Engine::start(BufReader::new(engine_reader), engine_writer, registry.clone(), config);
    TestPeer { registry, engine, writer: test_writer, reader: BufReader::new(test_reader) }
}

/// Send a raw JSON body as a framed message.
pub async fn send(writer: &mut (impl AsyncWrite + Unpin), body: &str) {
    lrpc_transport::write_frame(writer, body.as_bytes()).await.unwrap();
}

/// Read and parse the next framed JSON body, with a generous timeout so a
/// bug that drops a reply fails the test instead of hanging the suite.
pub async fn recv_json(reader: &mut BufReader<DuplexStream>) -> serde_json::Value {
    let body = tokio::time::timeout(Duration::from_secs(5), lrpc_transport::read_frame(reader))
        .await
        .expect("timed out waiting for a reply")
        .unwrap()
        .expect("connection closed before a reply arrived");
    serde_json::from_slice(&body).unwrap()
}

//! Integration tests for spec §8's testable properties and concrete
//! scenarios, driven end-to-end through [`lrpc_core::Engine`] over an
//! in-memory pipe.
#![allow(clippy::unwrap_used, clippy::expect_used)]

mod common;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use common::{recv_json, send, spawn_engine};
use lrpc_core::{CancelToken, Handler, HandlerRegistry, InvokerConfig, NotificationHandler, RequestDescriptor};
use lrpc_protocol::JsonRpcError;
use serde_json::{json, Value};
use tokio::sync::Notify;

struct Echo;

#[async_trait]
impl Handler for Echo {
    async fn handle(&self, params: Option<Value>, _cancel: CancelToken) -> Result<Value, JsonRpcError> {
        Ok(params.unwrap_or(Value::Null))
    }
}

/// A handler that signals `started` then blocks until cancelled, returning a
/// value a correct invoker must discard.
struct BlocksUntilCancelled {
    started: Arc<Notify>,
}

#[async_trait]
impl Handler for BlocksUntilCancelled {
    async fn handle(&self, _params: Option<Value>, cancel: CancelToken) -> Result<Value, JsonRpcError> {
        self.started.notify_one();
        cancel.cancelled().await;
        Ok(json!("should never be observed"))
    }
}

#[tokio::test]
async fn cooperative_peer_cancellation() {
    let registry = HandlerRegistry::new();
    let started = Arc::new(Notify::new());
    let _handle =
        registry.register_request(RequestDescriptor::new("block", Arc::new(BlocksUntilCancelled { started: started.clone() }))).unwrap();
    let mut peer = spawn_engine(registry, InvokerConfig::default());

    send(&mut peer.writer, r#"{"jsonrpc":"2.0","id":1,"method":"block","params":{}}"#).await;
    started.notified().await;
    send(&mut peer.writer, r#"{"jsonrpc":"2.0","method":"$/cancelRequest","params":{"id":1}}"#).await;

    let reply = recv_json(&mut peer.reader).await;
    assert_eq!(reply["id"], json!(1));
    assert_eq!(reply["error"]["code"], json!(-32800));
}

#[tokio::test]
async fn content_modified_abandonment() {
    let registry = HandlerRegistry::new();
    let started = Arc::new(Notify::new());
    let _handle =
        registry.register_request(RequestDescriptor::new("hover", Arc::new(BlocksUntilCancelled { started: started.clone() }))).unwrap();
    let mut peer = spawn_engine(registry, InvokerConfig::default());

    send(
        &mut peer.writer,
        r#"{"jsonrpc":"2.0","id":1,"method":"hover","params":{"textDocument":{"uri":"file:///a.rs"}}}"#,
    )
    .await;
    started.notified().await;
    send(
        &mut peer.writer,
        r#"{"jsonrpc":"2.0","method":"textDocument/didChange","params":{"textDocument":{"uri":"file:///a.rs"}}}"#,
    )
    .await;

    let reply = recv_json(&mut peer.reader).await;
    assert_eq!(reply["id"], json!(1));
    assert_eq!(reply["error"]["code"], json!(-32801));
}

#[tokio::test(start_paused = true)]
async fn timeout_cancels_a_handle_that_never_completes() {
    let registry = HandlerRegistry::new();
    let started = Arc::new(Notify::new());
    let _handle =
        registry.register_request(RequestDescriptor::new("block", Arc::new(BlocksUntilCancelled { started: started.clone() }))).unwrap();
    let config = InvokerConfig { maximum_request_timeout: Some(Duration::from_secs(30)), ..Default::default() };
    let mut peer = spawn_engine(registry, config);

    send(&mut peer.writer, r#"{"jsonrpc":"2.0","id":1,"method":"block","params":{}}"#).await;
    started.notified().await;
    tokio::time::advance(Duration::from_secs(31)).await;

    let reply = recv_json(&mut peer.reader).await;
    assert_eq!(reply["id"], json!(1));
    assert_eq!(reply["error"]["code"], json!(-32800));
}

#[tokio::test]
async fn method_not_found_for_an_unregistered_method() {
    let registry = HandlerRegistry::new();
    let mut peer = spawn_engine(registry, InvokerConfig::default());

    send(&mut peer.writer, r#"{"jsonrpc":"2.0","id":1,"method":"nonexistent/thing","params":{}}"#).await;

    let reply = recv_json(&mut peer.reader).await;
    assert_eq!(reply["error"]["code"], json!(-32601));
}

#[tokio::test]
async fn parse_error_recovers_and_the_next_request_still_replies() {
    let registry = HandlerRegistry::new();
    let _handle = registry.register_request(RequestDescriptor::new("echo", Arc::new(Echo))).unwrap();
    let mut peer = spawn_engine(registry, InvokerConfig::default());

    send(&mut peer.writer, "{this is not json").await;
    send(&mut peer.writer, r#"{"jsonrpc":"2.0","id":1,"method":"echo","params":"ok"}"#).await;

    let first = recv_json(&mut peer.reader).await;
    assert_eq!(first["id"], Value::Null);
    assert_eq!(first["error"]["code"], json!(-32700));

    let second = recv_json(&mut peer.reader).await;
    assert_eq!(second["id"], json!(1));
    assert_eq!(second["result"], json!("ok"));
}

struct CountingNotification(Arc<AtomicUsize>);

#[async_trait]
impl NotificationHandler for CountingNotification {
    async fn handle(&self, _params: Option<Value>) {
        self.0.fetch_add(1, Ordering::SeqCst);
    }
}

#[tokio::test]
async fn delayed_notification_delivery_has_exactly_once_accounting() {
    let registry = HandlerRegistry::new();
    let count = Arc::new(AtomicUsize::new(0));
    let _handle = registry.register_notification("textDocument/didSave", Arc::new(CountingNotification(count.clone())));
    let mut peer = spawn_engine(registry, InvokerConfig::default());

    for _ in 0..5 {
        send(
            &mut peer.writer,
            r#"{"jsonrpc":"2.0","method":"textDocument/didSave","params":{"textDocument":{"uri":"file:///a.rs"}}}"#,
        )
        .await;
    }

    // Notifications are fire-and-forget with no reply to await on, so give
    // the fanned-out tasks a beat to run before asserting the count.
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(count.load(Ordering::SeqCst), 5);
}

#[tokio::test]
async fn every_request_id_gets_exactly_one_reply() {
    let registry = HandlerRegistry::new();
    let _handle = registry.register_request(RequestDescriptor::new("echo", Arc::new(Echo))).unwrap();
    let mut peer = spawn_engine(registry, InvokerConfig::default());

    for i in 0..10 {
        send(&mut peer.writer, &format!(r#"{{"jsonrpc":"2.0","id":{i},"method":"echo","params":{i}}}"#)).await;
    }

    let mut seen = std::collections::HashSet::new();
    for _ in 0..10 {
        let reply = recv_json(&mut peer.reader).await;
        let id = reply["id"].as_i64().unwrap();
        assert!(seen.insert(id), "id {id} replied to more than once");
    }
    assert_eq!(seen.len(), 10);
}

#[tokio::test]
async fn serial_group_orders_handler_starts_after_prior_completion() {
    let order = Arc::new(tokio::sync::Mutex::new(Vec::<i64>::new()));

    struct RecordOrder {
        order: Arc<tokio::sync::Mutex<Vec<i64>>>,
    }

    #[async_trait]
    impl Handler for RecordOrder {
        async fn handle(&self, params: Option<Value>, _cancel: CancelToken) -> Result<Value, JsonRpcError> {
            let n = params.as_ref().and_then(|p| p.as_i64()).unwrap_or(-1);
            tokio::time::sleep(Duration::from_millis(5)).await;
            self.order.lock().await.push(n);
            Ok(json!(n))
        }
    }

    let registry = HandlerRegistry::new();
    let _handle = registry
        .register_request(RequestDescriptor::new("op", Arc::new(RecordOrder { order: order.clone() })).serial_group("doc"))
        .unwrap();
    let mut peer = spawn_engine(registry, InvokerConfig::default());

    send(&mut peer.writer, r#"{"jsonrpc":"2.0","id":1,"method":"op","params":1}"#).await;
    send(&mut peer.writer, r#"{"jsonrpc":"2.0","id":2,"method":"op","params":2}"#).await;
    send(&mut peer.writer, r#"{"jsonrpc":"2.0","id":3,"method":"op","params":3}"#).await;

    let _r1 = recv_json(&mut peer.reader).await;
    let _r2 = recv_json(&mut peer.reader).await;
    let _r3 = recv_json(&mut peer.reader).await;

    assert_eq!(*order.lock().await, vec![1, 2, 3]);
}

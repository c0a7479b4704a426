//! Output Handler: single-writer FIFO queue for outbound frames (spec §4.7).

use std::time::Duration;

use parking_lot::Mutex;
use tokio::io::AsyncWrite;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use lrpc_protocol::{JsonRpcNotification, JsonRpcRequest, JsonRpcResponse};

use crate::error::CoreError;

/// Serializes outbound frames through a single writer task (spec §4.7).
///
/// Writes are ordered by completion, not receipt — callers send a response
/// only once its handler has actually finished, so channel order already is
/// completion order. A write failure on the underlying sink terminates the
/// writer task; subsequent sends then fail with [`CoreError::ConnectionLost`].
pub struct OutputHandler {
    sender: Mutex<Option<mpsc::UnboundedSender<Vec<u8>>>>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl OutputHandler {
    /// Spawn the writer task over `writer`.
    pub fn spawn<W>(writer: W) -> Self
    where
        W: AsyncWrite + Unpin + Send + 'static,
    {
        let (sender, mut receiver) = mpsc::unbounded_channel::<Vec<u8>>();
        let task = tokio::spawn(async move {
            let mut writer = writer;
            while let Some(body) = receiver.recv().await {
                if let Err(err) = lrpc_transport::write_frame(&mut writer, &body).await {
                    eprintln!("[lrpc:output] write failed, terminating output handler: {err}");
                    break;
                }
            }
        });
        Self { sender: Mutex::new(Some(sender)), task: Mutex::new(Some(task)) }
    }

    /// Queue a response frame.
    pub fn send_response(&self, response: &JsonRpcResponse) -> Result<(), CoreError> {
        self.send(serde_json::to_vec(response)?)
    }

    /// Queue an outbound request frame.
    pub fn send_request(&self, request: &JsonRpcRequest) -> Result<(), CoreError> {
        self.send(serde_json::to_vec(request)?)
    }

    /// Queue an outbound notification frame.
    pub fn send_notification(&self, notification: &JsonRpcNotification) -> Result<(), CoreError> {
        self.send(serde_json::to_vec(notification)?)
    }

    fn send(&self, body: Vec<u8>) -> Result<(), CoreError> {
        match self.sender.lock().as_ref() {
            Some(tx) => tx.send(body).map_err(|_| CoreError::ConnectionLost),
            None => Err(CoreError::ConnectionLost),
        }
    }

    /// Idempotent shutdown: stop accepting new frames and drain whatever is
    /// already queued, up to `deadline` (spec §4.7).
    pub async fn stop(&self, deadline: Duration) {
        self.sender.lock().take();
        let task = self.task.lock().take();
        let Some(task) = task else {
            return; // already stopped
        };
        if tokio::time::timeout(deadline, task).await.is_err() {
            eprintln!("[lrpc:output] stop deadline exceeded, output handler still draining");
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use lrpc_protocol::RequestId;
    use serde_json::json;

    #[tokio::test]
    async fn writes_queued_frames_in_order() {
        let mut buf = Vec::new();
        // A Cursor<Vec<u8>> doesn't implement AsyncWrite directly; wrap it.
        let (client, mut server) = tokio::io::duplex(4096);
        let output = OutputHandler::spawn(client);

        output
            .send_response(&JsonRpcResponse::success(Some(RequestId::Number(1)), json!("a")))
            .unwrap();
        output
            .send_response(&JsonRpcResponse::success(Some(RequestId::Number(2)), json!("b")))
            .unwrap();
        output.stop(Duration::from_secs(1)).await;

        use tokio::io::AsyncReadExt;
        server.read_to_end(&mut buf).await.unwrap();
        let text = String::from_utf8(buf).unwrap();
        let first = text.find("\"id\":1").unwrap();
        let second = text.find("\"id\":2").unwrap();
        assert!(first < second);
    }

    #[tokio::test]
    async fn send_after_stop_fails() {
        let (client, _server) = tokio::io::duplex(4096);
        let output = OutputHandler::spawn(client);
        output.stop(Duration::from_secs(1)).await;
        let err = output.send_response(&JsonRpcResponse::success(Some(RequestId::Number(1)), json!(null)));
        assert!(matches!(err, Err(CoreError::ConnectionLost)));
    }
}

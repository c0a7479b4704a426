//! Errors originating from the transport/dispatch core itself (spec §9.2 of
//! the design doc), distinct from the per-request [`lrpc_protocol::JsonRpcError`]
//! wire type returned to a peer.

use lrpc_protocol::RequestId;

/// Fallible outcomes of the core's own operations — registration, connection
/// lifecycle, I/O — never a single request's JSON-RPC result.
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    /// A second request descriptor was registered for a method that already
    /// has one. Notification descriptors never conflict (fan-out).
    #[error("a request handler is already registered for method {method:?}")]
    DuplicateHandler {
        /// The method name that collided.
        method: String,
    },
    /// The connection ended while outbound requests, or queued replies, were
    /// still pending.
    #[error("connection lost")]
    ConnectionLost,
    /// A response arrived for an id with no matching pending outbound
    /// request. Not fatal — the caller logs and discards it.
    #[error("response id {id} has no matching outbound request")]
    UnmatchedResponse {
        /// The unmatched id.
        id: RequestId,
    },
    /// Encoding or decoding a JSON-RPC payload failed.
    #[error("JSON encode/decode error")]
    Json(#[from] serde_json::Error),
    /// The underlying byte stream failed.
    #[error("transport I/O error")]
    Io(#[from] std::io::Error),
}

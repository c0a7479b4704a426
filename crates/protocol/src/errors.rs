//! Standard JSON-RPC and LSP-specific error codes (spec §6, §7).

use crate::jsonrpc::JsonRpcError;

/// Error codes reserved by this core (spec §6).
pub mod error_codes {
    /// Malformed JSON in the request body.
    pub const PARSE_ERROR: i32 = -32700;
    /// The envelope fails validity (spec §4.2).
    pub const INVALID_REQUEST: i32 = -32600;
    /// No descriptor matches the requested method.
    pub const METHOD_NOT_FOUND: i32 = -32601;
    /// Params don't satisfy the descriptor.
    pub const INVALID_PARAMS: i32 = -32602;
    /// Uncaught handler error.
    pub const INTERNAL_ERROR: i32 = -32603;
    /// Peer cancel (`$/cancelRequest`) or invoker-side timeout.
    pub const REQUEST_CANCELLED: i32 = -32800;
    /// The document a request was serving was mutated mid-flight.
    pub const CONTENT_MODIFIED: i32 = -32801;
    /// Start of the server-defined pass-through range.
    pub const SERVER_ERROR_START: i32 = -32099;
    /// End of the server-defined pass-through range.
    pub const SERVER_ERROR_END: i32 = -32000;
}

/// Build a `MethodNotFound` error for an unregistered method.
pub fn method_not_found(method: &str) -> JsonRpcError {
    JsonRpcError::new(error_codes::METHOD_NOT_FOUND, format!("method not found: {method}"))
}

/// Build an `InvalidRequest` error with the given reason.
pub fn invalid_request(reason: &str) -> JsonRpcError {
    JsonRpcError::new(error_codes::INVALID_REQUEST, reason)
}

/// Build a `ParseError` error for malformed JSON.
pub fn parse_error(reason: &str) -> JsonRpcError {
    JsonRpcError::new(error_codes::PARSE_ERROR, format!("parse error: {reason}"))
}

/// Build an `InvalidParams` error: the descriptor's `params_schema` rejected
/// the request's params.
pub fn invalid_params(reason: &str) -> JsonRpcError {
    JsonRpcError::new(error_codes::INVALID_PARAMS, format!("invalid params: {reason}"))
}

/// Build an `InternalError` wrapping an uncaught handler failure.
pub fn internal_error(reason: &str) -> JsonRpcError {
    JsonRpcError::new(error_codes::INTERNAL_ERROR, reason)
}

/// Build a `RequestCancelled` error (peer cancel or timeout).
pub fn request_cancelled(reason: &str) -> JsonRpcError {
    JsonRpcError::new(error_codes::REQUEST_CANCELLED, reason)
}

/// Build a `ContentModified` error.
pub fn content_modified(uri: &str) -> JsonRpcError {
    JsonRpcError::new(
        error_codes::CONTENT_MODIFIED,
        format!("document modified during request: {uri}"),
    )
}

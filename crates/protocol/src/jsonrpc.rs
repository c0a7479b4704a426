//! JSON-RPC 2.0 message types.
//!
//! Core request, response, and error types shared by the transport and
//! dispatch layers. Deserialization here is intentionally permissive (every
//! field is optional except what distinguishes the four envelope shapes) so
//! that the receiver can classify malformed input instead of failing to
//! parse it at all.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// A JSON-RPC request/response identifier.
///
/// The wire format allows string or integer ids; this type preserves
/// whichever the peer sent so it can be echoed back verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RequestId {
    /// A numeric id, as sent by most LSP clients.
    Number(i64),
    /// A string id.
    String(String),
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RequestId::Number(n) => write!(f, "{n}"),
            RequestId::String(s) => write!(f, "{s}"),
        }
    }
}

impl From<i64> for RequestId {
    fn from(value: i64) -> Self {
        RequestId::Number(value)
    }
}

impl From<String> for RequestId {
    fn from(value: String) -> Self {
        RequestId::String(value)
    }
}

/// The raw shape of any incoming JSON-RPC object, before classification.
///
/// Every field is optional at this layer: a malformed message still
/// deserializes into `RawMessage`, and the receiver decides what's wrong
/// with it rather than bailing out of `serde_json` with no id to reply to.
#[derive(Debug, Clone, Deserialize)]
pub struct RawMessage {
    /// Must be exactly `"2.0"` for a valid envelope.
    #[serde(default)]
    pub jsonrpc: Option<Value>,
    /// Present on requests and responses, absent on notifications.
    #[serde(default)]
    pub id: Option<Value>,
    /// Present on requests and notifications.
    #[serde(default)]
    pub method: Option<String>,
    /// Present on requests and notifications.
    #[serde(default)]
    pub params: Option<Value>,
    /// Present on successful responses.
    #[serde(default)]
    pub result: Option<Value>,
    /// Present on failed responses.
    #[serde(default)]
    pub error: Option<JsonRpcError>,
}

/// A fully-formed outbound request.
#[derive(Debug, Clone, Serialize)]
pub struct JsonRpcRequest {
    pub jsonrpc: &'static str,
    pub id: RequestId,
    pub method: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
}

/// A fully-formed outbound notification.
#[derive(Debug, Clone, Serialize)]
pub struct JsonRpcNotification {
    pub jsonrpc: &'static str,
    pub method: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
}

/// JSON-RPC 2.0 response message.
///
/// Exactly one of `result`/`error` is set; construct via [`JsonRpcResponse::success`]
/// or [`JsonRpcResponse::failure`] rather than the fields directly.
#[derive(Debug, Clone, Serialize)]
pub struct JsonRpcResponse {
    pub jsonrpc: &'static str,
    pub id: Option<RequestId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<JsonRpcError>,
}

impl JsonRpcResponse {
    /// Build a success response.
    pub fn success(id: Option<RequestId>, result: Value) -> Self {
        Self { jsonrpc: "2.0", id, result: Some(result), error: None }
    }

    /// Build an error response.
    pub fn failure(id: Option<RequestId>, error: JsonRpcError) -> Self {
        Self { jsonrpc: "2.0", id, result: None, error: Some(error) }
    }
}

/// JSON-RPC 2.0 error object.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcError {
    pub code: i32,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl JsonRpcError {
    /// Create a new error with no extra data.
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self { code, message: message.into(), data: None }
    }

    /// Create a new error carrying structured data.
    pub fn with_data(code: i32, message: impl Into<String>, data: Value) -> Self {
        Self { code, message: message.into(), data: Some(data) }
    }
}

impl fmt::Display for JsonRpcError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

impl std::error::Error for JsonRpcError {}

/// A classified inbound message, produced by the receiver from a [`RawMessage`].
#[derive(Debug, Clone)]
pub enum Message {
    Request { id: RequestId, method: String, params: Option<Value> },
    Notification { method: String, params: Option<Value> },
    Response { id: RequestId, outcome: Result<Value, JsonRpcError> },
}

/// Why a raw message failed envelope validation (§4.2 of the spec).
#[derive(Debug, Clone)]
pub struct InvalidEnvelope {
    /// The best-effort recovered id, if any `Value` was present and usable.
    pub recovered_id: Option<RequestId>,
    pub reason: String,
}

/// Classify a [`RawMessage`] per the validity rules in §4.2 of the spec.
///
/// Returns `Ok(Message)` for a well-formed request/notification/response, or
/// `Err(InvalidEnvelope)` carrying the best-effort id to reply to.
pub fn classify(raw: RawMessage) -> Result<Message, InvalidEnvelope> {
    let recovered_id = raw.id.as_ref().and_then(value_to_request_id);

    match &raw.jsonrpc {
        Some(Value::String(v)) if v == "2.0" => {}
        _ => {
            return Err(InvalidEnvelope {
                recovered_id,
                reason: "missing or invalid \"jsonrpc\" version".to_string(),
            });
        }
    }

    let has_id = raw.id.is_some();
    let has_method = raw.method.is_some();
    let has_result = raw.result.is_some();
    let has_error = raw.error.is_some();

    if has_method {
        let method = raw.method.unwrap_or_default();
        if has_id {
            let Some(id) = recovered_id else {
                return Err(InvalidEnvelope {
                    recovered_id: None,
                    reason: "request \"id\" must be a string or number".to_string(),
                });
            };
            Ok(Message::Request { id, method, params: raw.params })
        } else {
            Ok(Message::Notification { method, params: raw.params })
        }
    } else if has_id && (has_result || has_error) && !(has_result && has_error) {
        let Some(id) = recovered_id else {
            return Err(InvalidEnvelope {
                recovered_id: None,
                reason: "response \"id\" must be a string or number".to_string(),
            });
        };
        let outcome = match raw.error {
            Some(err) => Err(err),
            None => Ok(raw.result.unwrap_or(Value::Null)),
        };
        Ok(Message::Response { id, outcome })
    } else {
        Err(InvalidEnvelope {
            recovered_id,
            reason: "envelope is neither a request, notification, nor response".to_string(),
        })
    }
}

/// Recover a [`RequestId`] from a raw `id` field, if it's a string or number.
///
/// Shared by [`classify`] and anything else (the input handler's
/// `$/cancelRequest` parsing) that needs to turn a loose `Value` id back into
/// a typed one.
pub fn value_to_request_id(value: &Value) -> Option<RequestId> {
    match value {
        Value::String(s) => Some(RequestId::String(s.clone())),
        Value::Number(n) => n.as_i64().map(RequestId::Number),
        _ => None,
    }
}

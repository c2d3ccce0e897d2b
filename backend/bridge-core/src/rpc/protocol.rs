//! Wire protocol for the devflow bridge.
//!
//! Messages are JSON envelopes, one per line: TCP sockets and pipes carry a
//! raw byte stream with no message boundaries, so a trailing newline
//! delimits each frame. Every envelope carries a protocol version tag.
//!
//! A message is one of:
//!
//! - Request: `{"version": 1, "id": 7, "method": "ping", "params": {}}`
//! - Response: `{"version": 1, "id": 7, "result": {...}}`
//! - Error response: `{"version": 1, "id": 7, "error": {"code": -32601, "message": "..."}}`
//!
//! Exactly one of `result`/`error` is present on a response. Canonical
//! error codes follow the JSON-RPC convention; handlers may use their own
//! application-defined codes.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Current protocol version. Requests tagged with any other version are
/// rejected with [`INVALID_REQUEST`].
pub const PROTOCOL_VERSION: u32 = 1;

/// Response id used when the request id could not be recovered from an
/// unparsable frame. Clients drop responses carrying it.
pub const UNKNOWN_REQUEST_ID: u64 = 0;

/// Malformed payload, unparsable as JSON.
pub const PARSE_ERROR: i64 = -32700;
/// Parseable JSON that is not a well-formed request envelope.
pub const INVALID_REQUEST: i64 = -32600;
/// Well-formed request naming an unregistered method.
pub const METHOD_NOT_FOUND: i64 = -32601;
/// The registered handler failed or panicked.
pub const HANDLER_ERROR: i64 = -32000;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RpcRequest {
    pub version: u32,
    pub id: u64,
    pub method: String,
    #[serde(default)]
    pub params: Value,
}

impl RpcRequest {
    pub fn new(id: u64, method: &str, params: Value) -> Self {
        Self {
            version: PROTOCOL_VERSION,
            id,
            method: method.to_string(),
            params,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RpcError {
    pub code: i64,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl RpcError {
    pub fn parse_error(message: impl Into<String>) -> Self {
        Self {
            code: PARSE_ERROR,
            message: message.into(),
            data: None,
        }
    }

    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self {
            code: INVALID_REQUEST,
            message: message.into(),
            data: None,
        }
    }

    pub fn method_not_found(method: &str) -> Self {
        Self {
            code: METHOD_NOT_FOUND,
            message: format!("Method not found: {method}"),
            data: None,
        }
    }

    pub fn handler_error(message: impl Into<String>) -> Self {
        Self {
            code: HANDLER_ERROR,
            message: message.into(),
            data: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RpcResponse {
    pub version: u32,
    pub id: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<RpcError>,
}

impl RpcResponse {
    pub fn success(id: u64, result: Value) -> Self {
        Self {
            version: PROTOCOL_VERSION,
            id,
            result: Some(result),
            error: None,
        }
    }

    pub fn failure(id: u64, error: RpcError) -> Self {
        Self {
            version: PROTOCOL_VERSION,
            id,
            result: None,
            error: Some(error),
        }
    }

    /// Collapse the `result` XOR `error` pair into a `Result`.
    ///
    /// A response carrying neither (a protocol violation by the peer) is
    /// treated as an error so it cannot be mistaken for a null result.
    pub fn into_outcome(self) -> Result<Value, RpcError> {
        match (self.result, self.error) {
            (_, Some(error)) => Err(error),
            (Some(result), None) => Ok(result),
            (None, None) => Err(RpcError::invalid_request(
                "Response carried neither result nor error",
            )),
        }
    }
}

/// Parse one inbound frame into a request.
///
/// Distinguishes the two protocol-level failure classes: bytes that are not
/// JSON at all ([`PARSE_ERROR`]) and JSON that is not a well-formed request
/// envelope of the supported version ([`INVALID_REQUEST`]). The error
/// carries the id to tag the response with - [`UNKNOWN_REQUEST_ID`] unless
/// a numeric `id` field was recoverable from the frame.
pub fn parse_request(frame: &str) -> Result<RpcRequest, (u64, RpcError)> {
    let value: Value = serde_json::from_str(frame)
        .map_err(|e| (UNKNOWN_REQUEST_ID, RpcError::parse_error(e.to_string())))?;

    let id = value
        .as_object()
        .and_then(|envelope| envelope.get("id"))
        .and_then(Value::as_u64)
        .unwrap_or(UNKNOWN_REQUEST_ID);

    let request: RpcRequest = serde_json::from_value(value)
        .map_err(|e| (id, RpcError::invalid_request(e.to_string())))?;

    if request.version != PROTOCOL_VERSION {
        return Err((
            id,
            RpcError::invalid_request(format!(
                "Unsupported protocol version: {} (expected {PROTOCOL_VERSION})",
                request.version
            )),
        ));
    }

    Ok(request)
}

/// Render a message as one newline-terminated frame.
///
/// Serialization of the envelope types cannot fail (no non-string map keys,
/// no non-finite floats), so this is infallible by construction.
pub fn to_frame<T: Serialize>(message: &T) -> String {
    let mut frame = serde_json::to_string(message).unwrap_or_else(|_| {
        serde_json::to_string(&RpcResponse::failure(
            UNKNOWN_REQUEST_ID,
            RpcError::handler_error("Response could not be serialized"),
        ))
        .unwrap_or_default()
    });
    frame.push('\n');
    frame
}

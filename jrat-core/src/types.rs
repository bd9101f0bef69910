//! JSON-RPC 2.0 message types
//!
//! The client side of the protocol only ever *sends* requests and only ever
//! *receives* responses and notifications, but the types below cover every
//! message shape so inbound traffic can be classified before it is handled.
//!
//! # Request IDs
//!
//! Ids correlate a response with the request that caused it. Sessions assign
//! sequential numeric ids; servers may echo them back as-is.

use crate::error::RpcError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// JSON-RPC 2.0 request ID
///
/// Serialized untagged, so `Id::Number(7)` is plain `7` on the wire.
///
/// ```rust
/// use jrat_core::Id;
///
/// let id1: Id = "req-123".into();
/// let id2: Id = 42i64.into();
///
/// assert_eq!(id1.to_string(), "\"req-123\"");
/// assert_eq!(id2.to_string(), "42");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Id {
    /// String identifier
    String(String),
    /// Numeric identifier
    Number(i64),
    /// Null identifier (used by peers that could not read the request id)
    Null,
}

impl fmt::Display for Id {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Id::String(s) => write!(f, "\"{}\"", s),
            Id::Number(n) => write!(f, "{}", n),
            Id::Null => write!(f, "null"),
        }
    }
}

impl From<String> for Id {
    fn from(s: String) -> Self {
        Id::String(s)
    }
}

impl From<&str> for Id {
    fn from(s: &str) -> Self {
        Id::String(s.to_string())
    }
}

impl From<i64> for Id {
    fn from(n: i64) -> Self {
        Id::Number(n)
    }
}

/// JSON-RPC 2.0 request message
///
/// ```rust
/// use jrat_core::{JsonRpcRequest, Id};
/// use serde_json::json;
///
/// let request = JsonRpcRequest::new("subtract", Some(json!([42, 23])), Id::Number(1));
/// assert_eq!(request.jsonrpc, "2.0");
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JsonRpcRequest {
    /// Always "2.0"
    pub jsonrpc: String,
    /// Name of the remote method to invoke
    pub method: String,
    /// Positional (array) or named (object) parameters
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<serde_json::Value>,
    /// Correlation id
    pub id: Id,
}

impl JsonRpcRequest {
    /// Create a new JSON-RPC 2.0 request
    pub fn new(method: impl Into<String>, params: Option<serde_json::Value>, id: Id) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            method: method.into(),
            params,
            id,
        }
    }
}

/// JSON-RPC 2.0 notification message
///
/// Notifications carry no `id` and never get a response. On the client side
/// they are server-initiated events dispatched to registered handlers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JsonRpcNotification {
    /// Always "2.0"
    pub jsonrpc: String,
    /// Name of the notification
    pub method: String,
    /// Optional event data
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<serde_json::Value>,
}

impl JsonRpcNotification {
    /// Create a new JSON-RPC 2.0 notification
    pub fn new(method: impl Into<String>, params: Option<serde_json::Value>) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            method: method.into(),
            params,
        }
    }
}

/// JSON-RPC 2.0 response message
///
/// A well-formed response carries exactly one of `result` / `error`. Peers
/// are not always well-formed, so inbound responses go through
/// [`JsonRpcResponse::normalize`] before they are correlated: when both
/// members are present the error wins.
///
/// Note that `"result": null` deserializes to `result: None`; a response with
/// neither member is therefore a success whose result is `null`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JsonRpcResponse {
    /// Always "2.0"
    pub jsonrpc: String,
    /// The result of the method invocation
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<serde_json::Value>,
    /// Error information
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<RpcError>,
    /// Id of the request this response answers
    pub id: Id,
}

impl JsonRpcResponse {
    /// Create a successful response
    pub fn success(result: serde_json::Value, id: Id) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            result: Some(result),
            error: None,
            id,
        }
    }

    /// Create an error response
    pub fn error(error: RpcError, id: Id) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            result: None,
            error: Some(error),
            id,
        }
    }

    /// Drop `result` when an `error` is present as well
    pub fn normalize(mut self) -> Self {
        if self.error.is_some() {
            self.result = None;
        }
        self
    }

    /// Check if the response represents a successful result
    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }

    /// Check if the response represents an error
    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }

    /// Collapse the response into the call outcome
    ///
    /// ```rust
    /// use jrat_core::{Id, JsonRpcResponse, RpcError};
    /// use serde_json::json;
    ///
    /// let mut both = JsonRpcResponse::success(json!(1), Id::Number(1));
    /// both.error = Some(RpcError::new(5, "boom"));
    /// assert_eq!(both.into_outcome(), Err(RpcError::new(5, "boom")));
    /// ```
    pub fn into_outcome(self) -> std::result::Result<serde_json::Value, RpcError> {
        match self.error {
            Some(error) => Err(error),
            None => Ok(self.result.unwrap_or(serde_json::Value::Null)),
        }
    }
}

/// Any single JSON-RPC 2.0 message
///
/// Variant order matters for the untagged representation: a request is tried
/// before a notification (both have `method`, only requests have `id`), and a
/// response (no `method`) last.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum JsonRpcMessage {
    /// A request message
    Request(JsonRpcRequest),
    /// A notification message
    Notification(JsonRpcNotification),
    /// A response message
    Response(JsonRpcResponse),
}

impl JsonRpcMessage {
    /// Check if this message is a request
    pub fn is_request(&self) -> bool {
        matches!(self, JsonRpcMessage::Request(_))
    }

    /// Check if this message is a notification
    pub fn is_notification(&self) -> bool {
        matches!(self, JsonRpcMessage::Notification(_))
    }

    /// Check if this message is a response
    pub fn is_response(&self) -> bool {
        matches!(self, JsonRpcMessage::Response(_))
    }
}

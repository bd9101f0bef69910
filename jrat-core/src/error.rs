//! Error types for jrat
//!
//! Two layers of errors live here:
//!
//! - **Error**: everything a session operation can fail with, split by the
//!   layer that failed (argument validation, connectivity, transport, protocol,
//!   timeout, lifecycle)
//! - **RpcError**: the wire-format error object a JSON-RPC 2.0 peer returns
//!
//! Keeping `Error::Rpc` separate from `Error::Transport` lets callers branch on
//! the failure layer: a server that answered with an error is a very different
//! situation from a socket that could not deliver the request at all.
//!
//! # Timeouts
//!
//! A call that receives no response within the session timeout fails with
//! [`Error::Timeout`]. When the outcome has to be represented as a response
//! object (batches, `reject_on_error = false`) the fixed sentinel
//! [`RpcError::timeout`] is used instead:
//!
//! ```rust
//! use jrat_core::{Error, RpcError};
//!
//! let sentinel = RpcError::timeout();
//! assert_eq!(sentinel.code, -1000);
//! assert_eq!(sentinel.message, "Timed out waiting for response");
//! assert_eq!(Error::Timeout.protocol_error(), Some(sentinel));
//! ```

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type for jrat operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error code of the timeout sentinel
pub const TIMEOUT_CODE: i64 = -1000;

/// Message of the timeout sentinel
pub const TIMEOUT_MESSAGE: &str = "Timed out waiting for response";

/// Application-level error type for jrat operations
///
/// # Error Categories
///
/// - **Validation**: Argument
/// - **Connectivity**: Connection, Transport
/// - **Protocol**: Rpc, Timeout
/// - **Lifecycle**: Shutdown, UseAfterDestroy
/// - **Processing**: NotificationHandler, Serialization, Internal
#[derive(Debug, Clone, Error)]
pub enum Error {
    /// Invalid method name, params, construction option or batch element
    #[error("Invalid argument: {0}")]
    Argument(String),

    /// The transport is not connected and autoconnect is disabled
    #[error("Not connected: {0}")]
    Connection(String),

    /// The transport failed to connect, disconnect or deliver a message
    #[error("Transport error: {0}")]
    Transport(String),

    /// The remote peer answered with a JSON-RPC error object
    #[error("JSON-RPC error: {0}")]
    Rpc(#[from] RpcError),

    /// No response arrived within the configured timeout
    #[error("Timed out waiting for response")]
    Timeout,

    /// The call was still pending when the session was destroyed
    #[error("Session shut down before the call completed")]
    Shutdown,

    /// The session was used after `destroy()`
    #[error("Session has been destroyed")]
    UseAfterDestroy,

    /// A notification handler returned an error
    #[error("Notification handler for '{method}' failed: {message}")]
    NotificationHandler {
        /// Notification method the handler was registered for
        method: String,
        /// Rendered handler error
        message: String,
    },

    /// Serialization or deserialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Unexpected internal condition
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// The protocol-level error object for this failure, if it has one
    ///
    /// Only server errors and timeouts can be folded into a response object;
    /// every other variant returns `None` and must be propagated as-is.
    pub fn protocol_error(&self) -> Option<RpcError> {
        match self {
            Error::Rpc(error) => Some(error.clone()),
            Error::Timeout => Some(RpcError::timeout()),
            _ => None,
        }
    }

    /// Whether this error originates from the transport layer
    pub fn is_transport(&self) -> bool {
        matches!(self, Error::Transport(_))
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Serialization(err.to_string())
    }
}

/// JSON-RPC 2.0 error object
///
/// This is the exact wire format of the `error` member of a response.
///
/// # Standard Error Codes
///
/// - `-32700`: Parse error
/// - `-32600`: Invalid Request
/// - `-32601`: Method not found
/// - `-32602`: Invalid params
/// - `-32603`: Internal error
/// - `-32000 to -32099`: Server error
///
/// Application servers are free to use any other code, e.g. `1234`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RpcError {
    /// Numeric error code
    pub code: i64,

    /// Short description of the error
    pub message: String,

    /// Optional additional information
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
}

impl RpcError {
    /// Create an error object with code and message
    pub fn new(code: i64, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            data: None,
        }
    }

    /// Create an error object carrying additional data
    ///
    /// ```rust
    /// use jrat_core::RpcError;
    /// use serde_json::json;
    ///
    /// let error = RpcError::with_data(1234, "Quota exceeded", json!({"limit": 10}));
    /// assert_eq!(error.data.unwrap()["limit"], 10);
    /// ```
    pub fn with_data(code: i64, message: impl Into<String>, data: serde_json::Value) -> Self {
        Self {
            code,
            message: message.into(),
            data: Some(data),
        }
    }

    /// The fixed sentinel used for calls that timed out
    pub fn timeout() -> Self {
        Self::new(TIMEOUT_CODE, TIMEOUT_MESSAGE)
    }

    /// Whether this is the timeout sentinel
    pub fn is_timeout(&self) -> bool {
        self.code == TIMEOUT_CODE && self.message == TIMEOUT_MESSAGE
    }

    /// Parse error (-32700)
    pub fn parse_error() -> Self {
        Self::new(-32700, "Parse error")
    }

    /// Invalid request error (-32600)
    pub fn invalid_request(msg: impl Into<String>) -> Self {
        Self::new(-32600, msg)
    }

    /// Method not found error (-32601)
    pub fn method_not_found(method: impl Into<String>) -> Self {
        Self::new(-32601, format!("Method not found: {}", method.into()))
    }

    /// Invalid params error (-32602)
    pub fn invalid_params(msg: impl Into<String>) -> Self {
        Self::new(-32602, msg)
    }

    /// Internal error (-32603)
    pub fn internal_error(msg: impl Into<String>) -> Self {
        Self::new(-32603, msg)
    }
}

impl std::fmt::Display for RpcError {
    /// Formats as "[code] message", e.g. "[-32601] Method not found: foo"
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}", self.code, self.message)
    }
}

impl std::error::Error for RpcError {}

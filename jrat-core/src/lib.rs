//! Core JSON-RPC 2.0 types, codec and errors for jrat
//!
//! This crate holds everything that is independent of how a session talks to
//! its transport:
//!
//! - **Types**: requests, notifications, responses and ids
//! - **Codec**: flush encoding (object or array) and inbound decoding with
//!   response normalization
//! - **Errors**: the layered `Error` enum and the wire-level `RpcError`
//! - **Observability**: OpenTelemetry / `tracing` pipeline setup
//!
//! # Example
//!
//! ```rust
//! use jrat_core::{codec, Id, JsonRpcMessage, JsonRpcRequest};
//! use serde_json::json;
//!
//! let payload = codec::encode_requests(&[
//!     JsonRpcRequest::new("add", Some(json!([5, 3])), Id::Number(1)),
//! ]).unwrap();
//! assert!(payload.contains("\"method\":\"add\""));
//!
//! let inbound = codec::decode_value(json!({"jsonrpc": "2.0", "id": 1, "result": 8}));
//! assert!(matches!(inbound[0], Ok(JsonRpcMessage::Response(_))));
//! ```

pub mod codec;
pub mod error;
pub mod observability;
pub mod types;

pub use error::{Error, Result, RpcError, TIMEOUT_CODE, TIMEOUT_MESSAGE};
pub use observability::{init_observability, shutdown_observability, ObservabilityConfig};
pub use types::{Id, JsonRpcMessage, JsonRpcNotification, JsonRpcRequest, JsonRpcResponse};

//! jrat - JSON-RPC 2.0 client sessions over any transport
//!
//! This is the convenience crate that re-exports the jrat sub-crates.
//!
//! # Architecture
//!
//! - **jrat-core**: wire types, codec, error handling, observability
//! - **jrat-client**: client sessions, batching, transports
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use jrat::{ClientSession, WebSocketTransport};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let session = ClientSession::new(Arc::new(WebSocketTransport::new("ws://localhost:8080")))?;
//!
//!     let greeting: String = session.call("greet", serde_json::json!({"name": "Ada"})).await?;
//!     println!("{}", greeting);
//!
//!     session.destroy().await?;
//!     Ok(())
//! }
//! ```

pub use jrat_core::*;

pub use jrat_client::{
    BatchRequest, BatchResponse, CallOptions, ClientMetrics, ClientSession, Connection,
    ConnectionState, ListenerId, NotificationErrorPolicy, PreparedCall, Response, SessionBuilder,
    SessionConfig, Transport, TransportEvent, WebSocketTransport,
};

/// Client sessions and transports
pub mod client {
    pub use jrat_client::*;
}

//! JSON-RPC 2.0 client sessions over pluggable transports
//!
//! This crate provides the client side of JSON-RPC 2.0: issuing calls,
//! batching them into one wire message, correlating responses, timing out
//! unanswered calls and dispatching server notifications. The I/O channel is
//! anything that implements [`Transport`].
//!
//! # Core Features
//!
//! - **Any transport**: connectionless (in-process, HTTP-like) or
//!   connection-oriented (WebSocket, TCP)
//! - **Autoconnect**: connection-oriented transports connect on first use
//! - **Typed calls**: serialize params, deserialize results
//! - **Batching**: prepare calls, flush them as one message, get results in
//!   the shape you passed (list or keyed map)
//! - **Per-call timeouts**: started when the call is actually sent
//! - **Notifications**: one handler per notification name
//! - **Observability**: tracing spans and OpenTelemetry metrics
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use jrat_client::{ClientSession, WebSocketTransport};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let transport = Arc::new(WebSocketTransport::new("ws://localhost:8080"));
//!     let session = ClientSession::new(transport)?;
//!
//!     // Make a call
//!     let sum: i64 = session.call("add", [5, 3]).await?;
//!     println!("Result: {}", sum);
//!
//!     // Handle notifications
//!     session.on_notification("progress", |params| {
//!         println!("Progress: {}", params);
//!         Ok(())
//!     })?;
//!
//!     // Batch two calls into one message
//!     let a = session.prepare("add", [1, 2])?;
//!     let b = session.prepare("add", [3, 4])?;
//!     let responses = session.batch(vec![a, b]).await?;
//!     println!("Batch: {:?}", responses);
//!
//!     session.destroy().await?;
//!     Ok(())
//! }
//! ```

mod batch;
mod client;
mod client_builder;
mod config;
mod connection;
mod engine;
mod events;
mod metrics;
mod notification;
mod response;
mod transport;
mod ws;

pub use batch::{BatchRequest, BatchResponse, PreparedCall};
pub use client::{CallOptions, ClientSession};
pub use client_builder::SessionBuilder;
pub use config::{SessionConfig, DEFAULT_TIMEOUT_MS, MIN_TIMEOUT_MS};
pub use connection::{ConnectionManager, ConnectionState};
pub use engine::{CallOutcome, Outbound, PendingHandle, RpcEngine};
pub use events::{Listener, ListenerId, Listeners};
pub use metrics::ClientMetrics;
pub use notification::{
    HandlerResult, NotificationErrorPolicy, NotificationFn, NotificationRegistry,
};
pub use response::Response;
pub use transport::{Connection, Transport, TransportEvent, TransportListener};
pub use ws::WebSocketTransport;

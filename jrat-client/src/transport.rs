//! Transport contract
//!
//! A session never touches sockets itself. Everything below the JSON-RPC
//! layer goes through [`Transport`]:
//!
//! - `send` delivers one encoded payload (UTF-8 JSON text)
//! - inbound traffic, connection changes and errors arrive as
//!   [`TransportEvent`]s on subscribed listeners
//!
//! Connection-oriented transports additionally report `needs_connection() ==
//! true` and expose the [`Connection`] capability. Sessions check this pairing
//! when they are built; a transport that claims to need a connection but
//! cannot provide one is rejected with `Error::Argument`.
//!
//! # Implementing a transport
//!
//! ```rust
//! use futures::future::BoxFuture;
//! use jrat_client::{ListenerId, Listeners, Transport, TransportEvent, TransportListener};
//! use jrat_core::Result;
//!
//! /// Swallows every request.
//! #[derive(Default)]
//! struct BlackHole {
//!     listeners: Listeners<TransportEvent>,
//! }
//!
//! impl Transport for BlackHole {
//!     fn send(&self, _payload: String) -> BoxFuture<'_, Result<()>> {
//!         Box::pin(async { Ok(()) })
//!     }
//!
//!     fn subscribe(&self, listener: TransportListener) -> ListenerId {
//!         self.listeners.add_arc(listener)
//!     }
//!
//!     fn unsubscribe(&self, id: ListenerId) -> bool {
//!         self.listeners.remove(id)
//!     }
//! }
//! ```

use crate::events::{Listener, ListenerId};
use futures::future::BoxFuture;
use jrat_core::{Error, Result};

/// Events a transport publishes to its listeners
#[derive(Debug, Clone)]
pub enum TransportEvent {
    /// One inbound message, already parsed: an object or an array of objects
    Data(serde_json::Value),
    /// The transport finished connecting
    Connected,
    /// The transport lost or closed its connection; `Some` when it was an error
    Disconnected(Option<Error>),
    /// A transport-level error that did not end the connection
    Error(Error),
}

/// Listener callback registered on a transport
pub type TransportListener = Listener<TransportEvent>;

/// Capability interface every transport satisfies
pub trait Transport: Send + Sync {
    /// Deliver one encoded payload
    ///
    /// Fails with `Error::Transport` when not connected or on I/O errors.
    fn send(&self, payload: String) -> BoxFuture<'_, Result<()>>;

    /// Register an event listener
    fn subscribe(&self, listener: TransportListener) -> ListenerId;

    /// Remove a listener registered with [`Transport::subscribe`]
    fn unsubscribe(&self, id: ListenerId) -> bool;

    /// Whether the transport must be connected before `send` works
    fn needs_connection(&self) -> bool {
        false
    }

    /// Connection lifecycle capability, required when `needs_connection()`
    fn connection(&self) -> Option<&dyn Connection> {
        None
    }
}

/// Connection lifecycle of a connection-oriented transport
pub trait Connection: Send + Sync {
    /// Whether the transport is currently connected
    fn is_connected(&self) -> bool;

    /// Establish the connection
    fn connect(&self) -> BoxFuture<'_, Result<()>>;

    /// Close the connection
    fn disconnect(&self) -> BoxFuture<'_, Result<()>>;
}

//! Connection management
//!
//! Connectivity is derived, never stored: a connectionless transport is
//! always connected, a connection-oriented one is connected when its
//! [`Connection`](crate::Connection) capability says so.
//!
//! # Connection States
//!
//! - **Connectionless**: the transport needs no connection
//! - **Disconnected**: not connected
//! - **Connecting**: a connect is in flight
//! - **Connected**: connected and operational
//!
//! ```text
//! Disconnected → Connecting → Connected
//!       ↑                         │
//!       └──────── disconnect ─────┘
//! ```
//!
//! # Overlapping triggers
//!
//! Several in-flight calls may want to autoconnect at once. Connect and
//! disconnect are serialized through one async gate: whoever waits on the
//! gate re-checks the state afterwards, so only the first trigger reaches the
//! transport and the others become no-ops once it succeeded.

use crate::transport::Transport;
use jrat_core::{Error, Result};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex;

/// Connection state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// The transport needs no connection
    Connectionless,
    /// Not connected
    Disconnected,
    /// A connect is in flight
    Connecting,
    /// Connected and operational
    Connected,
}

impl ConnectionState {
    /// Numeric encoding used by the connection-state gauge
    pub fn as_gauge(self) -> i64 {
        match self {
            ConnectionState::Disconnected => 0,
            ConnectionState::Connecting => 1,
            ConnectionState::Connected => 2,
            ConnectionState::Connectionless => 3,
        }
    }
}

/// Derives connectivity and drives connect/disconnect on the transport
pub struct ConnectionManager {
    transport: Arc<dyn Transport>,
    gate: Mutex<()>,
    connecting: AtomicBool,
}

impl ConnectionManager {
    /// Create a manager for `transport`
    ///
    /// Fails with `Error::Argument` when the transport needs a connection but
    /// does not expose the connection capability.
    pub fn new(transport: Arc<dyn Transport>) -> Result<Self> {
        if transport.needs_connection() && transport.connection().is_none() {
            return Err(Error::Argument(
                "transport requires a connection but provides no connection capability"
                    .to_string(),
            ));
        }

        Ok(Self {
            transport,
            gate: Mutex::new(()),
            connecting: AtomicBool::new(false),
        })
    }

    /// Whether the transport must be connected before use
    pub fn needs_connection(&self) -> bool {
        self.transport.needs_connection()
    }

    /// `!needs_connection || transport.is_connected`
    pub fn is_connected(&self) -> bool {
        if !self.transport.needs_connection() {
            return true;
        }
        self.transport
            .connection()
            .map(|connection| connection.is_connected())
            .unwrap_or(false)
    }

    /// Get the current connection state
    pub fn state(&self) -> ConnectionState {
        if !self.needs_connection() {
            ConnectionState::Connectionless
        } else if self.is_connected() {
            ConnectionState::Connected
        } else if self.connecting.load(Ordering::SeqCst) {
            ConnectionState::Connecting
        } else {
            ConnectionState::Disconnected
        }
    }

    /// Connect unless connectionless or already connected
    ///
    /// Transport failures are returned unchanged.
    pub async fn connect(&self) -> Result<()> {
        if self.is_connected() {
            return Ok(());
        }

        let _gate = self.gate.lock().await;
        if self.is_connected() {
            return Ok(());
        }

        let Some(connection) = self.transport.connection() else {
            return Ok(());
        };

        tracing::debug!("Connecting transport");
        self.connecting.store(true, Ordering::SeqCst);
        let result = connection.connect().await;
        self.connecting.store(false, Ordering::SeqCst);

        match &result {
            Ok(()) => tracing::debug!("Transport connected"),
            Err(e) => tracing::warn!(error = %e, "Transport connect failed"),
        }
        result
    }

    /// Disconnect unless connectionless or already disconnected
    pub async fn disconnect(&self) -> Result<()> {
        if !self.is_connected() {
            return Ok(());
        }

        let _gate = self.gate.lock().await;
        if !self.needs_connection() || !self.is_connected() {
            return Ok(());
        }

        let Some(connection) = self.transport.connection() else {
            return Ok(());
        };

        tracing::debug!("Disconnecting transport");
        connection.disconnect().await
    }

    /// Make sure the transport is connected before a call goes out
    ///
    /// Connects when `auto_connect` is set, fails with `Error::Connection`
    /// otherwise.
    pub async fn ensure_connected(&self, auto_connect: bool) -> Result<()> {
        if self.is_connected() {
            return Ok(());
        }
        if !auto_connect {
            return Err(Error::Connection(
                "transport is not connected and autoconnect is disabled".to_string(),
            ));
        }
        self.connect().await
    }
}

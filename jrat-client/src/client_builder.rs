//! Session builder
//!
//! The `SessionBuilder` provides a fluent API for configuring a session
//! before it is created. It allows you to:
//! - Toggle autoconnect and batching
//! - Set the per-call timeout (at least one second)
//! - Choose what happens when a notification handler fails
//! - Configure observability (OpenTelemetry) and metrics
//!
//! # Examples
//!
//! ```rust,no_run
//! use jrat_client::{ClientSession, NotificationErrorPolicy};
//! use std::time::Duration;
//!
//! # fn example(transport: std::sync::Arc<dyn jrat_client::Transport>) -> jrat_core::Result<()> {
//! let session = ClientSession::builder(transport)
//!     .auto_connect(false)
//!     .timeout(Duration::from_secs(5))
//!     .notification_error_policy(NotificationErrorPolicy::Emit)
//!     .with_default_observability()
//!     .service_name("my-client")
//!     .build()?;
//! # Ok(())
//! # }
//! ```

use crate::client::{ClientSession, SessionInner};
use crate::config::SessionConfig;
use crate::connection::ConnectionManager;
use crate::engine::RpcEngine;
use crate::events::Listeners;
use crate::metrics::ClientMetrics;
use crate::notification::{NotificationErrorPolicy, NotificationRegistry};
use crate::transport::{Transport, TransportEvent, TransportListener};
use jrat_core::{Error, ObservabilityConfig, Result};
use parking_lot::Mutex;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use std::time::Duration;

/// Builder for configuring and creating a [`ClientSession`]
pub struct SessionBuilder {
    transport: Arc<dyn Transport>,
    config: SessionConfig,
    observability_config: Option<ObservabilityConfig>,
    service_name: Option<String>,
    metrics: Option<Arc<ClientMetrics>>,
}

impl SessionBuilder {
    /// Create a new builder for a session on `transport`
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self {
            transport,
            config: SessionConfig::default(),
            observability_config: None,
            service_name: None,
            metrics: None,
        }
    }

    /// Replace every option with `config`
    pub fn config(mut self, config: SessionConfig) -> Self {
        self.config = config;
        self
    }

    /// Connect on demand before calls and batches (default: true)
    pub fn auto_connect(mut self, enable: bool) -> Self {
        self.config.auto_connect = enable;
        self
    }

    /// Defer prepared calls until a batch flushes them (default: true)
    pub fn batch_requests(mut self, enable: bool) -> Self {
        self.config.batch_requests = enable;
        self
    }

    /// Per-call timeout (default: 60 s, minimum: 1 s)
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.config.timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX);
        self
    }

    /// What to do when a notification handler fails (default: log)
    pub fn notification_error_policy(mut self, policy: NotificationErrorPolicy) -> Self {
        self.config.notification_error_policy = policy;
        self
    }

    /// Enable OpenTelemetry observability with custom configuration
    pub fn with_observability(mut self, config: ObservabilityConfig) -> Self {
        self.observability_config = Some(config);
        self
    }

    /// Enable OpenTelemetry observability with default configuration
    pub fn with_default_observability(mut self) -> Self {
        self.observability_config = Some(ObservabilityConfig::default());
        self
    }

    /// Set service name for observability (used if observability is enabled)
    pub fn service_name(mut self, name: impl Into<String>) -> Self {
        self.service_name = Some(name.into());
        self
    }

    /// Record into existing metrics instead of creating them from observability
    pub fn with_metrics(mut self, metrics: Arc<ClientMetrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Validate the options and create the session
    ///
    /// Fails with `Error::Argument` for a timeout under one second or a
    /// transport that needs a connection without providing one.
    pub fn build(self) -> Result<ClientSession> {
        self.config.validate()?;
        let connection = ConnectionManager::new(Arc::clone(&self.transport))?;

        let metrics = match (self.metrics, self.observability_config) {
            (Some(metrics), _) => Some(metrics),
            (None, Some(mut config)) => {
                if let Some(name) = self.service_name {
                    config.service_name = name;
                }

                jrat_core::init_observability(config.clone()).map_err(|e| {
                    Error::Internal(format!("Failed to initialize observability: {}", e))
                })?;

                Some(Arc::new(ClientMetrics::new(config.service_name)))
            }
            (None, None) => None,
        };

        let inner = Arc::new(SessionInner {
            transport: Arc::clone(&self.transport),
            connection,
            engine: RpcEngine::new(self.config.timeout()),
            notifications: NotificationRegistry::new(),
            connected: Listeners::new(),
            disconnected: Listeners::new(),
            errors: Listeners::new(),
            config: self.config,
            transport_listener: Mutex::new(None),
            destroyed: AtomicBool::new(false),
            metrics,
        });

        let session = Arc::downgrade(&inner);
        let listener: TransportListener = Arc::new(move |event: &TransportEvent| {
            if let Some(inner) = session.upgrade() {
                inner.handle_event(event);
            }
        });
        let id = self.transport.subscribe(listener);
        *inner.transport_listener.lock() = Some(id);

        if let Some(metrics) = &inner.metrics {
            metrics.update_connection_state(inner.connection.state());
        }

        tracing::debug!(
            needs_connection = inner.connection.needs_connection(),
            timeout_ms = inner.config.timeout_ms,
            "Session created"
        );
        Ok(ClientSession::from_inner(inner))
    }
}

//! Client metrics definitions
//!
//! OpenTelemetry instruments for monitoring session health. They are exported
//! through whatever meter provider is installed, usually the one set up by
//! `jrat_core::init_observability`.
//!
//! # Metrics Collected
//!
//! - **connection_state**: derived connection state (gauge)
//! - **calls_total**: calls that settled, by method and status (counter)
//! - **call_duration**: call latency from registration to settlement (histogram)
//! - **errors_total**: failures by error type (counter)
//! - **timeouts_total**: calls that timed out (counter)
//! - **batch_size**: calls per batch (histogram)
//! - **notifications_received**: inbound notifications (counter)
//!
//! # Examples
//!
//! ```rust,no_run
//! use jrat_client::{ClientMetrics, ClientSession};
//! use std::sync::Arc;
//!
//! # fn example(transport: Arc<dyn jrat_client::Transport>) -> jrat_core::Result<()> {
//! let session = ClientSession::builder(transport)
//!     .with_metrics(Arc::new(ClientMetrics::new("my-client")))
//!     .build()?;
//! # Ok(())
//! # }
//! ```

use crate::connection::ConnectionState;
use jrat_core::Error;
use opentelemetry::{
    global,
    metrics::{Counter, Gauge, Histogram, Meter},
    KeyValue,
};

/// Client metrics for monitoring
pub struct ClientMetrics {
    /// Connection state (0=disconnected, 1=connecting, 2=connected, 3=connectionless)
    pub connection_state: Gauge<i64>,
    /// Total number of settled calls
    pub calls_total: Counter<u64>,
    /// Call duration in seconds
    pub call_duration: Histogram<f64>,
    /// Total number of errors
    pub errors_total: Counter<u64>,
    /// Total number of timed out calls
    pub timeouts_total: Counter<u64>,
    /// Batch size distribution
    pub batch_size: Histogram<u64>,
    /// Total number of notifications received
    pub notifications_received: Counter<u64>,
}

impl ClientMetrics {
    /// Create metrics on the global meter named `service_name`
    pub fn new(service_name: impl Into<String>) -> Self {
        let name: &'static str = Box::leak(service_name.into().into_boxed_str());
        let meter = global::meter(name);
        Self::new_with_meter(&meter)
    }

    /// Create metrics on a custom meter
    pub fn new_with_meter(meter: &Meter) -> Self {
        Self {
            connection_state: meter
                .i64_gauge("jrat.client.connection.state")
                .with_description(
                    "Connection state (0=disconnected, 1=connecting, 2=connected, 3=connectionless)",
                )
                .build(),
            calls_total: meter
                .u64_counter("jrat.client.calls.total")
                .with_description("Total number of settled calls")
                .build(),
            call_duration: meter
                .f64_histogram("jrat.client.call.duration")
                .with_description("Call duration in seconds")
                .build(),
            errors_total: meter
                .u64_counter("jrat.client.errors.total")
                .with_description("Total number of errors encountered")
                .build(),
            timeouts_total: meter
                .u64_counter("jrat.client.timeouts.total")
                .with_description("Total number of calls that timed out")
                .build(),
            batch_size: meter
                .u64_histogram("jrat.client.batch.size")
                .with_description("Number of calls in batch operations")
                .build(),
            notifications_received: meter
                .u64_counter("jrat.client.notifications.received")
                .with_description("Total number of notifications received")
                .build(),
        }
    }

    /// Update connection state
    pub fn update_connection_state(&self, state: ConnectionState) {
        self.connection_state.record(state.as_gauge(), &[]);
    }

    /// Record a settled call
    pub fn record_call(&self, method: &str, status: &str, duration_secs: f64) {
        let attributes = &[
            KeyValue::new("method", method.to_string()),
            KeyValue::new("status", status.to_string()),
        ];
        self.calls_total.add(1, attributes);
        self.call_duration.record(duration_secs, attributes);
    }

    /// Record an error
    pub fn record_error(&self, error: &Error) {
        if matches!(error, Error::Timeout) {
            self.timeouts_total.add(1, &[]);
        }
        let attributes = &[KeyValue::new("error_type", error_type(error))];
        self.errors_total.add(1, attributes);
    }

    /// Record a batch operation
    pub fn record_batch(&self, size: u64) {
        self.batch_size.record(size, &[]);
    }

    /// Record a notification received
    pub fn record_notification(&self, method: &str) {
        let attributes = &[KeyValue::new("method", method.to_string())];
        self.notifications_received.add(1, attributes);
    }
}

/// Low-cardinality label for an error
pub fn error_type(error: &Error) -> &'static str {
    match error {
        Error::Argument(_) => "argument",
        Error::Connection(_) => "connection",
        Error::Transport(_) => "transport",
        Error::Rpc(_) => "rpc",
        Error::Timeout => "timeout",
        Error::Shutdown => "shutdown",
        Error::UseAfterDestroy => "use_after_destroy",
        Error::NotificationHandler { .. } => "notification_handler",
        Error::Serialization(_) => "serialization",
        Error::Internal(_) => "internal",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jrat_core::RpcError;
    use opentelemetry::metrics::MeterProvider;
    use opentelemetry_sdk::metrics::SdkMeterProvider;

    #[test]
    fn test_metrics_creation() {
        let metrics = ClientMetrics::new("test-client");

        // Just test that metrics can be recorded without panicking
        metrics.update_connection_state(ConnectionState::Connected);
        metrics.record_call("add", "success", 0.05);
        metrics.record_error(&Error::Transport("reset".into()));
        metrics.record_batch(5);
        metrics.record_notification("progress");
    }

    #[test]
    fn test_metrics_on_sdk_meter() {
        let provider = SdkMeterProvider::builder().build();
        let meter = provider.meter("jrat-test");
        let metrics = ClientMetrics::new_with_meter(&meter);

        for state in [
            ConnectionState::Disconnected,
            ConnectionState::Connecting,
            ConnectionState::Connected,
            ConnectionState::Connectionless,
        ] {
            metrics.update_connection_state(state);
        }
        metrics.record_error(&Error::Timeout);
        metrics.record_call("divide", "error", 0.01);
    }

    #[test]
    fn test_error_type_labels() {
        assert_eq!(error_type(&Error::Timeout), "timeout");
        assert_eq!(error_type(&Error::Rpc(RpcError::new(1, "x"))), "rpc");
        assert_eq!(error_type(&Error::UseAfterDestroy), "use_after_destroy");
    }
}

//! Session configuration
//!
//! `SessionConfig` can be built in code through [`SessionBuilder`] or
//! deserialized from any serde format. Missing fields take their defaults:
//!
//! ```rust
//! use jrat_client::{NotificationErrorPolicy, SessionConfig};
//!
//! let config: SessionConfig =
//!     serde_json::from_str(r#"{"timeout_ms": 5000, "notification_error_policy": "emit"}"#).unwrap();
//!
//! assert!(config.auto_connect);
//! assert!(config.batch_requests);
//! assert_eq!(config.timeout_ms, 5000);
//! assert_eq!(config.notification_error_policy, NotificationErrorPolicy::Emit);
//! config.validate().unwrap();
//! ```
//!
//! [`SessionBuilder`]: crate::SessionBuilder

use crate::notification::NotificationErrorPolicy;
use jrat_core::{Error, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default per-call timeout
pub const DEFAULT_TIMEOUT_MS: u64 = 60_000;

/// Smallest accepted per-call timeout
pub const MIN_TIMEOUT_MS: u64 = 1_000;

/// Options a session is constructed with
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Connect on demand before a call or batch goes out
    pub auto_connect: bool,
    /// Defer prepared calls until `batch` flushes them together
    pub batch_requests: bool,
    /// Per-call timeout in milliseconds, counted from transmission
    pub timeout_ms: u64,
    /// What to do when a notification handler fails
    pub notification_error_policy: NotificationErrorPolicy,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            auto_connect: true,
            batch_requests: true,
            timeout_ms: DEFAULT_TIMEOUT_MS,
            notification_error_policy: NotificationErrorPolicy::default(),
        }
    }
}

impl SessionConfig {
    /// Per-call timeout as a `Duration`
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Reject options a session cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.timeout_ms < MIN_TIMEOUT_MS {
            return Err(Error::Argument(format!(
                "timeout must be at least {} ms, got {} ms",
                MIN_TIMEOUT_MS, self.timeout_ms
            )));
        }
        Ok(())
    }
}

//! Notification handler registry
//!
//! JSON-RPC notifications are server-to-client messages that don't expect a
//! response. A session keeps at most one handler per notification name; setting
//! a new handler replaces the previous one.
//!
//! Handlers are plain synchronous callbacks. They receive only the `params`
//! member (`Value::Null` when the notification carried none) and run on the
//! task that delivered the inbound message. A handler that wants to do async
//! work spawns it.
//!
//! # Examples
//!
//! ```rust
//! use jrat_client::NotificationRegistry;
//! use serde_json::json;
//!
//! let registry = NotificationRegistry::new();
//! registry.register("progress", |params| {
//!     println!("progress: {}", params);
//!     Ok(())
//! });
//!
//! assert!(registry.has_handler("progress"));
//! assert!(registry.dispatch("progress", Some(json!([50]))).is_some());
//! assert!(registry.dispatch("unknown", None).is_none());
//! ```

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

/// Outcome of a notification handler
pub type HandlerResult = std::result::Result<(), Box<dyn std::error::Error + Send + Sync>>;

/// Type for notification handler functions
pub type NotificationFn = Arc<dyn Fn(serde_json::Value) -> HandlerResult + Send + Sync>;

/// What a session does when a notification handler returns an error
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationErrorPolicy {
    /// Log the failure at error level
    #[default]
    Log,
    /// Emit `Error::NotificationHandler` to the session's error listeners
    Emit,
    /// Drop the failure silently
    Ignore,
    /// Panic on the delivering task
    Panic,
}

/// Registry mapping notification names to handlers
#[derive(Default)]
pub struct NotificationRegistry {
    handlers: RwLock<HashMap<String, NotificationFn>>,
}

impl NotificationRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Install `handler` for `method`, or remove the current one with `None`
    pub fn set(&self, method: impl Into<String>, handler: Option<NotificationFn>) {
        let method = method.into();
        let mut handlers = self.handlers.write();
        match handler {
            Some(handler) => {
                handlers.insert(method, handler);
            }
            None => {
                handlers.remove(&method);
            }
        }
    }

    /// Register a handler for a notification method, replacing any previous one
    pub fn register<F>(&self, method: impl Into<String>, handler: F)
    where
        F: Fn(serde_json::Value) -> HandlerResult + Send + Sync + 'static,
    {
        self.set(method, Some(Arc::new(handler)));
    }

    /// Remove the handler for a method
    pub fn remove(&self, method: &str) -> bool {
        self.handlers.write().remove(method).is_some()
    }

    /// Remove every handler
    pub fn clear(&self) {
        self.handlers.write().clear();
    }

    /// Check if a handler is registered for a method
    pub fn has_handler(&self, method: &str) -> bool {
        self.handlers.read().contains_key(method)
    }

    /// Get all registered notification methods
    pub fn methods(&self) -> Vec<String> {
        self.handlers.read().keys().cloned().collect()
    }

    /// Run the handler for `method`, if any
    ///
    /// Returns `None` when no handler is registered, otherwise the handler's
    /// outcome. The registry lock is released before the handler runs.
    pub fn dispatch(
        &self,
        method: &str,
        params: Option<serde_json::Value>,
    ) -> Option<HandlerResult> {
        let handler = self.handlers.read().get(method).cloned()?;
        Some(handler(params.unwrap_or(serde_json::Value::Null)))
    }
}

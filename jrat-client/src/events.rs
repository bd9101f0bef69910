//! Observer registration for session and transport events
//!
//! Both sessions and transports publish events to callbacks. `Listeners<T>`
//! is the shared registry: listeners get a [`ListenerId`] on registration and
//! can be removed with it later.
//!
//! Callbacks run synchronously on the emitting task, in registration order.
//! The registry lock is released before any callback runs, so a callback may
//! add or remove listeners (including itself).

use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

static NEXT_LISTENER_ID: AtomicU64 = AtomicU64::new(1);

/// Handle returned when a listener is registered
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

impl ListenerId {
    fn next() -> Self {
        ListenerId(NEXT_LISTENER_ID.fetch_add(1, Ordering::Relaxed))
    }
}

/// Callback type stored in a [`Listeners`] registry
pub type Listener<T> = Arc<dyn Fn(&T) + Send + Sync>;

/// Registry of callbacks for one event type
pub struct Listeners<T: ?Sized> {
    entries: Mutex<Vec<(ListenerId, Listener<T>)>>,
}

impl<T: ?Sized> Listeners<T> {
    /// Create an empty registry
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(Vec::new()),
        }
    }

    /// Register a callback
    pub fn add<F>(&self, listener: F) -> ListenerId
    where
        F: Fn(&T) + Send + Sync + 'static,
    {
        self.add_arc(Arc::new(listener))
    }

    /// Register an already shared callback
    pub fn add_arc(&self, listener: Listener<T>) -> ListenerId {
        let id = ListenerId::next();
        self.entries.lock().push((id, listener));
        id
    }

    /// Remove a callback; returns false if it was not registered here
    pub fn remove(&self, id: ListenerId) -> bool {
        let mut entries = self.entries.lock();
        let before = entries.len();
        entries.retain(|(entry_id, _)| *entry_id != id);
        entries.len() != before
    }

    /// Remove every callback
    pub fn clear(&self) {
        self.entries.lock().clear();
    }

    /// Number of registered callbacks
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    /// Whether no callback is registered
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Invoke every callback with `event`
    pub fn emit(&self, event: &T) {
        let snapshot: Vec<Listener<T>> = self
            .entries
            .lock()
            .iter()
            .map(|(_, listener)| Arc::clone(listener))
            .collect();

        for listener in snapshot {
            listener(event);
        }
    }
}

impl<T: ?Sized> Default for Listeners<T> {
    fn default() -> Self {
        Self::new()
    }
}

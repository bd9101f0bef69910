//! Request correlation engine
//!
//! The engine owns the pending-call table. Every call goes through the same
//! lifecycle:
//!
//! 1. **Register**: assign the next numeric id, park a oneshot sender
//! 2. **Flush**: encode one or more registered calls into a single payload,
//!    mark them sent and arm one timer per call
//! 3. **Settle**: exactly one of response, timeout, transport failure or
//!    shutdown removes the entry and resolves the oneshot
//!
//! Timers start at flush time, not at registration time, so a prepared call
//! waiting for its batch does not burn its timeout. Each timer only expires
//! its own call.
//!
//! The table is guarded by a `parking_lot` mutex. It is never held while a
//! oneshot is resolved or across an `.await`.

use jrat_core::{
    codec, Error, Id, JsonRpcMessage, JsonRpcNotification, JsonRpcRequest, JsonRpcResponse,
    Result,
};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::task::AbortHandle;

/// What a pending call settles with
pub type CallOutcome = Result<serde_json::Value>;

/// Receiving side of a registered call
pub struct PendingHandle {
    /// Correlation id assigned at registration
    pub id: Id,
    /// Resolves exactly once with the call outcome
    pub receiver: oneshot::Receiver<CallOutcome>,
}

/// One encoded flush, ready for `Transport::send`
#[derive(Debug)]
pub struct Outbound {
    /// Wire payload: an object for one call, an array for several
    pub payload: String,
    /// Ids contained in the payload, in wire order
    pub ids: Vec<Id>,
}

struct PendingCall {
    method: String,
    params: serde_json::Value,
    sender: oneshot::Sender<CallOutcome>,
    sent: bool,
    timer: Option<AbortHandle>,
}

struct EngineState {
    next_id: i64,
    pending: HashMap<Id, PendingCall>,
    shut_down: bool,
}

/// Pending-call table with per-call timers
#[derive(Clone)]
pub struct RpcEngine {
    state: Arc<Mutex<EngineState>>,
    timeout: Duration,
}

impl RpcEngine {
    /// Create an engine whose calls time out after `timeout`
    pub fn new(timeout: Duration) -> Self {
        Self {
            state: Arc::new(Mutex::new(EngineState {
                next_id: 1,
                pending: HashMap::new(),
                shut_down: false,
            })),
            timeout,
        }
    }

    /// Per-call timeout
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Register a call without sending it
    pub fn register(
        &self,
        method: impl Into<String>,
        params: serde_json::Value,
    ) -> Result<PendingHandle> {
        let mut state = self.state.lock();
        if state.shut_down {
            return Err(Error::Shutdown);
        }

        let id = Id::Number(state.next_id);
        state.next_id += 1;

        let (sender, receiver) = oneshot::channel();
        state.pending.insert(
            id.clone(),
            PendingCall {
                method: method.into(),
                params,
                sender,
                sent: false,
                timer: None,
            },
        );

        Ok(PendingHandle { id, receiver })
    }

    /// Encode the not-yet-sent calls among `ids` into one payload
    ///
    /// Ids that are unknown, already settled or already sent are skipped.
    /// Returns `None` when nothing is left to send. The returned calls count
    /// as transmitted: their timers are running.
    pub fn flush(&self, ids: &[Id]) -> Result<Option<Outbound>> {
        let mut state = self.state.lock();

        let mut requests = Vec::new();
        for id in ids {
            if let Some(call) = state.pending.get(id) {
                if !call.sent {
                    requests.push(JsonRpcRequest::new(
                        call.method.clone(),
                        Some(call.params.clone()),
                        id.clone(),
                    ));
                }
            }
        }

        if requests.is_empty() {
            return Ok(None);
        }

        let payload = codec::encode_requests(&requests)?;
        let flushed: Vec<Id> = requests.into_iter().map(|request| request.id).collect();

        for id in &flushed {
            let timer = self.arm_timer(id.clone());
            if let Some(call) = state.pending.get_mut(id) {
                call.sent = true;
                call.timer = Some(timer);
            }
        }

        tracing::debug!(count = flushed.len(), "Flushed pending calls");
        Ok(Some(Outbound {
            payload,
            ids: flushed,
        }))
    }

    fn arm_timer(&self, id: Id) -> AbortHandle {
        let state = Arc::downgrade(&self.state);
        let timeout = self.timeout;
        tokio::spawn(async move {
            tokio::time::sleep(timeout).await;
            expire(&state, &id);
        })
        .abort_handle()
    }

    /// Feed one inbound value; returns the notifications it carried
    pub fn receive(&self, value: serde_json::Value) -> Vec<JsonRpcNotification> {
        let mut notifications = Vec::new();

        for message in codec::decode_value(value) {
            match message {
                Ok(JsonRpcMessage::Response(response)) => {
                    self.complete(response);
                }
                Ok(JsonRpcMessage::Notification(notification)) => {
                    notifications.push(notification);
                }
                Ok(JsonRpcMessage::Request(request)) => {
                    tracing::warn!(method = %request.method, "Ignoring inbound request");
                }
                Err(e) => {
                    tracing::warn!(error = %e, "Dropping undecodable inbound message");
                }
            }
        }

        notifications
    }

    /// Settle the call `response` answers; false if no such call is pending
    pub fn complete(&self, response: JsonRpcResponse) -> bool {
        let id = response.id.clone();
        let Some(call) = self.take(&id) else {
            tracing::debug!(id = %id, "Response for unknown or settled call");
            return false;
        };

        let outcome = response.into_outcome().map_err(Error::Rpc);
        let _ = call.sender.send(outcome);
        true
    }

    /// Settle the given calls with `error`
    pub fn fail(&self, ids: &[Id], error: Error) {
        let calls: Vec<PendingCall> = {
            let mut state = self.state.lock();
            ids.iter().filter_map(|id| state.pending.remove(id)).collect()
        };

        for call in calls {
            if let Some(timer) = call.timer {
                timer.abort();
            }
            let _ = call.sender.send(Err(error.clone()));
        }
    }

    /// Forget a registered call that was never flushed; false otherwise
    pub fn discard_unsent(&self, id: &Id) -> bool {
        let mut state = self.state.lock();
        match state.pending.get(id) {
            Some(call) if !call.sent => {
                state.pending.remove(id);
                true
            }
            _ => false,
        }
    }

    /// Fail every pending call with `Error::Shutdown` and refuse new ones
    pub fn shutdown(&self) {
        let calls: Vec<PendingCall> = {
            let mut state = self.state.lock();
            state.shut_down = true;
            state.pending.drain().map(|(_, call)| call).collect()
        };

        tracing::debug!(count = calls.len(), "Shutting down engine");
        for call in calls {
            if let Some(timer) = call.timer {
                timer.abort();
            }
            let _ = call.sender.send(Err(Error::Shutdown));
        }
    }

    /// Number of calls that have not settled yet
    pub fn pending_count(&self) -> usize {
        self.state.lock().pending.len()
    }

    /// Whether `id` is pending and already transmitted
    pub fn is_sent(&self, id: &Id) -> bool {
        self.state
            .lock()
            .pending
            .get(id)
            .map(|call| call.sent)
            .unwrap_or(false)
    }

    fn take(&self, id: &Id) -> Option<PendingCall> {
        let call = self.state.lock().pending.remove(id)?;
        if let Some(timer) = &call.timer {
            timer.abort();
        }
        Some(call)
    }
}

fn expire(state: &Weak<Mutex<EngineState>>, id: &Id) {
    let Some(state) = state.upgrade() else {
        return;
    };
    let call = state.lock().pending.remove(id);
    if let Some(call) = call {
        tracing::debug!(id = %id, method = %call.method, "Call timed out");
        let _ = call.sender.send(Err(Error::Timeout));
    }
}

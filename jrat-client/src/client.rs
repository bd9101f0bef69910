//! JSON-RPC client session
//!
//! A [`ClientSession`] ties together a shared transport, the correlation
//! engine, the connection manager and the notification registry.
//!
//! # Call Flow
//!
//! ```text
//! call/batch → ensure connected → register → flush → Transport::send
//!                                                          │
//!   caller ← oneshot ← engine correlates ← TransportEvent::Data
//! ```
//!
//! Inbound notifications take the same path and are dispatched to the
//! registered handler instead of resolving a call.
//!
//! # Examples
//!
//! ```rust,no_run
//! use jrat_client::{CallOptions, ClientSession};
//! use serde_json::json;
//!
//! # async fn example(transport: std::sync::Arc<dyn jrat_client::Transport>) -> jrat_core::Result<()> {
//! let session = ClientSession::new(transport)?;
//!
//! // Typed call, errors reject
//! let sum: i64 = session.call("add", [5, 3]).await?;
//!
//! // Errors folded into a Response
//! let response = session
//!     .call_with("divide", json!([1, 0]), CallOptions { reject_on_error: false })
//!     .await?;
//! if let Some(error) = response.error {
//!     println!("server said {}", error);
//! }
//!
//! session.destroy().await?;
//! # Ok(())
//! # }
//! ```

use crate::batch::{BatchRequest, BatchResponse, PreparedCall};
use crate::client_builder::SessionBuilder;
use crate::config::SessionConfig;
use crate::connection::{ConnectionManager, ConnectionState};
use crate::engine::{CallOutcome, Outbound, RpcEngine};
use crate::events::{ListenerId, Listeners};
use crate::metrics::ClientMetrics;
use crate::notification::{HandlerResult, NotificationErrorPolicy, NotificationFn, NotificationRegistry};
use crate::response::Response;
use crate::transport::{Transport, TransportEvent};
use jrat_core::{Error, Id, JsonRpcNotification, Result};
use parking_lot::Mutex;
use serde::{de::DeserializeOwned, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

/// Per-call options for [`ClientSession::call_with`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CallOptions {
    /// Reject with `Error::Rpc` / `Error::Timeout` instead of returning them
    /// inside the `Response`
    pub reject_on_error: bool,
}

impl Default for CallOptions {
    fn default() -> Self {
        Self {
            reject_on_error: true,
        }
    }
}

/// Shared state behind every clone of a session
pub(crate) struct SessionInner {
    pub(crate) transport: Arc<dyn Transport>,
    pub(crate) connection: ConnectionManager,
    pub(crate) engine: RpcEngine,
    pub(crate) notifications: NotificationRegistry,
    pub(crate) connected: Listeners<()>,
    pub(crate) disconnected: Listeners<Option<Error>>,
    pub(crate) errors: Listeners<Error>,
    pub(crate) config: SessionConfig,
    pub(crate) transport_listener: Mutex<Option<ListenerId>>,
    pub(crate) destroyed: AtomicBool,
    pub(crate) metrics: Option<Arc<ClientMetrics>>,
}

impl SessionInner {
    fn ensure_alive(&self) -> Result<()> {
        if self.destroyed.load(Ordering::SeqCst) {
            return Err(Error::UseAfterDestroy);
        }
        Ok(())
    }

    async fn ensure_connected(&self) -> Result<()> {
        let result = self.connection.ensure_connected(self.config.auto_connect).await;
        self.record_connection_state();
        if let Err(e) = &result {
            self.record_error(e);
        }
        result
    }

    /// Flush the unsent calls among `ids` as one message and send it
    async fn transmit(&self, ids: &[Id]) -> Result<()> {
        let outbound = match self.engine.flush(ids) {
            Ok(Some(outbound)) => outbound,
            Ok(None) => return Ok(()),
            Err(e) => {
                self.engine.fail(ids, e.clone());
                return Err(e);
            }
        };
        self.send(outbound).await
    }

    async fn send(&self, outbound: Outbound) -> Result<()> {
        let Outbound { payload, ids } = outbound;
        tracing::debug!(count = ids.len(), bytes = payload.len(), "Sending payload");

        if let Err(e) = self.transport.send(payload).await {
            tracing::warn!(error = %e, count = ids.len(), "Transport send failed");
            self.record_error(&e);
            self.engine.fail(&ids, e.clone());
            return Err(e);
        }
        Ok(())
    }

    /// Connect if needed, then send a call flushed by `prepare`
    ///
    /// Every failure is also recorded on the flushed calls.
    async fn send_prepared(&self, outbound: Outbound) -> Result<()> {
        // destroy has already failed the calls
        self.ensure_alive()?;
        if let Err(e) = self.ensure_connected().await {
            self.engine.fail(&outbound.ids, e.clone());
            return Err(e);
        }
        self.send(outbound).await
    }

    pub(crate) fn discard_unsent(&self, id: &Id) {
        if self.engine.discard_unsent(id) {
            tracing::debug!(id = %id, "Dropped prepared call that was never sent");
        }
    }

    pub(crate) fn handle_event(&self, event: &TransportEvent) {
        match event {
            TransportEvent::Data(value) => {
                for notification in self.engine.receive(value.clone()) {
                    self.dispatch_notification(notification);
                }
            }
            TransportEvent::Connected => {
                tracing::info!("Transport connected");
                self.record_connection_state();
                self.connected.emit(&());
            }
            TransportEvent::Disconnected(error) => {
                match error {
                    Some(e) => tracing::warn!(error = %e, "Transport disconnected"),
                    None => tracing::info!("Transport disconnected"),
                }
                self.record_connection_state();
                self.disconnected.emit(error);
            }
            TransportEvent::Error(error) => {
                tracing::warn!(error = %error, "Transport error");
                self.record_error(error);
                self.errors.emit(error);
            }
        }
    }

    fn dispatch_notification(&self, notification: JsonRpcNotification) {
        let JsonRpcNotification { method, params, .. } = notification;
        tracing::debug!(method = %method, "Notification received");
        if let Some(metrics) = &self.metrics {
            metrics.record_notification(&method);
        }

        match self.notifications.dispatch(&method, params) {
            None => tracing::debug!(method = %method, "No handler registered for notification"),
            Some(Ok(())) => {}
            Some(Err(e)) => self.handler_failed(method, e.to_string()),
        }
    }

    fn handler_failed(&self, method: String, message: String) {
        match self.config.notification_error_policy {
            NotificationErrorPolicy::Log => {
                tracing::error!(method = %method, error = %message, "Notification handler failed");
            }
            NotificationErrorPolicy::Emit => {
                let error = Error::NotificationHandler { method, message };
                self.record_error(&error);
                self.errors.emit(&error);
            }
            NotificationErrorPolicy::Ignore => {}
            NotificationErrorPolicy::Panic => {
                panic!("Notification handler for '{}' failed: {}", method, message);
            }
        }
    }

    fn record_connection_state(&self) {
        if let Some(metrics) = &self.metrics {
            metrics.update_connection_state(self.connection.state());
        }
    }

    fn record_error(&self, error: &Error) {
        if let Some(metrics) = &self.metrics {
            metrics.record_error(error);
        }
    }

    fn record_call(&self, method: &str, outcome: &CallOutcome, started: Instant) {
        if let Some(metrics) = &self.metrics {
            let status = if outcome.is_ok() { "success" } else { "error" };
            metrics.record_call(method, status, started.elapsed().as_secs_f64());
            if let Err(e) = outcome {
                metrics.record_error(e);
            }
        }
    }
}

/// JSON-RPC 2.0 client session over a shared transport
///
/// Cloning is cheap; every clone drives the same session.
#[derive(Clone)]
pub struct ClientSession {
    pub(crate) inner: Arc<SessionInner>,
}

impl ClientSession {
    /// Start configuring a session on `transport`
    pub fn builder(transport: Arc<dyn Transport>) -> SessionBuilder {
        SessionBuilder::new(transport)
    }

    /// Session with default options
    pub fn new(transport: Arc<dyn Transport>) -> Result<Self> {
        SessionBuilder::new(transport).build()
    }

    pub(crate) fn from_inner(inner: Arc<SessionInner>) -> Self {
        Self { inner }
    }

    /// Options the session was built with
    pub fn config(&self) -> &SessionConfig {
        &self.inner.config
    }

    /// Whether the transport must be connected before use
    pub fn needs_connection(&self) -> bool {
        self.inner.connection.needs_connection()
    }

    /// Whether calls can go out right now
    pub fn is_connected(&self) -> bool {
        self.inner.connection.is_connected()
    }

    /// Derived connection state
    pub fn connection_state(&self) -> ConnectionState {
        self.inner.connection.state()
    }

    /// Whether `destroy` has been called
    pub fn is_destroyed(&self) -> bool {
        self.inner.destroyed.load(Ordering::SeqCst)
    }

    /// Number of calls that have not settled yet
    pub fn pending_calls(&self) -> usize {
        self.inner.engine.pending_count()
    }

    /// Connect the transport; a no-op when connectionless or connected
    #[tracing::instrument(skip(self))]
    pub async fn connect(&self) -> Result<()> {
        self.inner.ensure_alive()?;
        let result = self.inner.connection.connect().await;
        self.inner.record_connection_state();
        result
    }

    /// Disconnect the transport; a no-op when connectionless or disconnected
    pub async fn disconnect(&self) -> Result<()> {
        self.inner.ensure_alive()?;
        let result = self.inner.connection.disconnect().await;
        self.inner.record_connection_state();
        result
    }

    /// Call `method` and deserialize its result
    ///
    /// `()` or `null` params are sent as `[]`. Server errors reject with
    /// `Error::Rpc`, unanswered calls with `Error::Timeout`.
    pub async fn call<P, R>(&self, method: &str, params: P) -> Result<R>
    where
        P: Serialize,
        R: DeserializeOwned,
    {
        let params = serde_json::to_value(params)?;
        let response = self.call_with(method, params, CallOptions::default()).await?;
        let result = response.result.unwrap_or(serde_json::Value::Null);
        Ok(serde_json::from_value(result)?)
    }

    /// Call `method` and return the raw [`Response`]
    ///
    /// With `reject_on_error == false` protocol errors and timeouts resolve
    /// to a `Response` carrying the error. Transport failures always reject.
    #[tracing::instrument(skip_all, fields(method = %method))]
    pub async fn call_with(
        &self,
        method: &str,
        params: serde_json::Value,
        options: CallOptions,
    ) -> Result<Response> {
        self.inner.ensure_alive()?;
        validate_method(method)?;
        let params = normalize_params(params)?;

        self.inner.ensure_connected().await?;

        let started = Instant::now();
        let handle = self.inner.engine.register(method, params)?;
        self.inner.transmit(std::slice::from_ref(&handle.id)).await?;
        tracing::debug!("Request sent, waiting for response");

        let outcome = handle.receiver.await.unwrap_or(Err(Error::Shutdown));
        self.inner.record_call(method, &outcome, started);

        match &outcome {
            Ok(_) => tracing::debug!("Request completed successfully"),
            Err(e) => tracing::debug!(error = %e, "Request failed"),
        }

        if options.reject_on_error {
            outcome.map(Response::success)
        } else {
            Response::from_outcome(outcome)
        }
    }

    /// Register a call without waiting for it
    ///
    /// With batching enabled nothing is sent until the call is passed to
    /// [`batch`](Self::batch) or [`PreparedCall::settle`]. With batching
    /// disabled the call goes out on its own right away: it is flushed here
    /// and sent in the background once the transport is connected (following
    /// `auto_connect`), which requires a Tokio runtime.
    pub fn prepare<P: Serialize>(&self, method: &str, params: P) -> Result<PreparedCall> {
        self.inner.ensure_alive()?;
        validate_method(method)?;
        let params = normalize_params(serde_json::to_value(params)?)?;

        let runtime = if self.inner.config.batch_requests {
            None
        } else {
            Some(tokio::runtime::Handle::try_current().map_err(|_| {
                Error::Internal("sending a prepared call requires a Tokio runtime".to_string())
            })?)
        };

        let handle = self.inner.engine.register(method, params)?;

        if let Some(runtime) = runtime {
            // flushed here so a later batch never folds it into an array
            let ids = [handle.id.clone()];
            let flushed = self.inner.engine.flush(&ids).and_then(|outbound| {
                outbound.ok_or_else(|| Error::Internal("prepared call was not queued".to_string()))
            });
            let outbound = match flushed {
                Ok(outbound) => outbound,
                Err(e) => {
                    self.inner.engine.fail(&ids, e.clone());
                    return Err(e);
                }
            };
            let inner = Arc::clone(&self.inner);
            runtime.spawn(async move {
                if let Err(e) = inner.send_prepared(outbound).await {
                    tracing::debug!(error = %e, "Prepared call was not delivered");
                }
            });
        }

        Ok(PreparedCall::new(Arc::clone(&self.inner), handle, method))
    }

    /// Send prepared calls together and wait for all of them
    ///
    /// The output has the shape of the input. Protocol errors and timeouts
    /// land in their slot; a transport failure rejects the whole batch.
    pub async fn batch(&self, requests: impl Into<BatchRequest>) -> Result<BatchResponse> {
        self.run_batch(requests.into()).await
    }

    #[tracing::instrument(skip_all, fields(batch_size = requests.len()))]
    async fn run_batch(&self, requests: BatchRequest) -> Result<BatchResponse> {
        self.inner.ensure_alive()?;

        let (shape, calls) = requests.into_parts();
        if calls.iter().any(|call| !call.belongs_to(&self.inner)) {
            return Err(Error::Argument(
                "batch contains a call prepared by another session".to_string(),
            ));
        }
        if calls.is_empty() {
            return Ok(shape.rebuild(Vec::new()));
        }

        self.inner.ensure_connected().await?;
        if let Some(metrics) = &self.inner.metrics {
            metrics.record_batch(calls.len() as u64);
        }

        let ids: Vec<Id> = calls.iter().map(|call| call.id().clone()).collect();
        self.inner.transmit(&ids).await?;
        tracing::debug!("Batch sent, waiting for responses");

        let outcomes = futures::future::join_all(calls.into_iter().map(PreparedCall::wait)).await;
        let responses = outcomes
            .into_iter()
            .map(Response::from_outcome)
            .collect::<Result<Vec<_>>>()?;

        tracing::debug!(response_count = responses.len(), "Batch completed");
        Ok(shape.rebuild(responses))
    }

    /// Install (`Some`) or remove (`None`) the handler for notification `name`
    pub fn notification(&self, name: &str, handler: Option<NotificationFn>) -> Result<()> {
        self.inner.ensure_alive()?;
        self.inner.notifications.set(name, handler);
        Ok(())
    }

    /// Install a handler for notification `name`, replacing any previous one
    pub fn on_notification<F>(&self, name: &str, handler: F) -> Result<()>
    where
        F: Fn(serde_json::Value) -> HandlerResult + Send + Sync + 'static,
    {
        self.notification(name, Some(Arc::new(handler)))
    }

    /// Remove the handler for notification `name`
    pub fn remove_notification(&self, name: &str) -> Result<()> {
        self.notification(name, None)
    }

    /// Listen for the transport connecting
    pub fn on_connected<F>(&self, listener: F) -> Result<ListenerId>
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.inner.ensure_alive()?;
        Ok(self.inner.connected.add(move |_: &()| listener()))
    }

    /// Listen for the transport disconnecting, with the error if it failed
    pub fn on_disconnected<F>(&self, listener: F) -> Result<ListenerId>
    where
        F: Fn(Option<&Error>) + Send + Sync + 'static,
    {
        self.inner.ensure_alive()?;
        Ok(self
            .inner
            .disconnected
            .add(move |error: &Option<Error>| listener(error.as_ref())))
    }

    /// Listen for transport errors and emitted handler failures
    pub fn on_error<F>(&self, listener: F) -> Result<ListenerId>
    where
        F: Fn(&Error) + Send + Sync + 'static,
    {
        self.inner.ensure_alive()?;
        Ok(self.inner.errors.add(listener))
    }

    /// Remove a listener added with `on_connected`, `on_disconnected` or `on_error`
    pub fn remove_listener(&self, id: ListenerId) -> bool {
        self.inner.connected.remove(id)
            || self.inner.disconnected.remove(id)
            || self.inner.errors.remove(id)
    }

    /// Tear the session down
    ///
    /// Unsubscribes from the transport, drops every listener and handler,
    /// fails pending calls with `Error::Shutdown` and disconnects. A
    /// disconnect failure is returned, but the session stays destroyed.
    #[tracing::instrument(skip(self))]
    pub async fn destroy(&self) -> Result<()> {
        if self.inner.destroyed.swap(true, Ordering::SeqCst) {
            return Err(Error::UseAfterDestroy);
        }

        let listener = self.inner.transport_listener.lock().take();
        if let Some(id) = listener {
            self.inner.transport.unsubscribe(id);
        }

        self.inner.connected.clear();
        self.inner.disconnected.clear();
        self.inner.errors.clear();
        self.inner.notifications.clear();

        self.inner.engine.shutdown();

        let result = self.inner.connection.disconnect().await;
        self.inner.record_connection_state();
        if let Err(e) = &result {
            tracing::warn!(error = %e, "Disconnect during destroy failed");
        }
        tracing::info!("Session destroyed");
        result
    }
}

impl std::fmt::Debug for ClientSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientSession")
            .field("config", &self.inner.config)
            .field("state", &self.connection_state())
            .field("destroyed", &self.is_destroyed())
            .finish()
    }
}

fn validate_method(method: &str) -> Result<()> {
    if method.is_empty() {
        return Err(Error::Argument("method name must not be empty".to_string()));
    }
    Ok(())
}

/// `null` becomes `[]`; arrays and objects pass; scalars are rejected
fn normalize_params(params: serde_json::Value) -> Result<serde_json::Value> {
    match params {
        serde_json::Value::Null => Ok(serde_json::Value::Array(Vec::new())),
        serde_json::Value::Array(_) | serde_json::Value::Object(_) => Ok(params),
        other => Err(Error::Argument(format!(
            "params must be an array or an object, got {}",
            other
        ))),
    }
}

//! Common test utilities for jrat-client integration tests
//!
//! Fake transports answer requests synchronously from inside `send`, so a
//! call's response is already queued by the time `send` returns. Methods the
//! fakes understand:
//!
//! - `echo`: result is the params
//! - `echo-base64`: result is base64 of the params' JSON text
//! - `fail`: error `{code: 1234, message: "Failure", data: params}`
//! - `never`: no response at all
//! - anything else: method not found

#![allow(dead_code)]

use base64::Engine as _;
use futures::future::BoxFuture;
use futures::{SinkExt, StreamExt};
use jrat_client::{
    Connection, ListenerId, Listeners, Transport, TransportEvent, TransportListener,
};
use jrat_core::{Error, Result};
use parking_lot::Mutex;
use serde_json::{json, Value};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio_tungstenite::accept_async;
use tokio_tungstenite::tungstenite::Message;

/// Answer one request object, `None` when it gets no response
pub fn reply_to(request: &Value) -> Option<Value> {
    let id = request.get("id")?.clone();
    let params = request.get("params").cloned().unwrap_or(Value::Null);
    let method = request.get("method").and_then(Value::as_str).unwrap_or_default();

    match method {
        "echo" => Some(json!({"jsonrpc": "2.0", "id": id, "result": params})),
        "echo-base64" => {
            let text = serde_json::to_string(&params).ok()?;
            let encoded = base64::engine::general_purpose::STANDARD.encode(text);
            Some(json!({"jsonrpc": "2.0", "id": id, "result": encoded}))
        }
        "fail" => Some(json!({
            "jsonrpc": "2.0",
            "id": id,
            "error": {"code": 1234, "message": "Failure", "data": params}
        })),
        "never" => None,
        other => Some(json!({
            "jsonrpc": "2.0",
            "id": id,
            "error": {"code": -32601, "message": format!("Method not found: {}", other)}
        })),
    }
}

/// Answer a whole payload: an object gets an object, an array gets an array
pub fn reply_to_payload(payload: &Value) -> Option<Value> {
    match payload {
        Value::Array(requests) => {
            let replies: Vec<Value> = requests.iter().filter_map(reply_to).collect();
            if replies.is_empty() {
                None
            } else {
                Some(Value::Array(replies))
            }
        }
        request => reply_to(request),
    }
}

/// Connectionless in-process transport backed by [`reply_to`]
#[derive(Default)]
pub struct EchoTransport {
    listeners: Listeners<TransportEvent>,
    sent: Mutex<Vec<Value>>,
    fail_sends: AtomicBool,
}

impl EchoTransport {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Make every later send deliver its responses and then fail
    pub fn fail_sends(&self, fail: bool) {
        self.fail_sends.store(fail, Ordering::SeqCst);
    }

    /// Payloads passed to `send`, parsed
    pub fn sent(&self) -> Vec<Value> {
        self.sent.lock().clone()
    }

    pub fn send_count(&self) -> usize {
        self.sent.lock().len()
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.len()
    }

    /// Deliver an inbound message as if the server sent it
    pub fn inject(&self, value: Value) {
        self.listeners.emit(&TransportEvent::Data(value));
    }

    /// Publish an arbitrary transport event
    pub fn emit(&self, event: TransportEvent) {
        self.listeners.emit(&event);
    }
}

impl Transport for EchoTransport {
    fn send(&self, payload: String) -> BoxFuture<'_, Result<()>> {
        Box::pin(async move {
            let value: Value =
                serde_json::from_str(&payload).map_err(|e| Error::Transport(e.to_string()))?;
            self.sent.lock().push(value.clone());

            if let Some(reply) = reply_to_payload(&value) {
                self.listeners.emit(&TransportEvent::Data(reply));
            }

            if self.fail_sends.load(Ordering::SeqCst) {
                return Err(Error::Transport("send failed".to_string()));
            }
            Ok(())
        })
    }

    fn subscribe(&self, listener: TransportListener) -> ListenerId {
        self.listeners.add_arc(listener)
    }

    fn unsubscribe(&self, id: ListenerId) -> bool {
        self.listeners.remove(id)
    }
}

/// Connection-oriented in-process transport backed by [`reply_to`]
#[derive(Default)]
pub struct ConnectableTransport {
    listeners: Listeners<TransportEvent>,
    connected: AtomicBool,
    pub connects: AtomicUsize,
    pub disconnects: AtomicUsize,
    pub sends: AtomicUsize,
    fail_connect: AtomicBool,
    fail_disconnect: AtomicBool,
}

impl ConnectableTransport {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn fail_connect(&self, fail: bool) {
        self.fail_connect.store(fail, Ordering::SeqCst);
    }

    pub fn fail_disconnect(&self, fail: bool) {
        self.fail_disconnect.store(fail, Ordering::SeqCst);
    }

    pub fn connect_count(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }

    pub fn disconnect_count(&self) -> usize {
        self.disconnects.load(Ordering::SeqCst)
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.len()
    }

    /// Simulate the peer dropping the connection
    pub fn drop_connection(&self, error: Option<Error>) {
        self.connected.store(false, Ordering::SeqCst);
        self.listeners.emit(&TransportEvent::Disconnected(error));
    }

    pub fn inject(&self, value: Value) {
        self.listeners.emit(&TransportEvent::Data(value));
    }
}

impl Transport for ConnectableTransport {
    fn send(&self, payload: String) -> BoxFuture<'_, Result<()>> {
        Box::pin(async move {
            if !self.connected.load(Ordering::SeqCst) {
                return Err(Error::Transport("not connected".to_string()));
            }
            self.sends.fetch_add(1, Ordering::SeqCst);
            let value: Value =
                serde_json::from_str(&payload).map_err(|e| Error::Transport(e.to_string()))?;
            if let Some(reply) = reply_to_payload(&value) {
                self.listeners.emit(&TransportEvent::Data(reply));
            }
            Ok(())
        })
    }

    fn subscribe(&self, listener: TransportListener) -> ListenerId {
        self.listeners.add_arc(listener)
    }

    fn unsubscribe(&self, id: ListenerId) -> bool {
        self.listeners.remove(id)
    }

    fn needs_connection(&self) -> bool {
        true
    }

    fn connection(&self) -> Option<&dyn Connection> {
        Some(self)
    }
}

impl Connection for ConnectableTransport {
    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    fn connect(&self) -> BoxFuture<'_, Result<()>> {
        Box::pin(async move {
            self.connects.fetch_add(1, Ordering::SeqCst);
            // let overlapping callers pile up on the gate
            tokio::task::yield_now().await;
            if self.fail_connect.load(Ordering::SeqCst) {
                return Err(Error::Transport("connection refused".to_string()));
            }
            self.connected.store(true, Ordering::SeqCst);
            self.listeners.emit(&TransportEvent::Connected);
            Ok(())
        })
    }

    fn disconnect(&self) -> BoxFuture<'_, Result<()>> {
        Box::pin(async move {
            self.disconnects.fetch_add(1, Ordering::SeqCst);
            if self.fail_disconnect.load(Ordering::SeqCst) {
                return Err(Error::Transport("disconnect failed".to_string()));
            }
            self.connected.store(false, Ordering::SeqCst);
            self.listeners.emit(&TransportEvent::Disconnected(None));
            Ok(())
        })
    }
}

/// Claims to need a connection but exposes no connection capability
#[derive(Default)]
pub struct NoConnectionTransport {
    listeners: Listeners<TransportEvent>,
}

impl Transport for NoConnectionTransport {
    fn send(&self, _payload: String) -> BoxFuture<'_, Result<()>> {
        Box::pin(async { Ok(()) })
    }

    fn subscribe(&self, listener: TransportListener) -> ListenerId {
        self.listeners.add_arc(listener)
    }

    fn unsubscribe(&self, id: ListenerId) -> bool {
        self.listeners.remove(id)
    }

    fn needs_connection(&self) -> bool {
        true
    }
}

/// Mock WebSocket server for transport testing
///
/// Accepts connections, forwards every text frame to the test through
/// [`MockWsServer::wait_for_message`] and answers with the handler's output.
pub struct MockWsServer {
    addr: SocketAddr,
    shutdown_tx: mpsc::Sender<()>,
    message_rx: mpsc::Receiver<String>,
    push_tx: tokio::sync::broadcast::Sender<String>,
}

impl MockWsServer {
    /// Start a server that answers JSON-RPC requests with [`reply_to_payload`]
    pub async fn jsonrpc() -> Self {
        Self::with_handler(|text| {
            let request: Value = serde_json::from_str(&text).ok()?;
            reply_to_payload(&request).map(|reply| reply.to_string())
        })
        .await
    }

    /// Start a server with a custom message handler
    ///
    /// The handler receives incoming text frames and returns the reply frame,
    /// or `None` to stay silent.
    pub async fn with_handler<F>(handler: F) -> Self
    where
        F: Fn(String) -> Option<String> + Send + Sync + 'static,
    {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let (shutdown_tx, mut shutdown_rx) = mpsc::channel::<()>(1);
        let (msg_tx, message_rx) = mpsc::channel::<String>(100);
        let (push_tx, _) = tokio::sync::broadcast::channel::<String>(16);
        let handler = Arc::new(handler);
        let pushes = push_tx.clone();

        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = shutdown_rx.recv() => break,
                    accepted = listener.accept() => {
                        let Ok((stream, _)) = accepted else { continue };
                        let msg_tx = msg_tx.clone();
                        let handler = Arc::clone(&handler);
                        let mut push_rx = pushes.subscribe();

                        tokio::spawn(async move {
                            let Ok(ws_stream) = accept_async(stream).await else { return };
                            let (mut write, mut read) = ws_stream.split();

                            loop {
                                tokio::select! {
                                    frame = read.next() => {
                                        let Some(Ok(frame)) = frame else { break };
                                        match frame {
                                            Message::Text(text) => {
                                                let _ = msg_tx.send(text.clone()).await;
                                                if let Some(reply) = handler(text) {
                                                    let _ = write.send(Message::Text(reply)).await;
                                                }
                                            }
                                            Message::Close(_) => break,
                                            _ => {}
                                        }
                                    }
                                    pushed = push_rx.recv() => {
                                        match pushed {
                                            Ok(text) if text == "__close__" => {
                                                let _ = write.send(Message::Close(None)).await;
                                                break;
                                            }
                                            Ok(text) => {
                                                let _ = write.send(Message::Text(text)).await;
                                            }
                                            Err(_) => break,
                                        }
                                    }
                                }
                            }
                        });
                    }
                }
            }
        });

        Self {
            addr,
            shutdown_tx,
            message_rx,
            push_tx,
        }
    }

    /// Get the WebSocket URL for connecting to this server
    pub fn url(&self) -> String {
        format!("ws://{}", self.addr)
    }

    /// Send a text frame to every connected client
    pub fn push(&self, text: impl Into<String>) {
        let _ = self.push_tx.send(text.into());
    }

    /// Close every client connection from the server side
    pub fn close_clients(&self) {
        self.push("__close__");
    }

    /// Wait for a message to be received by the server
    ///
    /// Returns None if the server is shut down or the timeout expires.
    pub async fn wait_for_message(&mut self) -> Option<String> {
        tokio::time::timeout(tokio::time::Duration::from_secs(5), self.message_rx.recv())
            .await
            .ok()
            .flatten()
    }

    /// Shutdown the mock server
    pub async fn shutdown(self) {
        let _ = self.shutdown_tx.send(()).await;
    }
}

/// Helper to create a JSON-RPC notification
pub fn notification(method: &str, params: Value) -> Value {
    json!({"jsonrpc": "2.0", "method": method, "params": params})
}

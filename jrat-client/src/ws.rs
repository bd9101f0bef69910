//! WebSocket transport
//!
//! A connection-oriented [`Transport`] on top of `tokio-tungstenite`. Every
//! payload goes out as one text frame. Inbound text (or UTF-8 binary) frames
//! are parsed as JSON and published as [`TransportEvent::Data`].
//!
//! A background reader task runs while connected. It publishes
//! `Disconnected(None)` when the peer closes the socket and
//! `Disconnected(Some(..))` when the socket fails. A local `disconnect`
//! publishes `Disconnected(None)` itself. Each connection ends with exactly
//! one `Disconnected` event.
//!
//! # Examples
//!
//! ```rust,no_run
//! use jrat_client::{ClientSession, WebSocketTransport};
//! use std::sync::Arc;
//!
//! # async fn example() -> jrat_core::Result<()> {
//! let transport = Arc::new(WebSocketTransport::new("ws://localhost:8080"));
//! let session = ClientSession::new(transport)?;
//!
//! // autoconnect opens the socket on first use
//! let sum: i64 = session.call("add", [5, 3]).await?;
//! # Ok(())
//! # }
//! ```

use crate::events::{ListenerId, Listeners};
use crate::transport::{Connection, Transport, TransportEvent, TransportListener};
use futures::future::BoxFuture;
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use jrat_core::{codec, Error, Result};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_tungstenite::{connect_async, tungstenite::Message, MaybeTlsStream, WebSocketStream};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// JSON-RPC transport over one WebSocket connection
pub struct WebSocketTransport {
    url: String,
    shared: Arc<Shared>,
}

struct Shared {
    sink: Mutex<Option<SplitSink<WsStream, Message>>>,
    reader: parking_lot::Mutex<Option<JoinHandle<()>>>,
    connected: AtomicBool,
    listeners: Listeners<TransportEvent>,
}

impl Shared {
    /// Flip to disconnected and publish the event; false if already disconnected
    fn mark_disconnected(&self, error: Option<Error>) -> bool {
        if !self.connected.swap(false, Ordering::SeqCst) {
            return false;
        }
        self.listeners.emit(&TransportEvent::Disconnected(error));
        true
    }
}

impl WebSocketTransport {
    /// Transport for `url`; nothing is opened until `connect`
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            shared: Arc::new(Shared {
                sink: Mutex::new(None),
                reader: parking_lot::Mutex::new(None),
                connected: AtomicBool::new(false),
                listeners: Listeners::new(),
            }),
        }
    }

    /// Server URL
    pub fn url(&self) -> &str {
        &self.url
    }

    async fn open(&self) -> Result<()> {
        tracing::info!(url = %self.url, "Connecting to server");
        let (ws_stream, _) = connect_async(self.url.as_str())
            .await
            .map_err(|e| Error::Transport(e.to_string()))?;

        let (sink, stream) = ws_stream.split();
        *self.shared.sink.lock().await = Some(sink);
        self.shared.connected.store(true, Ordering::SeqCst);

        let reader = tokio::spawn(read_loop(stream, Arc::clone(&self.shared)));
        let previous = self.shared.reader.lock().replace(reader);
        if let Some(previous) = previous {
            previous.abort();
        }

        tracing::info!(url = %self.url, "Connected successfully");
        self.shared.listeners.emit(&TransportEvent::Connected);
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        if !self.shared.connected.load(Ordering::SeqCst) {
            return Ok(());
        }

        let sink = self.shared.sink.lock().await.take();
        let reader = self.shared.reader.lock().take();
        if let Some(reader) = reader {
            reader.abort();
        }

        let result = match sink {
            Some(mut sink) => sink
                .close()
                .await
                .map_err(|e| Error::Transport(e.to_string())),
            None => Ok(()),
        };

        self.shared.mark_disconnected(None);
        result
    }

    async fn send_text(&self, payload: String) -> Result<()> {
        if !self.shared.connected.load(Ordering::SeqCst) {
            return Err(Error::Transport("WebSocket is not connected".to_string()));
        }

        let mut sink = self.shared.sink.lock().await;
        let Some(sink) = sink.as_mut() else {
            return Err(Error::Transport("WebSocket is not connected".to_string()));
        };
        sink.send(Message::Text(payload))
            .await
            .map_err(|e| Error::Transport(e.to_string()))
    }
}

async fn read_loop(mut stream: SplitStream<WsStream>, shared: Arc<Shared>) {
    while let Some(frame) = stream.next().await {
        match frame {
            Ok(Message::Text(text)) => publish(&shared, &text),
            Ok(Message::Binary(bytes)) => match String::from_utf8(bytes) {
                Ok(text) => publish(&shared, &text),
                Err(e) => shared
                    .listeners
                    .emit(&TransportEvent::Error(Error::Transport(e.to_string()))),
            },
            Ok(Message::Close(_)) => {
                tracing::info!("Connection closed by server");
                break;
            }
            Ok(_) => {}
            Err(e) => {
                tracing::error!(error = %e, "WebSocket error");
                shared.sink.lock().await.take();
                shared.mark_disconnected(Some(Error::Transport(e.to_string())));
                return;
            }
        }
    }

    shared.sink.lock().await.take();
    shared.mark_disconnected(None);
}

fn publish(shared: &Shared, text: &str) {
    match codec::parse(text) {
        Ok(value) => shared.listeners.emit(&TransportEvent::Data(value)),
        Err(e) => {
            tracing::warn!(error = %e, "Received malformed JSON");
            shared.listeners.emit(&TransportEvent::Error(e));
        }
    }
}

impl Transport for WebSocketTransport {
    fn send(&self, payload: String) -> BoxFuture<'_, Result<()>> {
        Box::pin(self.send_text(payload))
    }

    fn subscribe(&self, listener: TransportListener) -> ListenerId {
        self.shared.listeners.add_arc(listener)
    }

    fn unsubscribe(&self, id: ListenerId) -> bool {
        self.shared.listeners.remove(id)
    }

    fn needs_connection(&self) -> bool {
        true
    }

    fn connection(&self) -> Option<&dyn Connection> {
        Some(self)
    }
}

impl Connection for WebSocketTransport {
    fn is_connected(&self) -> bool {
        self.shared.connected.load(Ordering::SeqCst)
    }

    fn connect(&self) -> BoxFuture<'_, Result<()>> {
        Box::pin(self.open())
    }

    fn disconnect(&self) -> BoxFuture<'_, Result<()>> {
        Box::pin(self.close())
    }
}

impl Drop for WebSocketTransport {
    fn drop(&mut self) {
        if let Some(reader) = self.shared.reader.lock().take() {
            reader.abort();
        }
    }
}

//! WebSocket transport implementation using `tokio-tungstenite`.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::{Error as WsError, Message};
use tokio_tungstenite::WebSocketStream;

use crate::{Connection, ConnectionId, Transport, TransportError};

/// Counter for generating unique connection IDs.
static NEXT_CONNECTION_ID: AtomicU64 = AtomicU64::new(1);

/// Handshakes that take longer than this are dropped.
const DEFAULT_HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(5);

/// Established connections waiting for `accept()`.
const ACCEPT_BACKLOG: usize = 128;

type WsStream = WebSocketStream<TcpStream>;

/// A WebSocket-based [`Transport`] that listens for incoming connections.
///
/// The TCP accept loop runs in a background task and performs each
/// WebSocket handshake in its own task, so a client that stalls its
/// handshake never delays anyone else. [`accept`](Transport::accept)
/// only ever yields fully upgraded connections.
pub struct WebSocketTransport {
    local_addr: SocketAddr,
    incoming: mpsc::Receiver<WebSocketConnection>,
    acceptor: JoinHandle<()>,
}

impl WebSocketTransport {
    /// Binds a new WebSocket transport to the given address.
    pub async fn bind(addr: &str) -> Result<Self, TransportError> {
        Self::bind_with_timeout(addr, DEFAULT_HANDSHAKE_TIMEOUT).await
    }

    /// Binds a new WebSocket transport with a custom handshake timeout.
    pub async fn bind_with_timeout(
        addr: &str,
        handshake_timeout: Duration,
    ) -> Result<Self, TransportError> {
        let bind_error = |source| TransportError::Bind {
            addr: addr.to_owned(),
            source,
        };
        let listener = TcpListener::bind(addr).await.map_err(bind_error)?;
        let local_addr = listener.local_addr().map_err(bind_error)?;
        tracing::info!(%local_addr, "WebSocket transport listening");

        let (tx, rx) = mpsc::channel(ACCEPT_BACKLOG);
        let acceptor =
            tokio::spawn(accept_loop(listener, tx, handshake_timeout));

        Ok(Self {
            local_addr,
            incoming: rx,
            acceptor,
        })
    }

    /// Returns the address the listener is actually bound to. Useful when
    /// binding to port 0.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }
}

impl Drop for WebSocketTransport {
    fn drop(&mut self) {
        self.acceptor.abort();
    }
}

impl Transport for WebSocketTransport {
    type Connection = WebSocketConnection;
    type Error = TransportError;

    async fn accept(&mut self) -> Result<Self::Connection, Self::Error> {
        self.incoming.recv().await.ok_or(TransportError::Shutdown)
    }

    async fn shutdown(&self) -> Result<(), Self::Error> {
        self.acceptor.abort();
        tracing::info!(local_addr = %self.local_addr, "WebSocket transport stopped");
        Ok(())
    }
}

async fn accept_loop(
    listener: TcpListener,
    ready: mpsc::Sender<WebSocketConnection>,
    handshake_timeout: Duration,
) {
    loop {
        let (stream, addr) = match listener.accept().await {
            Ok(pair) => pair,
            Err(e) => {
                // Usually fd exhaustion; back off instead of spinning.
                tracing::warn!(error = %e, "TCP accept failed");
                tokio::time::sleep(Duration::from_millis(50)).await;
                continue;
            }
        };

        if ready.is_closed() {
            break;
        }

        let ready = ready.clone();
        tokio::spawn(async move {
            let upgrade = tokio::time::timeout(
                handshake_timeout,
                tokio_tungstenite::accept_async(stream),
            )
            .await;

            match upgrade {
                Ok(Ok(ws)) => {
                    let conn = WebSocketConnection::new(ws);
                    tracing::debug!(id = %conn.id, %addr, "accepted WebSocket connection");
                    let _ = ready.send(conn).await;
                }
                Ok(Err(e)) => {
                    tracing::debug!(%addr, error = %e, "WebSocket handshake failed");
                }
                Err(_) => {
                    tracing::debug!(%addr, "WebSocket handshake timed out");
                }
            }
        });
    }
}

/// A single WebSocket connection.
///
/// The socket is split into independent write and read halves, each behind
/// its own lock, so a task parked in `recv` never holds up `send`.
pub struct WebSocketConnection {
    id: ConnectionId,
    sink: Mutex<SplitSink<WsStream, Message>>,
    stream: Mutex<SplitStream<WsStream>>,
}

impl WebSocketConnection {
    fn new(ws: WsStream) -> Self {
        let id = ConnectionId::new(
            NEXT_CONNECTION_ID.fetch_add(1, Ordering::Relaxed),
        );
        let (sink, stream) = ws.split();
        Self {
            id,
            sink: Mutex::new(sink),
            stream: Mutex::new(stream),
        }
    }

    fn wire_error(&self, e: WsError) -> TransportError {
        match e {
            WsError::ConnectionClosed | WsError::AlreadyClosed => {
                TransportError::Closed(self.id)
            }
            source => TransportError::WebSocket {
                id: self.id,
                source,
            },
        }
    }
}

impl Connection for WebSocketConnection {
    type Error = TransportError;

    /// Frames that are valid UTF-8 go out as text frames (what browser
    /// clients expect for JSON); anything else as binary.
    async fn send(&self, data: &[u8]) -> Result<(), Self::Error> {
        let msg = match std::str::from_utf8(data) {
            Ok(text) => Message::text(text.to_owned()),
            Err(_) => Message::binary(data.to_vec()),
        };
        self.sink
            .lock()
            .await
            .send(msg)
            .await
            .map_err(|e| self.wire_error(e))
    }

    async fn recv(&self) -> Result<Option<Vec<u8>>, Self::Error> {
        let mut stream = self.stream.lock().await;
        loop {
            match stream.next().await {
                Some(Ok(Message::Binary(data))) => {
                    return Ok(Some(data.into()));
                }
                Some(Ok(Message::Text(text))) => {
                    return Ok(Some(text.as_bytes().to_vec()));
                }
                Some(Ok(Message::Close(_))) | None => return Ok(None),
                Some(Ok(_)) => continue, // ping/pong/raw frame
                Some(Err(e)) => return Err(self.wire_error(e)),
            }
        }
    }

    async fn close(&self) -> Result<(), Self::Error> {
        self.sink
            .lock()
            .await
            .close()
            .await
            .map_err(|e| self.wire_error(e))
    }

    fn id(&self) -> ConnectionId {
        self.id
    }
}

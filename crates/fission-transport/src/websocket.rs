//! WebSocket transport implementation using `tokio-tungstenite`.
//!
//! Addresses are `host:port` strings. WebSocket connections do not carry
//! the dialer's own listening address, so the dialer announces it in a
//! single text frame right after the handshake. The accepting side reads
//! that frame before handing the connection out.

use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::Mutex;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

use crate::{Connection, ConnectionId, Listener, Transport, TransportError};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

const DEFAULT_BIND: &str = "127.0.0.1:0";

fn io_error(kind: std::io::ErrorKind, e: impl std::error::Error + Send + Sync + 'static) -> std::io::Error {
    std::io::Error::new(kind, e)
}

/// A WebSocket-based [`Transport`].
#[derive(Debug, Clone, Copy, Default)]
pub struct WebSocketTransport;

impl WebSocketTransport {
    /// Creates the transport. It holds no state; every listener owns its
    /// own socket.
    pub fn new() -> Self {
        Self
    }
}

impl Transport for WebSocketTransport {
    type Connection = WebSocketConnection;
    type Listener = WebSocketListener;

    async fn listen(&self, address: Option<&str>) -> Result<WebSocketListener, TransportError> {
        let requested = address.unwrap_or(DEFAULT_BIND);
        let listener = TcpListener::bind(requested).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::AddrInUse {
                TransportError::AddressInUse(requested.to_string())
            } else {
                TransportError::AcceptFailed(e)
            }
        })?;
        let address = listener
            .local_addr()
            .map_err(TransportError::AcceptFailed)?
            .to_string();
        tracing::info!(%address, "WebSocket transport listening");
        Ok(WebSocketListener { address, listener })
    }

    async fn connect(&self, local: &str, remote: &str) -> Result<WebSocketConnection, TransportError> {
        let url = format!("ws://{remote}");
        let (ws, _) = tokio_tungstenite::connect_async(&url).await.map_err(|e| {
            tracing::debug!(%remote, error = %e, "WebSocket dial failed");
            TransportError::Unreachable(remote.to_string())
        })?;

        let conn = WebSocketConnection::new(ws, remote.to_string());
        conn.send_frame(Message::text(local.to_string())).await?;
        tracing::debug!(id = %conn.id, %remote, "WebSocket connection opened");
        Ok(conn)
    }
}

/// A bound TCP socket that upgrades inbound connections to WebSocket.
pub struct WebSocketListener {
    address: String,
    listener: TcpListener,
}

impl Listener for WebSocketListener {
    type Connection = WebSocketConnection;

    fn local_address(&self) -> &str {
        &self.address
    }

    async fn accept(&mut self) -> Result<WebSocketConnection, TransportError> {
        let (stream, addr) = self
            .listener
            .accept()
            .await
            .map_err(TransportError::AcceptFailed)?;

        let mut ws = tokio_tungstenite::accept_async(MaybeTlsStream::Plain(stream))
            .await
            .map_err(|e| TransportError::AcceptFailed(io_error(std::io::ErrorKind::ConnectionRefused, e)))?;

        let remote = match ws.next().await {
            Some(Ok(Message::Text(hello))) => hello.as_str().to_string(),
            Some(Err(e)) => {
                return Err(TransportError::AcceptFailed(io_error(
                    std::io::ErrorKind::InvalidData,
                    e,
                )));
            }
            _ => {
                return Err(TransportError::AcceptFailed(std::io::Error::new(
                    std::io::ErrorKind::InvalidData,
                    format!("{addr} sent no address announcement"),
                )));
            }
        };

        let conn = WebSocketConnection::new(ws, remote);
        tracing::debug!(id = %conn.id, %addr, remote = %conn.remote, "accepted WebSocket connection");
        Ok(conn)
    }
}

/// A single WebSocket connection.
///
/// The stream is split so a reader parked in [`recv`](Connection::recv)
/// never blocks a concurrent [`send`](Connection::send).
pub struct WebSocketConnection {
    id: ConnectionId,
    remote: String,
    sink: Mutex<SplitSink<WsStream, Message>>,
    stream: Mutex<SplitStream<WsStream>>,
}

impl WebSocketConnection {
    fn new(ws: WsStream, remote: String) -> Self {
        let (sink, stream) = ws.split();
        Self {
            id: ConnectionId::next(),
            remote,
            sink: Mutex::new(sink),
            stream: Mutex::new(stream),
        }
    }

    async fn send_frame(&self, msg: Message) -> Result<(), TransportError> {
        self.sink
            .lock()
            .await
            .send(msg)
            .await
            .map_err(|e| TransportError::SendFailed(io_error(std::io::ErrorKind::BrokenPipe, e)))
    }
}

impl Connection for WebSocketConnection {
    async fn send(&self, data: &[u8]) -> Result<(), TransportError> {
        self.send_frame(Message::Binary(data.to_vec().into())).await
    }

    async fn recv(&self) -> Result<Option<Vec<u8>>, TransportError> {
        let mut stream = self.stream.lock().await;
        loop {
            match stream.next().await {
                Some(Ok(Message::Binary(data))) => return Ok(Some(data.into())),
                Some(Ok(Message::Text(text))) => return Ok(Some(text.as_bytes().to_vec())),
                Some(Ok(Message::Close(_))) | None => return Ok(None),
                Some(Ok(_)) => continue, // ping/pong/raw frame
                Some(Err(e)) => {
                    return Err(TransportError::ReceiveFailed(io_error(
                        std::io::ErrorKind::ConnectionReset,
                        e,
                    )));
                }
            }
        }
    }

    async fn close(&self) -> Result<(), TransportError> {
        self.sink
            .lock()
            .await
            .close()
            .await
            .map_err(|e| TransportError::SendFailed(io_error(std::io::ErrorKind::BrokenPipe, e)))
    }

    fn id(&self) -> ConnectionId {
        self.id
    }

    fn remote_address(&self) -> &str {
        &self.remote
    }
}

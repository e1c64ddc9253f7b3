//! Transport abstraction layer for Fission.
//!
//! A peer needs exactly three things from the network underneath it:
//! claim an address ([`Transport::listen`]), dial another address
//! ([`Transport::connect`]), and exchange ordered, reliable messages over
//! the resulting [`Connection`]. Everything above this crate (codec,
//! registry, room coordinator) is written against these traits only.
//!
//! # Adapters
//!
//! - [`MemoryNetwork`]: in-process broker. Addresses are arbitrary
//!   strings. Used by tests and the demo.
//! - [`WebSocketTransport`]: loopback/LAN WebSocket adapter. Addresses
//!   are `host:port` strings.
//!
//! # Feature Flags
//!
//! - `websocket` (default): WebSocket adapter via `tokio-tungstenite`

mod error;
mod memory;
#[cfg(feature = "websocket")]
mod websocket;

pub use error::TransportError;
pub use memory::{MemoryConnection, MemoryListener, MemoryNetwork};
#[cfg(feature = "websocket")]
pub use websocket::{WebSocketConnection, WebSocketListener, WebSocketTransport};

use std::fmt;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};

/// Counter shared by every adapter so ids never collide in one process.
static NEXT_CONNECTION_ID: AtomicU64 = AtomicU64::new(1);

/// Opaque identifier for one end of a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(u64);

impl ConnectionId {
    /// Creates a new `ConnectionId` from a raw `u64`.
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    /// Allocates the next process-wide unique id.
    pub fn next() -> Self {
        Self(NEXT_CONNECTION_ID.fetch_add(1, Ordering::Relaxed))
    }

    /// Returns the underlying `u64` value.
    pub fn into_inner(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// Claims addresses and dials remote ones.
///
/// Implementations are cheap handles (`Clone`) onto some shared network
/// state, so a coordinator can keep one around for later dials.
pub trait Transport: Clone + Send + Sync + 'static {
    /// The connection type produced by this transport.
    type Connection: Connection;
    /// The listener type produced by [`listen`](Self::listen).
    type Listener: Listener<Connection = Self::Connection>;

    /// Claims `address` (or an adapter-assigned one when `None`) and
    /// starts accepting inbound connections on it.
    ///
    /// # Errors
    /// [`TransportError::AddressInUse`] when the address is taken.
    fn listen(
        &self,
        address: Option<&str>,
    ) -> impl Future<Output = Result<Self::Listener, TransportError>> + Send;

    /// Opens a connection from `local` to `remote`.
    ///
    /// # Errors
    /// [`TransportError::Unreachable`] when nobody listens at `remote`.
    fn connect(
        &self,
        local: &str,
        remote: &str,
    ) -> impl Future<Output = Result<Self::Connection, TransportError>> + Send;
}

/// Accepts inbound connections on a claimed address.
///
/// Dropping the listener releases the address.
pub trait Listener: Send + 'static {
    /// The connection type this listener yields.
    type Connection: Connection;

    /// The address this listener claimed. This is the node's identity.
    fn local_address(&self) -> &str;

    /// Waits for and accepts the next inbound connection.
    fn accept(
        &mut self,
    ) -> impl Future<Output = Result<Self::Connection, TransportError>> + Send;
}

/// A single connection that can send and receive messages.
pub trait Connection: Send + Sync + 'static {
    /// Sends one message to the remote peer.
    fn send(
        &self,
        data: &[u8],
    ) -> impl Future<Output = Result<(), TransportError>> + Send;

    /// Receives the next message from the remote peer.
    ///
    /// Returns `Ok(None)` when the connection is cleanly closed.
    fn recv(
        &self,
    ) -> impl Future<Output = Result<Option<Vec<u8>>, TransportError>> + Send;

    /// Closes the connection. Nothing is delivered after this.
    fn close(&self) -> impl Future<Output = Result<(), TransportError>> + Send;

    /// Returns the unique identifier for this end of the connection.
    fn id(&self) -> ConnectionId;

    /// The address of the remote peer (its identity).
    fn remote_address(&self) -> &str;
}

//! In-process transport: every peer in one process shares a
//! [`MemoryNetwork`] and talks over channel pairs.
//!
//! This is the reference adapter. It gives the same guarantees the
//! coordinator relies on from a real network (per-connection ordering,
//! `Ok(None)` on close, address exclusivity) with none of the timing
//! noise, which makes it the backbone of the integration tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::mpsc;

use crate::{Connection, ConnectionId, Listener, Transport, TransportError};

type Registry = Arc<Mutex<HashMap<String, mpsc::UnboundedSender<MemoryConnection>>>>;

enum Frame {
    Data(Vec<u8>),
    Close,
}

/// A shared in-process network. Clones refer to the same network.
#[derive(Clone, Default)]
pub struct MemoryNetwork {
    listeners: Registry,
}

impl MemoryNetwork {
    /// Creates an empty network.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `true` if some live listener currently owns `address`.
    pub fn is_listening(&self, address: &str) -> bool {
        let listeners = self.listeners.lock().unwrap_or_else(PoisonError::into_inner);
        listeners
            .get(address)
            .is_some_and(|tx| !tx.is_closed())
    }

    fn register(&self, address: String) -> Result<MemoryListener, TransportError> {
        let mut listeners = self.listeners.lock().unwrap_or_else(PoisonError::into_inner);
        if listeners.get(&address).is_some_and(|tx| !tx.is_closed()) {
            return Err(TransportError::AddressInUse(address));
        }

        let (tx, rx) = mpsc::unbounded_channel();
        listeners.insert(address.clone(), tx.clone());
        tracing::debug!(%address, "memory listener registered");

        Ok(MemoryListener {
            address,
            incoming: rx,
            own: tx,
            listeners: Arc::clone(&self.listeners),
        })
    }

    fn deliver(&self, remote: &str, conn: MemoryConnection) -> Result<(), TransportError> {
        let listeners = self.listeners.lock().unwrap_or_else(PoisonError::into_inner);
        let tx = listeners
            .get(remote)
            .ok_or_else(|| TransportError::Unreachable(remote.to_string()))?;
        tx.send(conn)
            .map_err(|_| TransportError::Unreachable(remote.to_string()))
    }
}

impl Transport for MemoryNetwork {
    type Connection = MemoryConnection;
    type Listener = MemoryListener;

    async fn listen(&self, address: Option<&str>) -> Result<MemoryListener, TransportError> {
        let address = address
            .map(str::to_owned)
            .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
        self.register(address)
    }

    async fn connect(&self, local: &str, remote: &str) -> Result<MemoryConnection, TransportError> {
        let (ours, theirs) = MemoryConnection::pair(local, remote);
        self.deliver(remote, theirs)?;
        tracing::debug!(%local, %remote, id = %ours.id, "memory connection opened");
        Ok(ours)
    }
}

/// Accepts connections addressed to one [`MemoryNetwork`] address.
pub struct MemoryListener {
    address: String,
    incoming: mpsc::UnboundedReceiver<MemoryConnection>,
    own: mpsc::UnboundedSender<MemoryConnection>,
    listeners: Registry,
}

impl Listener for MemoryListener {
    type Connection = MemoryConnection;

    fn local_address(&self) -> &str {
        &self.address
    }

    async fn accept(&mut self) -> Result<MemoryConnection, TransportError> {
        self.incoming.recv().await.ok_or(TransportError::Shutdown)
    }
}

impl Drop for MemoryListener {
    fn drop(&mut self) {
        let mut listeners = self.listeners.lock().unwrap_or_else(PoisonError::into_inner);
        if listeners
            .get(&self.address)
            .is_some_and(|tx| tx.same_channel(&self.own))
        {
            listeners.remove(&self.address);
            tracing::debug!(address = %self.address, "memory listener released");
        }
    }
}

/// One end of an in-process connection.
pub struct MemoryConnection {
    id: ConnectionId,
    remote: String,
    outbound: mpsc::UnboundedSender<Frame>,
    inbound: tokio::sync::Mutex<mpsc::UnboundedReceiver<Frame>>,
    closed: AtomicBool,
}

impl MemoryConnection {
    /// Builds both ends of a connection between `local` and `remote`.
    /// The first element is `local`'s end.
    fn pair(local: &str, remote: &str) -> (Self, Self) {
        let (a_tx, a_rx) = mpsc::unbounded_channel();
        let (b_tx, b_rx) = mpsc::unbounded_channel();
        let ours = Self {
            id: ConnectionId::next(),
            remote: remote.to_string(),
            outbound: a_tx,
            inbound: tokio::sync::Mutex::new(b_rx),
            closed: AtomicBool::new(false),
        };
        let theirs = Self {
            id: ConnectionId::next(),
            remote: local.to_string(),
            outbound: b_tx,
            inbound: tokio::sync::Mutex::new(a_rx),
            closed: AtomicBool::new(false),
        };
        (ours, theirs)
    }
}

impl Connection for MemoryConnection {
    async fn send(&self, data: &[u8]) -> Result<(), TransportError> {
        if self.closed.load(Ordering::Acquire) {
            return Err(TransportError::ConnectionClosed(self.remote.clone()));
        }
        self.outbound
            .send(Frame::Data(data.to_vec()))
            .map_err(|_| TransportError::ConnectionClosed(self.remote.clone()))
    }

    async fn recv(&self) -> Result<Option<Vec<u8>>, TransportError> {
        if self.closed.load(Ordering::Acquire) {
            return Ok(None);
        }
        let mut inbound = self.inbound.lock().await;
        match inbound.recv().await {
            Some(Frame::Data(data)) => Ok(Some(data)),
            Some(Frame::Close) | None => {
                self.closed.store(true, Ordering::Release);
                Ok(None)
            }
        }
    }

    async fn close(&self) -> Result<(), TransportError> {
        if !self.closed.swap(true, Ordering::AcqRel) {
            // The remote may already be gone; that is a close too.
            let _ = self.outbound.send(Frame::Close);
        }
        Ok(())
    }

    fn id(&self) -> ConnectionId {
        self.id
    }

    fn remote_address(&self) -> &str {
        &self.remote
    }
}

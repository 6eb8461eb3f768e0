//! Accepted connections and their identity.
//!
//! # Responsibilities
//! - Generate unique connection IDs for log correlation
//! - Pair an accepted stream with its peer address
//! - Ensure each accepted connection is consumed exactly once

use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::net::TcpStream;

/// Global atomic counter for connection IDs.
/// Using relaxed ordering is sufficient since we only need uniqueness, not synchronization.
static CONNECTION_ID_COUNTER: AtomicU64 = AtomicU64::new(1);

/// Unique identifier for a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(u64);

impl ConnectionId {
    /// Generate a new unique connection ID.
    pub fn new() -> Self {
        Self(CONNECTION_ID_COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    /// Get the raw ID value.
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// A freshly accepted connection: the byte stream plus who sent it.
///
/// Not `Clone`: it is either closed by the dispatcher or moved into exactly
/// one handler.
#[derive(Debug)]
pub struct AcceptedConnection {
    id: ConnectionId,
    stream: TcpStream,
    peer: SocketAddr,
}

impl AcceptedConnection {
    pub fn new(stream: TcpStream, peer: SocketAddr) -> Self {
        Self {
            id: ConnectionId::new(),
            stream,
            peer,
        }
    }

    pub fn id(&self) -> ConnectionId {
        self.id
    }

    pub fn peer_addr(&self) -> SocketAddr {
        self.peer
    }

    /// Give up the wrapper and take the raw stream.
    pub fn into_stream(self) -> TcpStream {
        self.stream
    }

    /// Close the connection without reading from it.
    pub fn close(self) {
        tracing::trace!(connection_id = %self.id, peer_addr = %self.peer, "Connection closed");
        drop(self.stream);
    }
}

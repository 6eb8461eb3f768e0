//! Error types for the proxy core.

use std::io;
use thiserror::Error;

/// Errors surfaced to callers of [`ProxyServer::start`](crate::server::ProxyServer::start).
///
/// Once the accept loop is running, failures are only reported through the
/// debug sink and [`ProxyServer::is_running`](crate::server::ProxyServer::is_running).
#[derive(Debug, Error)]
pub enum ProxyError {
    /// Port 0 is not a valid listening port.
    #[error("invalid listening port {0}")]
    InvalidPort(u16),

    /// The listening socket could not be bound.
    #[error("failed to bind port {port}: {source}")]
    Bind {
        port: u16,
        #[source]
        source: io::Error,
    },

    /// `start` was called while the server already owns a listener.
    #[error("server is already listening")]
    AlreadyRunning,

    /// The server has been stopped; a closed server never listens again.
    #[error("server has been closed")]
    Closed,

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

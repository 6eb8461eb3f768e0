//! TCP listener with an external close signal.
//!
//! # Responsibilities
//! - Bind the configured port on all IPv4 interfaces
//! - Accept incoming TCP connections, in arrival order
//! - Stop accepting when the paired [`CloseHandle`] fires
//!
//! # Design Decisions
//! - No connection limit: every accepted connection is handed on at once
//! - Closure is reported as `Ok(None)`, distinct from accept I/O errors
//! - Accepting goes through [`AcceptSource`] so any stream of connections
//!   can drive the loop

use std::io;
use std::net::{Ipv4Addr, SocketAddr};

use async_trait::async_trait;
use tokio::net::{TcpListener, TcpStream};

use crate::error::ProxyError;
use crate::lifecycle::shutdown::{close_pair, CloseHandle, CloseSignal};
use crate::net::connection::AcceptedConnection;

/// Something that yields inbound TCP connections.
#[async_trait]
pub trait AcceptSource: Send {
    async fn accept(&mut self) -> io::Result<(TcpStream, SocketAddr)>;
}

#[async_trait]
impl AcceptSource for TcpListener {
    async fn accept(&mut self) -> io::Result<(TcpStream, SocketAddr)> {
        TcpListener::accept(self).await
    }
}

/// The listening socket owned by a running accept loop.
pub struct Listener {
    source: Box<dyn AcceptSource>,
    local_addr: SocketAddr,
    /// Fires when the owner asks the loop to stop.
    close: CloseSignal,
}

impl Listener {
    /// Bind to `0.0.0.0:port`.
    ///
    /// Returns the listener together with the handle that closes it.
    pub async fn bind(port: u16) -> Result<(Self, CloseHandle), ProxyError> {
        if port == 0 {
            return Err(ProxyError::InvalidPort(port));
        }

        let addr = SocketAddr::from((Ipv4Addr::UNSPECIFIED, port));
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|source| ProxyError::Bind { port, source })?;

        let local_addr = listener
            .local_addr()
            .map_err(|source| ProxyError::Bind { port, source })?;

        tracing::info!(address = %local_addr, "Listener bound");
        Ok(Self::from_source(listener, local_addr))
    }

    /// Wrap an already listening source.
    pub fn from_source<S>(source: S, local_addr: SocketAddr) -> (Self, CloseHandle)
    where
        S: AcceptSource + 'static,
    {
        let (handle, signal) = close_pair();
        (
            Self {
                source: Box::new(source),
                local_addr,
                close: signal,
            },
            handle,
        )
    }

    /// Wait for the next connection.
    ///
    /// Returns `Ok(None)` once closure has been requested; a close request
    /// wins over a connection that is ready at the same moment.
    pub async fn accept(&mut self) -> Result<Option<AcceptedConnection>, io::Error> {
        tokio::select! {
            biased;
            _ = self.close.closed() => Ok(None),
            accepted = self.source.accept() => {
                let (stream, peer_addr) = accepted?;
                tracing::debug!(peer_addr = %peer_addr, "Connection accepted");
                Ok(Some(AcceptedConnection::new(stream, peer_addr)))
            }
        }
    }

    /// Get the local address this listener is bound to.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio::net::TcpStream;

    #[tokio::test]
    async fn rejects_port_zero() {
        let err = Listener::bind(0).await.err().expect("port 0 accepted");
        assert!(matches!(err, ProxyError::InvalidPort(0)));
    }

    #[tokio::test]
    async fn port_in_use_is_bind_error() {
        let (_first, _handle) = Listener::bind(28411).await.expect("bind failed");
        let err = Listener::bind(28411).await.err().expect("second bind succeeded");
        assert!(matches!(err, ProxyError::Bind { port: 28411, .. }));
    }

    #[tokio::test]
    async fn accepts_connection() {
        let (mut listener, _handle) = Listener::bind(28412).await.expect("bind failed");
        assert_eq!(listener.local_addr().port(), 28412);

        let client = tokio::spawn(TcpStream::connect("127.0.0.1:28412"));
        let conn = listener
            .accept()
            .await
            .expect("accept failed")
            .expect("listener closed");
        assert!(conn.peer_addr().ip().is_loopback());
        client.await.unwrap().expect("connect failed");
    }

    #[tokio::test]
    async fn close_unblocks_accept() {
        let (mut listener, handle) = Listener::bind(28413).await.expect("bind failed");

        let waiter = tokio::spawn(async move { listener.accept().await });
        tokio::time::sleep(Duration::from_millis(50)).await;
        handle.close().expect("close failed");

        let outcome = tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .expect("accept still blocked")
            .unwrap()
            .expect("accept errored");
        assert!(outcome.is_none());
    }

    struct Failing;

    #[async_trait]
    impl AcceptSource for Failing {
        async fn accept(&mut self) -> io::Result<(TcpStream, SocketAddr)> {
            Err(io::Error::new(io::ErrorKind::Other, "too many open files"))
        }
    }

    #[tokio::test]
    async fn source_errors_surface_from_accept() {
        let addr = SocketAddr::from((Ipv4Addr::LOCALHOST, 9));
        let (mut listener, _handle) = Listener::from_source(Failing, addr);
        assert_eq!(listener.local_addr(), addr);

        let err = listener.accept().await.err().expect("accept succeeded");
        assert_eq!(err.to_string(), "too many open files");
    }
}

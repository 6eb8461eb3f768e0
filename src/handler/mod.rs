//! Per-connection handler contract.
//!
//! # Data Flow
//! ```text
//! Dispatcher admits a connection
//!     → HandlerSpawnRecord::new(server, connection, forward host, forward port)
//!     → set_debug(level, destination) / set_timeout(timeout)
//!     → HandlerLauncher::launch(record)   (returns immediately)
//!         → SpawnLauncher: tokio::spawn(handler.handle(record))
//! ```
//!
//! # Design Decisions
//! - Fire-and-forget: the dispatcher never awaits, tracks or cancels a handler
//! - No worker pool and no bound on concurrent handlers
//! - Config is captured in the record, so later `set_debug` calls on the
//!   server never reach a handler that is already running

pub mod content;

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::net::{AcceptedConnection, ConnectionId};
use crate::observability::{DebugSink, LogSink};
use crate::server::{ForwardTarget, ProxyServer, DEFAULT_TIMEOUT};

pub use content::{ContentProvider, Direction, SharedContentProvider};

/// Everything a handler receives, captured at the moment of admission.
pub struct HandlerSpawnRecord {
    server: ProxyServer,
    connection: AcceptedConnection,
    forward: ForwardTarget,
    timeout: Duration,
    debug: DebugSink,
    content_provider: Option<SharedContentProvider>,
}

impl HandlerSpawnRecord {
    /// Build a record with the default timeout and a quiet debug sink.
    pub fn new(
        server: ProxyServer,
        connection: AcceptedConnection,
        forward_host: impl Into<String>,
        forward_port: u16,
    ) -> Self {
        Self {
            server,
            connection,
            forward: ForwardTarget::new(forward_host, forward_port),
            timeout: DEFAULT_TIMEOUT,
            debug: DebugSink::default(),
            content_provider: None,
        }
    }

    pub fn set_debug(&mut self, level: u32, destination: Arc<dyn LogSink>) {
        self.debug = DebugSink::new(level, destination);
    }

    pub fn set_timeout(&mut self, timeout: Duration) {
        self.timeout = timeout;
    }

    pub fn set_content_provider(&mut self, provider: Option<SharedContentProvider>) {
        self.content_provider = provider;
    }

    /// The server that accepted this connection.
    pub fn server(&self) -> &ProxyServer {
        &self.server
    }

    pub fn connection(&self) -> &AcceptedConnection {
        &self.connection
    }

    pub fn connection_id(&self) -> ConnectionId {
        self.connection.id()
    }

    pub fn forward(&self) -> &ForwardTarget {
        &self.forward
    }

    pub fn forward_host(&self) -> &str {
        self.forward.host()
    }

    pub fn forward_port(&self) -> u16 {
        self.forward.port()
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn debug(&self) -> &DebugSink {
        &self.debug
    }

    pub fn content_provider(&self) -> Option<&SharedContentProvider> {
        self.content_provider.as_ref()
    }

    /// Take ownership of the connection, ending the record.
    pub fn into_connection(self) -> AcceptedConnection {
        self.connection
    }
}

impl fmt::Debug for HandlerSpawnRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandlerSpawnRecord")
            .field("connection", &self.connection.id())
            .field("peer_addr", &self.connection.peer_addr())
            .field("forward", &self.forward)
            .field("timeout", &self.timeout)
            .field("debug", &self.debug)
            .field("content_provider", &self.content_provider.is_some())
            .finish()
    }
}

/// Starts independent execution of a handler for one connection.
///
/// Implementations must return without waiting for the handler.
pub trait HandlerLauncher: Send + Sync + 'static {
    fn launch(&self, record: HandlerSpawnRecord);
}

/// The protocol work performed for a single admitted connection.
#[async_trait]
pub trait ConnectionHandler: Send + Sync + 'static {
    async fn handle(&self, record: HandlerSpawnRecord);
}

/// Launches each handler on its own Tokio task.
pub struct SpawnLauncher<H> {
    handler: Arc<H>,
}

impl<H: ConnectionHandler> SpawnLauncher<H> {
    pub fn new(handler: H) -> Self {
        Self {
            handler: Arc::new(handler),
        }
    }
}

impl<H: ConnectionHandler> HandlerLauncher for SpawnLauncher<H> {
    fn launch(&self, record: HandlerSpawnRecord) {
        let handler = Arc::clone(&self.handler);
        let connection_id = record.connection_id();
        tracing::trace!(connection_id = %connection_id, "Spawning handler");
        // Detached; the JoinHandle is dropped.
        tokio::spawn(async move {
            handler.handle(record).await;
        });
    }
}

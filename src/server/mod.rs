//! Proxy server lifecycle.
//!
//! # Responsibilities
//! - Own at most one listening socket per server instance
//! - Track state: Created → Listening → Closed (terminal)
//! - Run the accept loop on the caller's task (`start`)
//! - Close the listener from any task (`stop`) and always clean up
//! - Hold the mutable debug sink and interception hook
//!
//! # Design Decisions
//! - `start` never spawns its own task; callers choose where it runs
//! - Debug sink and hook live in `ArcSwap` cells and are snapshotted once per
//!   admitted connection, so concurrent `set_debug` calls never tear
//! - Handlers are abandoned on stop: they keep running until they finish

mod config;
mod dispatch;

use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use arc_swap::{ArcSwap, ArcSwapOption};

use crate::error::ProxyError;
use crate::handler::{HandlerLauncher, SharedContentProvider, SpawnLauncher};
use crate::lifecycle::shutdown::CloseHandle;
use crate::net::Listener;
use crate::observability::{DebugSink, LogLevel, LogSink};
use crate::relay::RelayHandler;

pub use config::{ForwardTarget, ServerConfig, DEFAULT_PORT, DEFAULT_TIMEOUT};

/// Lifecycle state of a server.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerState {
    /// Constructed, never bound.
    Created,
    /// Owns a listening socket.
    Listening,
    /// Stopped. A closed server never listens again.
    Closed,
}

struct Lifecycle {
    state: ServerState,
    listening: Option<CloseHandle>,
}

struct Shared {
    config: ServerConfig,
    debug: ArcSwap<DebugSink>,
    content_provider: ArcSwapOption<SharedContentProvider>,
    lifecycle: Mutex<Lifecycle>,
    launcher: Arc<dyn HandlerLauncher>,
}

/// A localhost-only forwarding proxy.
///
/// Cloning is cheap and every clone refers to the same server; handlers
/// receive one as their owning-server reference.
#[derive(Clone)]
pub struct ProxyServer {
    shared: Arc<Shared>,
}

impl ProxyServer {
    /// Create a server that relays connections with [`RelayHandler`].
    pub fn new(config: ServerConfig) -> Self {
        Self::with_launcher(config, Arc::new(SpawnLauncher::new(RelayHandler::new())))
    }

    /// Create a server that hands admitted connections to `launcher`.
    pub fn with_launcher(config: ServerConfig, launcher: Arc<dyn HandlerLauncher>) -> Self {
        Self {
            shared: Arc::new(Shared {
                config,
                debug: ArcSwap::from_pointee(DebugSink::default()),
                content_provider: ArcSwapOption::empty(),
                lifecycle: Mutex::new(Lifecycle {
                    state: ServerState::Created,
                    listening: None,
                }),
                launcher,
            }),
        }
    }

    /// Bind the configured port and run the accept loop until stopped.
    ///
    /// Runs on the calling task and only returns once the loop has ended and
    /// cleanup has run. Fails without listening if the port cannot be bound
    /// or the server was already started or closed.
    pub async fn start(&self) -> Result<(), ProxyError> {
        self.ensure_startable()?;

        let (listener, handle) = match Listener::bind(self.port()).await {
            Ok(bound) => bound,
            Err(e) => {
                self.debug_sink()
                    .log_at(1, LogLevel::Error, &format!("Proxy failed to start: {}", e));
                return Err(e);
            }
        };
        self.serve(listener, handle).await
    }

    /// Run the accept loop on an already bound listener.
    ///
    /// `handle` must be the one paired with `listener`; it becomes the
    /// server's listening resource until the loop ends.
    pub async fn serve(
        &self,
        mut listener: Listener,
        handle: CloseHandle,
    ) -> Result<(), ProxyError> {
        self.install(handle)?;

        let port = self.port();
        self.debug_sink()
            .log_at(1, LogLevel::Info, &format!("Started proxy on port {}", port));
        tracing::info!(
            port,
            address = %listener.local_addr(),
            forward = %self.shared.config.forward,
            timeout_secs = self.shared.config.timeout.as_secs(),
            "Proxy listening"
        );

        self.accept_loop(&mut listener).await;

        // Release while the listener still exists so the close signal lands.
        self.release_listener();
        drop(listener);
        tracing::info!(port, "Proxy stopped");
        Ok(())
    }

    /// Close the listening socket, if any, and mark the server closed.
    ///
    /// Never fails: close errors are only reported through the debug sink.
    /// Handlers already running are left alone.
    pub fn stop(&self) {
        self.release_listener();
    }

    /// Alias of [`stop`](Self::stop).
    pub fn close_socket(&self) {
        self.stop();
    }

    /// Point-in-time check of whether a listener is currently owned.
    pub fn is_running(&self) -> bool {
        self.lifecycle().listening.is_some()
    }

    pub fn state(&self) -> ServerState {
        self.lifecycle().state
    }

    pub fn port(&self) -> u16 {
        self.shared.config.port
    }

    pub fn config(&self) -> &ServerConfig {
        &self.shared.config
    }

    pub fn forward(&self) -> &ForwardTarget {
        &self.shared.config.forward
    }

    pub fn timeout(&self) -> Duration {
        self.shared.config.timeout
    }

    /// Replace the debug sink. Only connections admitted afterwards see it.
    pub fn set_debug(&self, level: u32, destination: Arc<dyn LogSink>) {
        self.shared
            .debug
            .store(Arc::new(DebugSink::new(level, destination)));
    }

    /// Snapshot of the current debug sink.
    pub fn debug_sink(&self) -> DebugSink {
        DebugSink::clone(&self.shared.debug.load())
    }

    /// Attach (`Some`) or detach (`None`) the interception hook.
    pub fn set_content_provider(&self, provider: Option<SharedContentProvider>) {
        self.shared.content_provider.store(provider.map(Arc::new));
    }

    pub fn content_provider(&self) -> Option<SharedContentProvider> {
        self.shared
            .content_provider
            .load_full()
            .map(|provider| SharedContentProvider::clone(&provider))
    }

    fn lifecycle(&self) -> MutexGuard<'_, Lifecycle> {
        self.shared
            .lifecycle
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn ensure_startable(&self) -> Result<(), ProxyError> {
        match self.lifecycle().state {
            ServerState::Created => Ok(()),
            ServerState::Listening => Err(ProxyError::AlreadyRunning),
            ServerState::Closed => Err(ProxyError::Closed),
        }
    }

    /// Record a freshly bound listener, unless another task got there first
    /// or the server was stopped while binding.
    fn install(&self, handle: CloseHandle) -> Result<(), ProxyError> {
        let mut lifecycle = self.lifecycle();
        match lifecycle.state {
            ServerState::Created => {
                lifecycle.state = ServerState::Listening;
                lifecycle.listening = Some(handle);
                Ok(())
            }
            ServerState::Listening => Err(ProxyError::AlreadyRunning),
            ServerState::Closed => Err(ProxyError::Closed),
        }
    }

    fn release_listener(&self) {
        let handle = {
            let mut lifecycle = self.lifecycle();
            lifecycle.state = ServerState::Closed;
            lifecycle.listening.take()
        };

        if let Some(handle) = handle {
            if let Err(e) = handle.close() {
                self.debug_sink().log_at(
                    1,
                    LogLevel::Error,
                    &format!("Error closing listener on port {}: {}", self.port(), e),
                );
            }
        }
    }
}

impl fmt::Debug for ProxyServer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProxyServer")
            .field("config", &self.shared.config)
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

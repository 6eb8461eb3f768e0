//! Reference connection handler.
//!
//! # Data Flow
//! ```text
//! Forward mode (upstream proxy configured):
//!     client ⇄ tunnel ⇄ upstream proxy           (bytes untouched)
//!
//! Direct mode:
//!     read request head
//!         → CONNECT host:port   → "200 Connection established" → tunnel
//!         → GET http://host/... → rewrite to origin form → tunnel
//!         → anything else       → 400
//!     unreachable destination   → 502
//! ```
//!
//! # Design Decisions
//! - The idle timeout comes from the spawn record, never from the handler
//! - Every relayed chunk goes through the attached content provider
//! - Failures stay inside the task; they are logged, never returned

pub mod request;
pub mod tunnel;

use std::io;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;

use crate::handler::{ConnectionHandler, Direction, HandlerSpawnRecord};
use crate::observability::LogLevel;

pub use request::{Destination, RequestError, RequestHead};
pub use tunnel::{tunnel, RelayStats};

/// Default bound on establishing an outbound connection.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Error)]
pub enum RelayError {
    #[error(transparent)]
    Request(#[from] RequestError),

    #[error("cannot reach {authority}: {source}")]
    Connect {
        authority: String,
        #[source]
        source: io::Error,
    },

    #[error("relay I/O error: {0}")]
    Io(#[from] io::Error),
}

/// Relays one client connection, directly or through the forward target.
#[derive(Debug, Clone)]
pub struct RelayHandler {
    connect_timeout: Duration,
}

impl RelayHandler {
    pub fn new() -> Self {
        Self {
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
        }
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    async fn connect(&self, authority: &str) -> Result<TcpStream, RelayError> {
        let connected = tokio::time::timeout(self.connect_timeout, TcpStream::connect(authority))
            .await
            .unwrap_or_else(|_| Err(io::Error::new(io::ErrorKind::TimedOut, "connect timed out")));
        connected.map_err(|source| RelayError::Connect {
            authority: authority.to_string(),
            source,
        })
    }

    async fn relay(&self, record: HandlerSpawnRecord) -> Result<RelayStats, RelayError> {
        let forward = record.forward().clone();
        let idle = record.timeout();
        let provider = record.content_provider().cloned();
        let debug = record.debug().clone();
        let id = record.connection_id();
        let mut client = record.into_connection().into_stream();

        if !forward.is_direct() {
            let authority = format!("{}:{}", forward.host(), forward.port());
            debug.log_at(2, LogLevel::Debug, &format!("{} chained through {}", id, authority));
            let upstream = match self.connect(&authority).await {
                Ok(stream) => stream,
                Err(e) => {
                    respond(&mut client, "502 Bad Gateway").await;
                    return Err(e);
                }
            };
            return Ok(tunnel(client, upstream, idle, provider).await?);
        }

        let (request, rest) = match request::read_head(&mut client, idle).await {
            Ok(read) => read,
            Err(e) => {
                if e.is_client_error() {
                    respond(&mut client, "400 Bad Request").await;
                }
                return Err(e.into());
            }
        };

        let destination = match request.destination() {
            Ok(destination) => destination,
            Err(e) => {
                respond(&mut client, "400 Bad Request").await;
                return Err(e.into());
            }
        };

        debug.log_at(
            2,
            LogLevel::Debug,
            &format!("{} {} {}", id, request.method, request.target),
        );

        let mut upstream = match self.connect(destination.authority()).await {
            Ok(stream) => stream,
            Err(e) => {
                respond(&mut client, "502 Bad Gateway").await;
                return Err(e);
            }
        };

        let mut stats = RelayStats::default();
        let initial = match &destination {
            Destination::Tunnel { .. } => {
                client
                    .write_all(b"HTTP/1.1 200 Connection established\r\n\r\n")
                    .await?;
                rest
            }
            Destination::Forward { path, .. } => {
                let mut initial = request.to_origin_form(path);
                initial.extend_from_slice(&rest);
                initial
            }
        };
        if !initial.is_empty() {
            stats.outbound +=
                tunnel::write_filtered(
                    &mut upstream,
                    Direction::Outbound,
                    &initial,
                    provider.as_ref(),
                )
                .await?;
        }

        let relayed = tunnel(client, upstream, idle, provider).await?;
        stats.outbound += relayed.outbound;
        stats.inbound += relayed.inbound;
        Ok(stats)
    }
}

impl Default for RelayHandler {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ConnectionHandler for RelayHandler {
    async fn handle(&self, record: HandlerSpawnRecord) {
        let id = record.connection_id();
        let peer_addr = record.connection().peer_addr();
        let debug = record.debug().clone();

        match self.relay(record).await {
            Ok(stats) => debug.log_at(
                2,
                LogLevel::Debug,
                &format!(
                    "{} finished: {} bytes out, {} bytes in",
                    id, stats.outbound, stats.inbound
                ),
            ),
            Err(e) => debug.log_at(
                1,
                LogLevel::Warn,
                &format!("{} from {} failed: {}", id, peer_addr, e),
            ),
        }
    }
}

/// Send a bodiless status response and close the client's write side.
async fn respond(client: &mut TcpStream, status: &str) {
    let response = format!(
        "HTTP/1.1 {}\r\nContent-Length: 0\r\nConnection: close\r\n\r\n",
        status
    );
    let _ = client.write_all(response.as_bytes()).await;
    let _ = client.shutdown().await;
}

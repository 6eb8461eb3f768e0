//! Localhost-only forwarding proxy.
//!
//! A [`ProxyServer`] listens on one port, admits connections only from
//! loopback or any-local peers, and launches an independent handler task for
//! each admitted connection, optionally chaining through an upstream proxy.

pub mod config;
pub mod error;
pub mod handler;
pub mod lifecycle;
pub mod net;
pub mod observability;
pub mod relay;
pub mod security;
pub mod server;

pub use config::ProxyConfig;
pub use error::ProxyError;
pub use handler::{
    ConnectionHandler, ContentProvider, HandlerLauncher, HandlerSpawnRecord, SpawnLauncher,
};
pub use relay::RelayHandler;
pub use server::{ForwardTarget, ProxyServer, ServerConfig, ServerState};

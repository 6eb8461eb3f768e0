//! Construction values for a [`ProxyServer`](super::ProxyServer).

use std::fmt;
use std::time::Duration;

use crate::config::ProxyConfig;

/// Port used when none is configured.
pub const DEFAULT_PORT: u16 = 8080;

/// Per-connection idle timeout used when none is configured.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(20);

/// Optional upstream proxy that relayed traffic is chained through.
///
/// An empty host or a zero port means direct mode.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ForwardTarget {
    host: String,
    port: u16,
}

impl ForwardTarget {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }

    /// No upstream: handlers connect to the final destination themselves.
    pub fn direct() -> Self {
        Self::default()
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn is_direct(&self) -> bool {
        self.host.is_empty() || self.port == 0
    }
}

impl fmt::Display for ForwardTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_direct() {
            f.write_str("direct")
        } else {
            write!(f, "{}:{}", self.host, self.port)
        }
    }
}

/// Immutable part of a server's configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    pub port: u16,
    pub forward: ForwardTarget,
    pub timeout: Duration,
}

impl ServerConfig {
    /// Direct mode with the default timeout.
    pub fn new(port: u16) -> Self {
        Self {
            port,
            forward: ForwardTarget::direct(),
            timeout: DEFAULT_TIMEOUT,
        }
    }

    pub fn with_forward(mut self, host: impl Into<String>, port: u16) -> Self {
        self.forward = ForwardTarget::new(host, port);
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self::new(DEFAULT_PORT)
    }
}

impl From<&ProxyConfig> for ServerConfig {
    fn from(config: &ProxyConfig) -> Self {
        Self::new(config.listener.port)
            .with_forward(config.forward.host.clone(), config.forward.port)
            .with_timeout(Duration::from_secs(config.timeouts.idle_secs))
    }
}

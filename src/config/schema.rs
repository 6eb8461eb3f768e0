//! Configuration schema definitions.
//!
//! All types derive Serde traits for deserialization from TOML files, and
//! every field has a default so an empty file is a valid configuration.

use serde::{Deserialize, Serialize};

use crate::observability::DebugDestination;

/// Root configuration for the proxy.
#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq)]
#[serde(default)]
pub struct ProxyConfig {
    /// Listening port.
    pub listener: ListenerConfig,

    /// Optional upstream proxy.
    pub forward: ForwardConfig,

    /// Per-connection timeouts handed to handlers.
    pub timeouts: TimeoutConfig,

    /// Logging and debug-sink settings.
    pub observability: ObservabilityConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct ListenerConfig {
    /// Port to listen on, on all IPv4 interfaces.
    pub port: u16,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self { port: 8080 }
    }
}

/// Upstream proxy. Leave both fields unset for direct mode.
#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq)]
#[serde(default)]
pub struct ForwardConfig {
    pub host: String,
    pub port: u16,
}

impl ForwardConfig {
    pub fn is_direct(&self) -> bool {
        self.host.is_empty() && self.port == 0
    }
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Idle connection timeout in seconds.
    pub idle_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self { idle_secs: 20 }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Debug-sink verbosity: 0 quiet, 1 lifecycle, 2 per-connection.
    pub debug_level: u32,

    /// Where debug-sink output goes.
    pub debug_destination: DebugDestination,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            debug_level: 0,
            debug_destination: DebugDestination::Tracing,
        }
    }
}

//! Command-line values layered over a configuration file.

use crate::config::schema::ProxyConfig;

/// Values given on the command line. Each one that is set wins over the
/// file, both at startup and on every reload.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfigOverrides {
    pub port: Option<u16>,
    pub forward: Option<(String, u16)>,
    pub idle_secs: Option<u64>,
    pub debug_level: Option<u32>,
}

impl ConfigOverrides {
    /// Overwrite the fields of `config` that were given on the command line.
    pub fn apply(&self, config: &mut ProxyConfig) {
        if let Some(port) = self.port {
            config.listener.port = port;
        }
        if let Some((host, port)) = &self.forward {
            config.forward.host = host.clone();
            config.forward.port = *port;
        }
        if let Some(idle_secs) = self.idle_secs {
            config.timeouts.idle_secs = idle_secs;
        }
        if let Some(level) = self.debug_level {
            config.observability.debug_level = level;
        }
    }

    /// `apply` on an owned value.
    pub fn applied_to(&self, mut config: ProxyConfig) -> ProxyConfig {
        self.apply(&mut config);
        config
    }
}

//! Applying a reloaded configuration to a running server.

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::config::{ConfigOverrides, ProxyConfig};
use crate::server::{ProxyServer, ServerConfig};

/// Apply every configuration received on `updates`, with the command-line
/// `overrides` layered on top, until the sender goes away.
pub fn spawn_reloader(
    server: ProxyServer,
    mut updates: mpsc::UnboundedReceiver<ProxyConfig>,
    overrides: ConfigOverrides,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(reloaded) = updates.recv().await {
            apply_reload(&server, &overrides.applied_to(reloaded));
        }
    })
}

/// Apply the mutable part of `config` to `server`.
///
/// The debug level and destination take effect for connections admitted
/// from now on. Returns `false` when the file also changed settings that are
/// fixed for the server's lifetime (port, forward target, timeout); those
/// changes are logged and ignored.
pub fn apply_reload(server: &ProxyServer, config: &ProxyConfig) -> bool {
    let observability = &config.observability;
    server.set_debug(
        observability.debug_level,
        observability.debug_destination.into_sink(),
    );
    tracing::info!(
        debug_level = observability.debug_level,
        destination = ?observability.debug_destination,
        "Debug settings reloaded"
    );

    let requested = ServerConfig::from(config);
    if &requested != server.config() {
        tracing::warn!(
            current_port = server.port(),
            requested_port = requested.port,
            requested_forward = %requested.forward,
            "Listener, forward and timeout changes need a restart; ignoring them"
        );
        return false;
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handler::{HandlerLauncher, HandlerSpawnRecord};
    use std::sync::Arc;

    struct NoopLauncher;

    impl HandlerLauncher for NoopLauncher {
        fn launch(&self, _record: HandlerSpawnRecord) {}
    }

    fn server_for(config: &ProxyConfig) -> ProxyServer {
        ProxyServer::with_launcher(ServerConfig::from(config), Arc::new(NoopLauncher))
    }

    #[test]
    fn debug_level_is_applied() {
        let mut config = ProxyConfig::default();
        let server = server_for(&config);

        config.observability.debug_level = 2;
        assert!(apply_reload(&server, &config));
        assert_eq!(server.debug_sink().level(), 2);
    }

    #[test]
    fn fixed_settings_are_ignored() {
        let mut config = ProxyConfig::default();
        let server = server_for(&config);

        config.listener.port = 9999;
        config.observability.debug_level = 1;
        assert!(!apply_reload(&server, &config));
        assert_eq!(server.port(), 8080);
        assert_eq!(server.debug_sink().level(), 1);
    }

    fn command_line() -> ConfigOverrides {
        ConfigOverrides {
            port: Some(9090),
            debug_level: Some(2),
            ..Default::default()
        }
    }

    #[test]
    fn overrides_survive_a_reload() {
        let file = ProxyConfig::default();
        let overrides = command_line();
        let server = server_for(&overrides.applied_to(file.clone()));
        server.set_debug(2, Arc::new(crate::observability::MemorySink::new()));

        // The file still says port 8080 and debug 0.
        assert!(apply_reload(&server, &overrides.applied_to(file)));
        assert_eq!(server.port(), 9090);
        assert_eq!(server.debug_sink().level(), 2);
    }

    #[tokio::test]
    async fn reloader_layers_overrides_on_each_update() {
        let overrides = command_line();
        let server = server_for(&overrides.applied_to(ProxyConfig::default()));

        let (tx, rx) = mpsc::unbounded_channel();
        let task = spawn_reloader(server.clone(), rx, overrides);

        let mut file = ProxyConfig::default();
        file.observability.debug_level = 0;
        file.timeouts.idle_secs = 20;
        tx.send(file).unwrap();
        drop(tx);
        task.await.unwrap();

        assert_eq!(server.debug_sink().level(), 2);
        assert_eq!(server.port(), 9090);
    }
}

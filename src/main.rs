//! loopback-proxy
//!
//! A forwarding proxy that only serves the local machine.
//!
//! # Architecture Overview
//!
//! ```text
//!                       ┌──────────────────────────────────────────────┐
//!                       │                 LOOPBACK PROXY               │
//!                       │                                              │
//!   local client ───────┼─▶ net::Listener ─▶ server::dispatch          │
//!                       │                      │                       │
//!   foreign client ─────┼─▶ (closed) ◀─────────┤ security::             │
//!                       │                      │ address_policy        │
//!                       │                      ▼                       │
//!                       │              handler::HandlerLauncher        │
//!                       │                      │  (one task each)      │
//!                       │                      ▼                       │
//!                       │              relay::RelayHandler ────────────┼──▶ upstream proxy
//!                       │                                              │    or destination
//!                       │  ┌────────────────────────────────────────┐  │
//!                       │  │ config · observability · lifecycle     │  │
//!                       │  └────────────────────────────────────────┘  │
//!                       └──────────────────────────────────────────────┘
//! ```
//!
//! Usage: `loopback-proxy <port> [<forward host> <forward port>]`

use std::path::PathBuf;

use clap::{CommandFactory, Parser};

use loopback_proxy::config::{
    self, validation::validate_config, watcher::ConfigWatcher, ConfigOverrides, ProxyConfig,
};
use loopback_proxy::lifecycle::{spawn_reloader, stop_on_signal};
use loopback_proxy::observability::logging::init_tracing;
use loopback_proxy::server::{ProxyServer, ServerConfig};

#[derive(Parser, Debug)]
#[command(name = "loopback-proxy")]
#[command(
    about = "Forwarding proxy that only accepts connections from this machine",
    long_about = None
)]
struct Cli {
    /// The port this service listens on
    port: Option<u16>,

    /// Optional proxy server to forward requests to
    #[arg(requires = "forward_port")]
    forward_host: Option<String>,

    /// The port that the optional proxy server is on
    forward_port: Option<u16>,

    /// TOML configuration file; command-line values override it
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Per-connection idle timeout in seconds
    #[arg(short, long)]
    timeout: Option<u64>,

    /// Debug verbosity: 0 quiet, 1 lifecycle, 2 per-connection
    #[arg(short, long)]
    debug: Option<u32>,
}

impl Cli {
    /// Values given on the command line, applied over the file.
    fn overrides(&self) -> ConfigOverrides {
        ConfigOverrides {
            port: self.port,
            forward: self.forward_host.clone().zip(self.forward_port),
            idle_secs: self.timeout,
            debug_level: self.debug,
        }
    }

    fn resolve(&self) -> Result<ProxyConfig, Box<dyn std::error::Error>> {
        let mut config = match &self.config {
            Some(path) => config::load_config(path)?,
            None => {
                let mut config = ProxyConfig::default();
                config.observability.debug_level = 1;
                config
            }
        };
        self.overrides().apply(&mut config);

        validate_config(&config).map_err(config::ConfigError::Validation)?;
        Ok(config)
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    if cli.port.is_none() && cli.config.is_none() {
        eprintln!("{}", Cli::command().render_help());
        return Ok(());
    }

    let config = cli.resolve()?;
    init_tracing(&format!("loopback_proxy={}", config.observability.log_level));

    tracing::info!(
        port = config.listener.port,
        forward_host = %config.forward.host,
        forward_port = config.forward.port,
        idle_secs = config.timeouts.idle_secs,
        "Configuration loaded"
    );

    let server = ProxyServer::new(ServerConfig::from(&config));
    server.set_debug(
        config.observability.debug_level,
        config.observability.debug_destination.into_sink(),
    );

    let _watcher = match &cli.config {
        Some(path) => {
            let (watcher, updates) = ConfigWatcher::new(path);
            let watcher = watcher.run()?;
            spawn_reloader(server.clone(), updates, cli.overrides());
            Some(watcher)
        }
        None => None,
    };

    let _signals = stop_on_signal(server.clone());

    tracing::info!(port = server.port(), "Starting proxy. Press Ctrl-C to end.");
    server.start().await?;

    tracing::info!("Shutdown complete");
    Ok(())
}

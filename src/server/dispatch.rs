//! Accept loop and connection admission.

use crate::handler::HandlerSpawnRecord;
use crate::net::{AcceptedConnection, Listener};
use crate::observability::LogLevel;
use crate::security::is_admissible_peer;

use super::ProxyServer;

impl ProxyServer {
    /// Accept until the listener is closed or an accept call fails.
    ///
    /// A rejected peer never ends the loop; any accept error does.
    pub(super) async fn accept_loop(&self, listener: &mut Listener) {
        loop {
            match listener.accept().await {
                Ok(Some(connection)) => self.dispatch(connection),
                Ok(None) => {
                    tracing::debug!(port = self.port(), "Listener closed");
                    break;
                }
                Err(e) => {
                    self.debug_sink().log_at(
                        1,
                        LogLevel::Error,
                        &format!("Proxy accept error on port {}: {}", self.port(), e),
                    );
                    break;
                }
            }
        }
    }

    /// Admit or reject one connection. Returns without waiting on the handler.
    pub(crate) fn dispatch(&self, connection: AcceptedConnection) {
        let debug = self.debug_sink();
        let peer_addr = connection.peer_addr();

        if !is_admissible_peer(&peer_addr) {
            debug.log(
                LogLevel::Warn,
                &format!("Proxy connection attempt from foreign host {} ignored", peer_addr),
            );
            connection.close();
            return;
        }

        debug.log_at(
            2,
            LogLevel::Debug,
            &format!("{} accepted from {}", connection.id(), peer_addr),
        );

        let forward = self.forward();
        let mut record =
            HandlerSpawnRecord::new(self.clone(), connection, forward.host(), forward.port());
        record.set_debug(debug.level(), debug.destination());
        record.set_timeout(self.timeout());
        record.set_content_provider(self.content_provider());

        self.shared.launcher.launch(record);
    }
}

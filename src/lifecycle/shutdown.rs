//! Close coordination for the listening socket.

use std::io;
use tokio::sync::broadcast;

/// Create a connected handle/signal pair.
///
/// The signal side lives inside the accept loop; the handle side is stored
/// by the server so `stop()` can wake the loop from another task.
pub fn close_pair() -> (CloseHandle, CloseSignal) {
    let (tx, rx) = broadcast::channel(1);
    (CloseHandle { tx }, CloseSignal { rx })
}

/// Requests closure of a listening socket.
#[derive(Debug, Clone)]
pub struct CloseHandle {
    tx: broadcast::Sender<()>,
}

impl CloseHandle {
    /// Wake the accept loop so it drops its listener.
    ///
    /// Fails if the loop has already released the listener.
    pub fn close(&self) -> io::Result<()> {
        self.tx.send(()).map(|_| ()).map_err(|_| {
            io::Error::new(io::ErrorKind::NotConnected, "listener already released")
        })
    }

    /// Number of accept loops still waiting on this handle.
    pub fn receiver_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

/// The accept loop's side of the pair.
#[derive(Debug)]
pub struct CloseSignal {
    rx: broadcast::Receiver<()>,
}

impl CloseSignal {
    /// Resolves when closure is requested or every handle is gone.
    pub async fn closed(&mut self) {
        let _ = self.rx.recv().await;
    }
}

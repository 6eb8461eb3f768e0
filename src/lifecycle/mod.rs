//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Stop (shutdown.rs):
//!     stop() → CloseHandle::close → accept loop wakes → cleanup
//!
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → stop()
//!
//! Reload (reload.rs):
//!     config file change → CLI overrides re-applied
//!         → set_debug() for future connections
//! ```
//!
//! # Design Decisions
//! - Stop closes the listener only; in-flight handlers run to completion
//! - Nothing waits for handlers on shutdown (no drain)

pub mod reload;
pub mod shutdown;
pub mod signals;

pub use reload::{apply_reload, spawn_reloader};
pub use shutdown::{close_pair, CloseHandle, CloseSignal};
pub use signals::{shutdown_signal, stop_on_signal};

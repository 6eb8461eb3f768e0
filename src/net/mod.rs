//! Network layer subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming TCP connection
//!     → listener.rs (accept loop side, close signal)
//!     → connection.rs (stream + peer address + connection id)
//!     → Hand off to the server's dispatcher
//! ```
//!
//! # Design Decisions
//! - Unbounded: no semaphore, no accept queue beyond the kernel backlog
//! - Closing the listener is the only way to interrupt a pending accept

pub mod connection;
pub mod listener;

pub use connection::{AcceptedConnection, ConnectionId};
pub use listener::{AcceptSource, Listener};

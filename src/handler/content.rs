//! Interception hook for relayed content.
//!
//! The server only stores a provider and hands it to each handler at spawn
//! time. Whether and how a provider is invoked is up to the handler.

use std::fmt;
use std::sync::Arc;

/// Which way a chunk is travelling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    /// Client → upstream.
    Outbound,
    /// Upstream → client.
    Inbound,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Outbound => f.write_str("outbound"),
            Direction::Inbound => f.write_str("inbound"),
        }
    }
}

/// External code that may inspect or rewrite relayed bytes.
pub trait ContentProvider: Send + Sync {
    /// Called with every chunk before it is written on.
    ///
    /// Return `Some(bytes)` to replace the chunk, `None` to pass it through.
    fn filter(&self, direction: Direction, chunk: &[u8]) -> Option<Vec<u8>>;
}

/// Shared reference to an attached provider.
pub type SharedContentProvider = Arc<dyn ContentProvider>;

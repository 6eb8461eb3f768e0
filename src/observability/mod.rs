//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Lifecycle + dispatcher + handlers produce:
//!     → DebugSink (level-gated diagnostic messages)
//!         → TracingSink  → tracing subscriber (fmt layer, EnvFilter)
//!         → WriterSink   → stdout / stderr / any io::Write
//!         → MemorySink   → captured for inspection
//! ```
//!
//! # Design Decisions
//! - One verbosity knob per server, snapshotted per connection
//! - Structured `tracing` events for everything outside the debug sink

pub mod logging;

pub use logging::{
    DebugDestination, DebugSink, LogLevel, LogSink, MemorySink, TracingSink, WriterSink,
};

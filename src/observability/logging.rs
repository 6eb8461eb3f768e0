//! Structured logging and the per-server debug sink.
//!
//! # Responsibilities
//! - Initialize the process-wide `tracing` subscriber
//! - Carry a verbosity level plus an output destination (the debug sink)
//! - Provide destinations: tracing events, line writers, in-memory capture
//!
//! # Design Decisions
//! - The core depends only on a `log(level, message)` capability ([`LogSink`])
//! - Gating by verbosity is the caller's decision; sinks never filter
//! - Sinks are shared behind `Arc` so a snapshot can travel into a handler task

use std::fmt;
use std::io::{self, Write};
use std::sync::{Arc, Mutex, PoisonError};

use serde::{Deserialize, Serialize};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Severity of a debug-sink message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            LogLevel::Error => "ERROR",
            LogLevel::Warn => "WARN",
            LogLevel::Info => "INFO",
            LogLevel::Debug => "DEBUG",
        };
        f.write_str(label)
    }
}

/// A destination for diagnostic output.
pub trait LogSink: Send + Sync {
    fn log(&self, level: LogLevel, message: &str);
}

/// Forwards messages to the `tracing` subscriber.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl LogSink for TracingSink {
    fn log(&self, level: LogLevel, message: &str) {
        match level {
            LogLevel::Error => tracing::error!("{}", message),
            LogLevel::Warn => tracing::warn!("{}", message),
            LogLevel::Info => tracing::info!("{}", message),
            LogLevel::Debug => tracing::debug!("{}", message),
        }
    }
}

/// Writes one `[LEVEL] message` line per call to an `io::Write`.
pub struct WriterSink {
    writer: Mutex<Box<dyn Write + Send>>,
}

impl WriterSink {
    pub fn new<W: Write + Send + 'static>(writer: W) -> Self {
        Self {
            writer: Mutex::new(Box::new(writer)),
        }
    }

    pub fn stdout() -> Self {
        Self::new(io::stdout())
    }

    pub fn stderr() -> Self {
        Self::new(io::stderr())
    }
}

impl LogSink for WriterSink {
    fn log(&self, level: LogLevel, message: &str) {
        let mut writer = self.writer.lock().unwrap_or_else(PoisonError::into_inner);
        // A broken diagnostic stream must not take the proxy down.
        let _ = writeln!(writer, "[{}] {}", level, message);
        let _ = writer.flush();
    }
}

impl fmt::Debug for WriterSink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WriterSink").finish_non_exhaustive()
    }
}

/// Keeps every message in memory. Useful for embedding and tests.
#[derive(Debug, Default)]
pub struct MemorySink {
    lines: Mutex<Vec<(LogLevel, String)>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of everything logged so far.
    pub fn lines(&self) -> Vec<(LogLevel, String)> {
        self.lines
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// True if any message at `level` contains `needle`.
    pub fn contains(&self, level: LogLevel, needle: &str) -> bool {
        self.lines
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .any(|(l, msg)| *l == level && msg.contains(needle))
    }

    pub fn is_empty(&self) -> bool {
        self.lines
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_empty()
    }
}

impl LogSink for MemorySink {
    fn log(&self, level: LogLevel, message: &str) {
        self.lines
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((level, message.to_string()));
    }
}

/// Verbosity level paired with an output destination.
///
/// Level 0 keeps the proxy quiet apart from foreign-connection warnings;
/// level 1 adds lifecycle and failure messages; level 2 and above adds
/// per-connection detail from handlers.
#[derive(Clone)]
pub struct DebugSink {
    level: u32,
    destination: Arc<dyn LogSink>,
}

impl DebugSink {
    pub fn new(level: u32, destination: Arc<dyn LogSink>) -> Self {
        Self { level, destination }
    }

    pub fn level(&self) -> u32 {
        self.level
    }

    pub fn destination(&self) -> Arc<dyn LogSink> {
        Arc::clone(&self.destination)
    }

    /// True if the configured level is at least `min`.
    pub fn enabled(&self, min: u32) -> bool {
        self.level >= min
    }

    /// Write unconditionally.
    pub fn log(&self, level: LogLevel, message: &str) {
        self.destination.log(level, message);
    }

    /// Write only if the verbosity is at least `min`.
    pub fn log_at(&self, min: u32, level: LogLevel, message: &str) {
        if self.enabled(min) {
            self.destination.log(level, message);
        }
    }
}

impl Default for DebugSink {
    fn default() -> Self {
        Self::new(0, Arc::new(WriterSink::stdout()))
    }
}

impl fmt::Debug for DebugSink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DebugSink")
            .field("level", &self.level)
            .finish_non_exhaustive()
    }
}

/// Where the debug sink writes, as selected in configuration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DebugDestination {
    #[default]
    Tracing,
    Stdout,
    Stderr,
}

impl DebugDestination {
    pub fn into_sink(self) -> Arc<dyn LogSink> {
        match self {
            DebugDestination::Tracing => Arc::new(TracingSink),
            DebugDestination::Stdout => Arc::new(WriterSink::stdout()),
            DebugDestination::Stderr => Arc::new(WriterSink::stderr()),
        }
    }
}

/// Install the global `tracing` subscriber.
///
/// `RUST_LOG` wins over `default_directive` when set.
pub fn init_tracing(default_directive: &str) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive));

    // Ignore the error from a second initialization (tests, embedding).
    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .try_init();
}

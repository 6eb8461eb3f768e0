//! Security subsystem.
//!
//! # Data Flow
//! ```text
//! Accepted connection:
//!     → address_policy.rs (loopback / any-local check)
//!     → admitted: handed to a handler
//!     → rejected: closed immediately, warning logged
//! ```
//!
//! # Design Decisions
//! - Fail closed: anything that is not local is dropped
//! - A rejected peer never aborts the accept loop

pub mod address_policy;

pub use address_policy::{is_admissible, is_admissible_peer};

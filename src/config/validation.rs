//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (ports, timeouts, log level)
//! - Reject half-configured forward targets
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: ProxyConfig → Result<(), Vec<ValidationError>>

use thiserror::Error;

use crate::config::schema::ProxyConfig;

const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("listener.port must be between 1 and 65535")]
    InvalidListenPort,

    #[error("forward.host and forward.port must be set together")]
    IncompleteForwardTarget,

    #[error("forward.port must not equal listener.port when forwarding to localhost")]
    ForwardLoop,

    #[error("timeouts.idle_secs must be greater than zero")]
    ZeroIdleTimeout,

    #[error("observability.log_level {0:?} is not one of trace, debug, info, warn, error")]
    UnknownLogLevel(String),
}

pub fn validate_config(config: &ProxyConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.port == 0 {
        errors.push(ValidationError::InvalidListenPort);
    }

    let forward = &config.forward;
    if forward.host.is_empty() != (forward.port == 0) {
        errors.push(ValidationError::IncompleteForwardTarget);
    } else if !forward.is_direct()
        && forward.port == config.listener.port
        && matches!(forward.host.as_str(), "localhost" | "127.0.0.1" | "::1")
    {
        errors.push(ValidationError::ForwardLoop);
    }

    if config.timeouts.idle_secs == 0 {
        errors.push(ValidationError::ZeroIdleTimeout);
    }

    let level = config.observability.log_level.to_ascii_lowercase();
    if !LOG_LEVELS.contains(&level.as_str()) {
        errors.push(ValidationError::UnknownLogLevel(
            config.observability.log_level.clone(),
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → ProxyConfig
//!     → ServerConfig (immutable core values) + debug settings
//!
//! Command line:
//!     overrides.rs layers CLI values over the file, at startup and on reload
//!
//! On file change:
//!     watcher.rs detects change
//!     → loader.rs loads new config
//!     → overrides.rs re-applies CLI values
//!     → lifecycle::reload applies the debug settings
//! ```
//!
//! # Design Decisions
//! - All fields have defaults to allow minimal configs
//! - Port, forward target and timeout are fixed for a server's lifetime
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod overrides;
pub mod schema;
pub mod validation;
pub mod watcher;

pub use loader::{load_config, parse_config, ConfigError};
pub use overrides::ConfigOverrides;
pub use schema::{
    ForwardConfig, ListenerConfig, ObservabilityConfig, ProxyConfig, TimeoutConfig,
};
pub use validation::ValidationError;

//! Configuration system for spanfuse.
//!
//! Configuration is layered with figment: built-in defaults, then the first
//! config file found (or the one given explicitly), then `SPANFUSE_`
//! environment variables. The result is validated before use.

mod builder;
mod loader;
mod models;
mod validation;

pub use builder::ConfigBuilder;
pub use loader::ConfigLoader;
pub use models::*;
pub use validation::validate_config;

/// Default configuration file names that the system will look for
pub const DEFAULT_CONFIG_FILES: &[&str] = &[
    "spanfuse.toml",
    "spanfuse.yaml",
    "spanfuse.yml",
    "spanfuse.json",
    ".spanfuse/config.toml",
    ".spanfuse/config.yaml",
    ".spanfuse/config.yml",
    ".spanfuse/config.json",
];

/// Environment variable prefix for spanfuse configuration.
///
/// Nested keys are separated with a double underscore, e.g.
/// `SPANFUSE_LOGGING__LEVEL=debug`.
pub const ENV_PREFIX: &str = "SPANFUSE_";

/// Configuration error type
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Error occurred during file loading
    #[error("Failed to load configuration file: {0}")]
    FileLoadError(String),

    /// Error occurred during validation
    #[error("Configuration validation error: {0}")]
    ValidationError(String),

    /// Error occurred during parsing
    #[error("Configuration parsing error: {0}")]
    ParseError(String),
}

/// Result type for configuration operations
pub type Result<T> = std::result::Result<T, ConfigError>;

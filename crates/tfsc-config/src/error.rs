//! Configuration error types.

/// Result type alias for config operations.
pub type Result<T> = std::result::Result<T, ConfigError>;

/// Errors that can occur while resolving configuration from the environment.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// A required environment variable is unset or empty.
    #[error("missing required environment variable '{var}' ({purpose})")]
    Missing { var: String, purpose: String },

    /// An environment variable is set but its value cannot be used.
    #[error("invalid value for environment variable '{var}': {message}")]
    Invalid { var: String, message: String },
}

//! Configuration error types.

/// Result type alias for config operations.
pub type Result<T> = std::result::Result<T, ConfigError>;

/// Errors that can occur loading the engine's environment-driven
/// configuration. All variants are startup-fatal: configuration is loaded
/// once, before any background task starts (§10.3), so there is no
/// partial/recoverable state to represent here.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// A required environment variable was not set and has no default.
    #[error("missing required configuration value for '{0}'")]
    MissingField(String),

    /// A value was present but failed to parse into its expected type.
    #[error("invalid value for '{field}': {reason}")]
    InvalidValue { field: String, reason: String },

    /// Argument/environment parsing failed at the `clap` layer.
    #[error("failed to parse configuration: {0}")]
    Parse(#[from] clap::error::Error),
}

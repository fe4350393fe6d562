//! Error types for the iamgate core.

/// Core error type for iamgate infrastructure.
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    /// An environment variable holds a value that cannot be used.
    #[error("invalid value for {name}: {reason}")]
    InvalidVariable {
        /// Name of the offending environment variable.
        name: &'static str,
        /// Why the value was rejected.
        reason: String,
    },

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),
}

/// Convenience result type for core operations.
pub type CoreResult<T> = Result<T, CoreError>;

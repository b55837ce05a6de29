//! Error types for guarded invocations.

use thiserror::Error;

/// Main error type for callguard operations.
#[derive(Error, Debug)]
pub enum GuardError {
    /// The guarded function was called after its invocation budget ran out
    #[error("Function surpassed invocation limit")]
    InvocationLimitExceeded,

    /// The guarded function (or a deadline extension) was reached after the deadline
    #[error("Function timed out")]
    Timeout,

    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for callguard operations.
pub type Result<T> = std::result::Result<T, GuardError>;

//! Lambda adapter error types.

use std::time::Duration;
use thiserror::Error;

use gatehouse_core::CoreError;

/// Result type for Lambda adapter operations.
pub type Result<T> = std::result::Result<T, LambdaError>;

/// Lambda adapter errors.
#[derive(Debug, Error)]
pub enum LambdaError {
    /// Synthetic request/response error, including routing faults.
    #[error(transparent)]
    Core(#[from] CoreError),

    /// Event or context serialization failed.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// The routing engine did not finish the response in time.
    #[error("Invocation timed out after {0:?}")]
    Timeout(Duration),

    /// Lambda runtime error.
    #[error("Lambda runtime error: {0}")]
    Runtime(String),
}

impl From<lambda_runtime::Error> for LambdaError {
    fn from(err: lambda_runtime::Error) -> Self {
        Self::Runtime(err.to_string())
    }
}

//! Core error types.

use thiserror::Error;

/// Result type for core operations.
pub type Result<T> = std::result::Result<T, CoreError>;

/// Errors raised by the synthetic request/response pair.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CoreError {
    /// The base host or request path could not be turned into a URL.
    #[error("Invalid URL: {0}")]
    Url(String),

    /// The request body could not be decoded from its declared encoding.
    #[error("Body decoding error: {0}")]
    Body(String),

    /// The response was already finished or destroyed.
    #[error("Response already finished")]
    AlreadyFinished,

    /// The routing engine failed the response instead of completing it.
    #[error("Routing fault: {0}")]
    Routing(String),
}

impl From<url::ParseError> for CoreError {
    fn from(err: url::ParseError) -> Self {
        Self::Url(err.to_string())
    }
}

impl From<base64::DecodeError> for CoreError {
    fn from(err: base64::DecodeError) -> Self {
        Self::Body(err.to_string())
    }
}

//! Error types for handler execution.

use switchyard_core::ApiError;
use thiserror::Error;

/// Errors that can escape a handler chain.
#[derive(Debug, Error)]
pub enum HandlerError {
    /// The dispatch was cancelled while a handler was pending.
    #[error("handler cancelled")]
    Cancelled,

    /// An outbound call made by a handler failed.
    #[error(transparent)]
    Api(#[from] ApiError),

    /// Any other failure raised by handler code.
    #[error(transparent)]
    Other(Box<dyn std::error::Error + Send + Sync>),
}

impl HandlerError {
    /// Wraps an arbitrary error.
    pub fn other(err: impl Into<Box<dyn std::error::Error + Send + Sync>>) -> Self {
        Self::Other(err.into())
    }

    /// Returns `true` if the failure stems from cancellation or a timeout.
    ///
    /// Whether the caller asked for it is decided by inspecting the caller's
    /// token, not by this error.
    pub fn is_cancellation(&self) -> bool {
        match self {
            Self::Cancelled => true,
            Self::Api(err) => err.is_cancellation(),
            Self::Other(_) => false,
        }
    }
}

/// Result type for handler execution.
pub type HandlerResult<T> = Result<T, HandlerError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cancellation_classification() {
        assert!(HandlerError::Cancelled.is_cancellation());
        assert!(HandlerError::from(ApiError::Timeout).is_cancellation());
        assert!(HandlerError::from(ApiError::Cancelled).is_cancellation());
        assert!(!HandlerError::from(ApiError::QueryExpired).is_cancellation());
        assert!(!HandlerError::other("boom").is_cancellation());
    }
}

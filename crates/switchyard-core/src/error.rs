//! Error types for outbound API calls.
//!
//! Upstream failures are classified by status code and by their textual
//! description so callers can tell an expired callback token or a vanished
//! message apart from a generic rejection.

use std::time::Duration;

use thiserror::Error;

const QUERY_EXPIRED: &str =
    "Bad Request: query is too old and response timeout expired or query ID is invalid";
const MESSAGE_TO_EDIT_NOT_FOUND: &str = "message to edit not found";
const MESSAGE_NOT_FOUND: &str = "message not found";
const MESSAGE_NOT_MODIFIED: &str = "message is not modified";

// =============================================================================
// API Errors
// =============================================================================

/// Error type for outbound API calls.
#[derive(Debug, Clone, Error)]
pub enum ApiError {
    /// The platform answered 429.
    #[error("too many requests: {description}")]
    TooManyRequests {
        retry_after: Option<Duration>,
        description: String,
    },

    /// A callback or inline query token is stale.
    #[error("query is too old or its id is invalid")]
    QueryExpired,

    /// The message addressed by the call no longer exists.
    #[error("message not found: {0}")]
    MessageNotFound(String),

    /// An edit did not change anything.
    #[error("message is not modified")]
    MessageNotModified,

    /// Any other rejection from the platform.
    #[error("request failed ({code}): {description}")]
    Request { code: i64, description: String },

    /// Rejected locally by a rate-limit gate.
    #[error("rate limited locally, retry after {retry_after:?}")]
    RateLimited { retry_after: Duration },

    /// The call has no message to address.
    #[error("call has no target message")]
    MissingTarget,

    /// The call was cancelled before it completed.
    #[error("call cancelled")]
    Cancelled,

    /// The transport gave up waiting for a response.
    #[error("call timed out")]
    Timeout,

    /// Failed to serialize or deserialize a payload.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Transport-level failure.
    #[error("transport error: {0}")]
    Transport(String),

    /// A resilience policy could not be resolved.
    #[error("policy error: {0}")]
    Policy(String),
}

impl ApiError {
    /// Classifies an unsuccessful platform response.
    pub fn from_response(code: i64, description: &str, retry_after: Option<Duration>) -> Self {
        if code == 429 {
            return Self::TooManyRequests {
                retry_after,
                description: description.to_string(),
            };
        }

        if description == QUERY_EXPIRED {
            return Self::QueryExpired;
        }

        let lowered = description.to_ascii_lowercase();
        if lowered.contains(MESSAGE_TO_EDIT_NOT_FOUND) || lowered.contains(MESSAGE_NOT_FOUND) {
            return Self::MessageNotFound(description.to_string());
        }
        if lowered.contains(MESSAGE_NOT_MODIFIED) {
            return Self::MessageNotModified;
        }

        Self::Request {
            code,
            description: description.to_string(),
        }
    }

    /// The delay suggested by the rejection, if it carries one.
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            Self::TooManyRequests { retry_after, .. } => *retry_after,
            Self::RateLimited { retry_after } => Some(*retry_after),
            _ => None,
        }
    }

    /// Returns `true` for rejections that retrying after a delay may fix.
    pub fn is_rate_limited(&self) -> bool {
        matches!(self, Self::TooManyRequests { .. } | Self::RateLimited { .. })
    }

    /// Returns `true` for errors callers usually ignore.
    pub fn is_benign(&self) -> bool {
        matches!(
            self,
            Self::QueryExpired | Self::MessageNotFound(_) | Self::MessageNotModified
        )
    }

    /// Returns `true` for cancellation and transport timeouts.
    pub fn is_cancellation(&self) -> bool {
        matches!(self, Self::Cancelled | Self::Timeout)
    }
}

impl From<serde_json::Error> for ApiError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

/// Result type for API calls.
pub type ApiResult<T> = Result<T, ApiError>;

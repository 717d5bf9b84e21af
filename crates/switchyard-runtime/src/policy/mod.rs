//! Resilience policies for outbound calls.
//!
//! - [`PolicyCache`]: expiring, single-flight cache the policies live in
//! - [`RetryPolicy`]: retries rate-limited calls after the suggested delay
//! - [`RateLimiter`]: token bucket gate that rejects calls over its rate

mod cache;
mod rate_limit;
mod retry;

pub use cache::{Expiration, PolicyCache, PolicyHandle};
pub use rate_limit::RateLimiter;
pub use retry::RetryPolicy;

use switchyard_core::ApiError;
use thiserror::Error;

/// Errors raised while resolving a cached policy.
#[derive(Debug, Clone, Error)]
pub enum PolicyError {
    /// The key already holds a policy of another type.
    #[error("policy '{key}' is not a {expected}")]
    TypeMismatch { key: String, expected: &'static str },
}

impl From<PolicyError> for ApiError {
    fn from(err: PolicyError) -> Self {
        ApiError::Policy(err.to_string())
    }
}

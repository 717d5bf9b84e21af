use std::future::Future;
use std::time::Duration;

use lazy_regex::regex_captures;
use switchyard_core::{ApiError, ApiResult};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Retries calls rejected for exceeding a rate limit.
///
/// Both upstream "too many requests" answers and local gate rejections
/// trigger a retry. The wait is the delay embedded in the rejection, else a
/// `retry after N` hint parsed from its description, else `default_wait`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    max_retries: u32,
    default_wait: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(3, Duration::from_secs(3))
    }
}

impl RetryPolicy {
    pub fn new(max_retries: u32, default_wait: Duration) -> Self {
        Self {
            max_retries,
            default_wait,
        }
    }

    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    /// How long to wait before retrying after `err`.
    pub fn wait_for(&self, err: &ApiError) -> Duration {
        if let Some(delay) = err.retry_after() {
            return delay;
        }

        let hinted = match err {
            ApiError::TooManyRequests { description, .. } => {
                regex_captures!(r"(?i)retry after (\d+)", description)
                    .and_then(|(_, secs)| secs.parse().ok())
                    .map(Duration::from_secs)
            }
            _ => None,
        };
        hinted.unwrap_or(self.default_wait)
    }

    /// Runs `operation`, retrying rate-limited failures.
    ///
    /// Waiting is cancellable; a cancelled wait returns [`ApiError::Cancelled`].
    pub async fn execute<T, F, Fut>(
        &self,
        cancel: &CancellationToken,
        mut operation: F,
    ) -> ApiResult<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = ApiResult<T>>,
    {
        let mut attempt = 0;
        loop {
            match operation().await {
                Ok(value) => return Ok(value),
                Err(err) if err.is_rate_limited() && attempt < self.max_retries => {
                    attempt += 1;
                    let wait = self.wait_for(&err);
                    debug!(attempt, wait_ms = wait.as_millis() as u64, error = %err, "retrying rate-limited call");

                    tokio::select! {
                        biased;
                        _ = cancel.cancelled() => return Err(ApiError::Cancelled),
                        _ = tokio::time::sleep(wait) => {}
                    }
                }
                Err(err) => {
                    if err.is_rate_limited() {
                        warn!(attempts = attempt + 1, error = %err, "rate-limited call gave up");
                    }
                    return Err(err);
                }
            }
        }
    }
}

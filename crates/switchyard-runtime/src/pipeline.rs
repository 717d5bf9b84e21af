//! Outbound call pipeline.
//!
//! Every outgoing call runs through a chain assembled per call from cached
//! policies:
//!
//! ```text
//! retry ──▶ global limit ──▶ chat/minute limit ──▶ chat/second limit ──▶ bot
//! ```
//!
//! The rate limits only apply to message-producing methods; the per-chat
//! ones only when the call addresses a chat. A call takes a permit from every
//! gate or from none, so rejected attempts never spend outer capacity. Limiters are cached per name,
//! so each chat keeps its own instance for as long as it stays active.
//!
//! ```rust,ignore
//! let pipeline = Arc::new(OutboundPipeline::new(config.resilience.clone()));
//! let bot: BoxedBot = Arc::new(ResilientBot::new(client, pipeline));
//! bot.send_message(chat_id, "hello", &cancel).await?;
//! ```

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use switchyard_core::{ApiError, ApiRequest, ApiResult, Bot, BoxedBot};
use tokio_util::sync::CancellationToken;
use tracing::trace;

use crate::config::{LimitConfig, ResilienceConfig};
use crate::policy::{Expiration, PolicyCache, RateLimiter, RetryPolicy};

/// Cache key of the shared retry policy.
pub const RETRY_POLICY: &str = "retry";
/// Cache key of the global limiter.
pub const GLOBAL_LIMIT: &str = "global";

pub fn chat_minute_key(chat_id: i64) -> String {
    format!("chat-minute-{chat_id}")
}

pub fn chat_second_key(chat_id: i64) -> String {
    format!("chat-second-{chat_id}")
}

/// Builds and runs the policy chain of outbound calls.
#[derive(Debug)]
pub struct OutboundPipeline {
    cache: PolicyCache,
    config: ResilienceConfig,
}

impl OutboundPipeline {
    /// Policies unused for `config.policy_idle_secs` are evicted.
    pub fn new(config: ResilienceConfig) -> Self {
        let cache = PolicyCache::new(Expiration::Sliding(config.policy_idle()));
        Self::with_cache(config, cache)
    }

    pub fn with_cache(config: ResilienceConfig, cache: PolicyCache) -> Self {
        Self { cache, config }
    }

    pub fn cache(&self) -> &PolicyCache {
        &self.cache
    }

    async fn retry_policy(&self) -> ApiResult<Arc<RetryPolicy>> {
        let retry = &self.config.retry;
        Ok(self
            .cache
            .get_or_create(RETRY_POLICY, |_| {
                RetryPolicy::new(retry.max_retries, retry.default_wait())
            })
            .await?)
    }

    async fn limiter(&self, key: &str, limit: LimitConfig) -> ApiResult<Arc<RateLimiter>> {
        Ok(self
            .cache
            .get_or_create(key, |_| {
                RateLimiter::new(limit.permits, limit.window(), limit.burst)
            })
            .await?)
    }

    /// Rate-limit gates for `request`, outermost first.
    pub async fn gates(&self, request: &ApiRequest) -> ApiResult<Vec<Arc<RateLimiter>>> {
        if !request.is_high_frequency() {
            return Ok(Vec::new());
        }

        let mut gates = vec![self.limiter(GLOBAL_LIMIT, self.config.global).await?];
        if let Some(chat_id) = request.chat_id {
            gates.push(
                self.limiter(&chat_minute_key(chat_id), self.config.chat_per_minute)
                    .await?,
            );
            gates.push(
                self.limiter(&chat_second_key(chat_id), self.config.chat_per_second)
                    .await?,
            );
        }
        Ok(gates)
    }

    /// Executes `request` on `bot` under the policy chain.
    pub async fn execute<B>(
        &self,
        bot: &B,
        request: ApiRequest,
        cancel: &CancellationToken,
    ) -> ApiResult<Value>
    where
        B: Bot + ?Sized,
    {
        let retry = self.retry_policy().await?;
        let gates = &self.gates(&request).await?;
        trace!(method = %request.method, chat_id = ?request.chat_id, gates = gates.len(), "outbound call");

        retry
            .execute(cancel, move || {
                let request = request.clone();
                async move {
                    if cancel.is_cancelled() {
                        return Err(ApiError::Cancelled);
                    }
                    RateLimiter::try_acquire_all(gates.iter().map(Arc::as_ref))?;
                    bot.call(request, cancel).await
                }
            })
            .await
    }
}

/// A bot whose calls all go through an [`OutboundPipeline`].
///
/// Typed [`BotApi`](switchyard_core::BotApi) methods work unchanged on the
/// wrapper since they are built on [`Bot::call`].
pub struct ResilientBot {
    inner: BoxedBot,
    pipeline: Arc<OutboundPipeline>,
}

impl ResilientBot {
    pub fn new(inner: impl Bot, pipeline: Arc<OutboundPipeline>) -> Self {
        Self::from_boxed(Arc::new(inner), pipeline)
    }

    pub fn from_boxed(inner: BoxedBot, pipeline: Arc<OutboundPipeline>) -> Self {
        Self { inner, pipeline }
    }

    pub fn inner(&self) -> &BoxedBot {
        &self.inner
    }
}

#[async_trait]
impl Bot for ResilientBot {
    fn id(&self) -> i64 {
        self.inner.id()
    }

    async fn call(&self, request: ApiRequest, cancel: &CancellationToken) -> ApiResult<Value> {
        self.pipeline
            .execute(self.inner.as_ref(), request, cancel)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MockBot;
    use std::time::Duration;
    use switchyard_core::BotApi;
    use tokio::time::Instant;

    fn resilient(bot: &Arc<MockBot>) -> (ResilientBot, Arc<OutboundPipeline>) {
        let pipeline = Arc::new(OutboundPipeline::new(ResilienceConfig::default()));
        let wrapped = ResilientBot::from_boxed(Arc::clone(bot) as BoxedBot, Arc::clone(&pipeline));
        (wrapped, pipeline)
    }

    #[tokio::test(start_paused = true)]
    async fn test_global_cap_delays_thirty_first_send() {
        let mock = Arc::new(MockBot::new(1));
        let (bot, _) = resilient(&mock);
        let cancel = CancellationToken::new();
        let started = Instant::now();

        for chat_id in 1..=30 {
            bot.send_message(chat_id, "hi", &cancel).await.unwrap();
        }
        assert_eq!(started.elapsed(), Duration::ZERO);

        bot.send_message(31, "hi", &cancel).await.unwrap();
        assert!(started.elapsed() > Duration::ZERO);
        assert!(started.elapsed() < Duration::from_millis(100));
        assert_eq!(mock.calls_to("sendMessage").len(), 31);
    }

    #[tokio::test(start_paused = true)]
    async fn test_per_chat_burst() {
        let mock = Arc::new(MockBot::new(1));
        let (bot, _) = resilient(&mock);
        let cancel = CancellationToken::new();
        let started = Instant::now();

        for _ in 0..3 {
            bot.send_message(9, "hi", &cancel).await.unwrap();
        }
        assert_eq!(started.elapsed(), Duration::ZERO);

        bot.send_message(9, "hi", &cancel).await.unwrap();
        assert_eq!(started.elapsed(), Duration::from_secs(1));
    }

    #[tokio::test(start_paused = true)]
    async fn test_rejected_attempts_keep_outer_permits() {
        let mock = Arc::new(MockBot::new(1));
        let (bot, pipeline) = resilient(&mock);
        let cancel = CancellationToken::new();

        for _ in 0..4 {
            bot.send_message(9, "hi", &cancel).await.unwrap();
        }

        let minute = pipeline
            .cache()
            .lookup_as::<RateLimiter>(&chat_minute_key(9))
            .unwrap();
        assert_eq!(minute.available(), 16);
        let global = pipeline
            .cache()
            .lookup_as::<RateLimiter>(GLOBAL_LIMIT)
            .unwrap();
        // Only the send that went out at one second is still in the window.
        assert_eq!(global.available(), 29);
    }

    #[tokio::test(start_paused = true)]
    async fn test_sustained_sends_follow_per_second_rate() {
        let mock = Arc::new(MockBot::new(1));
        let (bot, _) = resilient(&mock);
        let cancel = CancellationToken::new();
        let started = Instant::now();

        for _ in 0..20 {
            bot.send_message(9, "hi", &cancel).await.unwrap();
        }

        assert_eq!(started.elapsed(), Duration::from_secs(17));
        assert_eq!(mock.calls_to("sendMessage").len(), 20);
    }

    #[tokio::test(start_paused = true)]
    async fn test_limiters_are_cached_per_chat() {
        let mock = Arc::new(MockBot::new(1));
        let (bot, pipeline) = resilient(&mock);
        let cancel = CancellationToken::new();

        bot.send_message(5, "a", &cancel).await.unwrap();
        let first = pipeline
            .cache()
            .lookup_as::<RateLimiter>(&chat_second_key(5))
            .unwrap();
        bot.send_message(5, "b", &cancel).await.unwrap();
        let second = pipeline
            .cache()
            .lookup_as::<RateLimiter>(&chat_second_key(5))
            .unwrap();

        assert!(Arc::ptr_eq(&first, &second));
        assert!(pipeline.cache().lookup(&chat_minute_key(5)).is_some());
        assert!(pipeline.cache().lookup(GLOBAL_LIMIT).is_some());
        assert!(pipeline.cache().lookup(&chat_second_key(6)).is_none());
    }

    #[tokio::test]
    async fn test_low_frequency_calls_skip_gates() {
        let mock = Arc::new(MockBot::new(1));
        let (_, pipeline) = resilient(&mock);

        let action = ApiRequest::new("sendChatAction", serde_json::json!({})).with_chat(3);
        assert!(pipeline.gates(&action).await.unwrap().is_empty());

        let me = ApiRequest::new("getMe", serde_json::json!({}));
        assert!(pipeline.gates(&me).await.unwrap().is_empty());

        let unaddressed = ApiRequest::new("sendMessage", serde_json::json!({}));
        assert_eq!(pipeline.gates(&unaddressed).await.unwrap().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_upstream_429_is_retried() {
        let mock = Arc::new(MockBot::new(1));
        mock.fail_next(ApiError::from_response(
            429,
            "Too Many Requests: retry after 2",
            None,
        ));
        let (bot, _) = resilient(&mock);
        let started = Instant::now();

        let user = bot.get_me(&CancellationToken::new()).await.unwrap();

        assert_eq!(user.id, 1);
        assert_eq!(mock.calls_to("getMe").len(), 2);
        assert_eq!(started.elapsed(), Duration::from_secs(2));
    }

    #[tokio::test]
    async fn test_other_failures_pass_through() {
        let mock = Arc::new(MockBot::new(1));
        mock.fail_next(ApiError::from_response(400, "Bad Request: message is not modified", None));
        let (bot, _) = resilient(&mock);

        let err = bot
            .edit_message_text(1, 2, "same", &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::MessageNotModified));
        assert_eq!(mock.requests.lock().len(), 1);
    }

    #[tokio::test]
    async fn test_cancelled_before_call() {
        let mock = Arc::new(MockBot::new(1));
        let (bot, _) = resilient(&mock);
        let cancel = CancellationToken::new();
        cancel.cancel();

        let err = bot.send_message(1, "hi", &cancel).await.unwrap_err();
        assert!(matches!(err, ApiError::Cancelled));
        assert!(mock.requests.lock().is_empty());
    }
}

//! Test doubles shared by the runtime's unit tests.

use std::collections::VecDeque;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::{Value, json};
use switchyard_core::{ApiError, ApiRequest, ApiResult, Bot};
use tokio_util::sync::CancellationToken;

/// Records outbound requests; answers like the platform unless a failure
/// is queued.
pub struct MockBot {
    id: i64,
    delay: Option<Duration>,
    pub requests: Mutex<Vec<ApiRequest>>,
    failures: Mutex<VecDeque<ApiError>>,
}

impl MockBot {
    pub fn new(id: i64) -> Self {
        Self {
            id,
            delay: None,
            requests: Mutex::new(Vec::new()),
            failures: Mutex::new(VecDeque::new()),
        }
    }

    /// Every call takes `delay` before answering.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// The next call fails with `err`.
    pub fn fail_next(&self, err: ApiError) {
        self.failures.lock().push_back(err);
    }

    pub fn methods(&self) -> Vec<String> {
        self.requests.lock().iter().map(|r| r.method.clone()).collect()
    }

    pub fn calls_to(&self, method: &str) -> Vec<ApiRequest> {
        self.requests
            .lock()
            .iter()
            .filter(|r| r.method == method)
            .cloned()
            .collect()
    }
}

#[async_trait]
impl Bot for MockBot {
    fn id(&self) -> i64 {
        self.id
    }

    async fn call(&self, request: ApiRequest, cancel: &CancellationToken) -> ApiResult<Value> {
        if let Some(delay) = self.delay {
            tokio::select! {
                _ = cancel.cancelled() => return Err(ApiError::Cancelled),
                _ = tokio::time::sleep(delay) => {}
            }
        }

        let reply = match request.method.as_str() {
            "getMe" => json!({
                "id": self.id,
                "is_bot": true,
                "first_name": "Bot",
                "username": format!("bot{}", self.id),
            }),
            "getWebhookInfo" => json!({ "url": "", "pending_update_count": 2 }),
            "getUpdates" => json!([]),
            "sendMessage" => json!({
                "message_id": 1,
                "chat": { "id": request.params["chat_id"], "type": "private" },
                "text": request.params["text"],
            }),
            _ => json!(true),
        };

        self.requests.lock().push(request);
        match self.failures.lock().pop_front() {
            Some(err) => Err(err),
            None => Ok(reply),
        }
    }
}

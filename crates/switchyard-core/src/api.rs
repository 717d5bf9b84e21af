//! Outbound request and response envelopes.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{ApiError, ApiResult};

/// A single outbound API call.
///
/// `chat_id` is set when the method addresses a conversation; the outbound
/// pipeline uses it to select per-conversation rate limits.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiRequest {
    pub method: String,
    pub chat_id: Option<i64>,
    pub params: Value,
}

impl ApiRequest {
    /// Creates a request that does not address a conversation.
    pub fn new(method: impl Into<String>, params: Value) -> Self {
        Self {
            method: method.into(),
            chat_id: None,
            params,
        }
    }

    /// Marks the request as addressed to `chat_id`.
    pub fn with_chat(mut self, chat_id: i64) -> Self {
        self.chat_id = Some(chat_id);
        self
    }

    /// Returns `true` for message-producing methods subject to throughput caps.
    pub fn is_high_frequency(&self) -> bool {
        match self.method.as_str() {
            "sendChatAction" => false,
            "forwardMessage" | "forwardMessages" | "copyMessage" | "copyMessages" => true,
            method => method.starts_with("send"),
        }
    }
}

/// Extra fields attached to a failed response.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResponseParameters {
    /// Seconds to wait before repeating the request.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retry_after: Option<u64>,
    /// The group was migrated to a supergroup with this id.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub migrate_to_chat_id: Option<i64>,
}

/// The platform's response envelope.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ApiResponse {
    pub ok: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_code: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parameters: Option<ResponseParameters>,
}

impl ApiResponse {
    /// Unwraps the result, classifying failures into [`ApiError`].
    pub fn into_result(self) -> ApiResult<Value> {
        if self.ok {
            return Ok(self.result.unwrap_or(Value::Bool(true)));
        }

        let retry_after = self
            .parameters
            .and_then(|p| p.retry_after)
            .map(Duration::from_secs);

        Err(ApiError::from_response(
            self.error_code.unwrap_or_default(),
            self.description.as_deref().unwrap_or_default(),
            retry_after,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_high_frequency_methods() {
        assert!(ApiRequest::new("sendMessage", json!({})).is_high_frequency());
        assert!(ApiRequest::new("sendPhoto", json!({})).is_high_frequency());
        assert!(ApiRequest::new("copyMessage", json!({})).is_high_frequency());
        assert!(!ApiRequest::new("sendChatAction", json!({})).is_high_frequency());
        assert!(!ApiRequest::new("getMe", json!({})).is_high_frequency());
        assert!(!ApiRequest::new("answerCallbackQuery", json!({})).is_high_frequency());
    }

    #[test]
    fn test_response_ok() {
        let response: ApiResponse =
            serde_json::from_str(r#"{"ok": true, "result": {"id": 1}}"#).unwrap();
        assert_eq!(response.into_result().unwrap(), json!({"id": 1}));
    }

    #[test]
    fn test_response_retry_after() {
        let response: ApiResponse = serde_json::from_str(
            r#"{"ok": false, "error_code": 429, "description": "Too Many Requests: retry after 12", "parameters": {"retry_after": 12}}"#,
        )
        .unwrap();

        let err = response.into_result().unwrap_err();
        assert_eq!(err.retry_after(), Some(Duration::from_secs(12)));
    }
}

//! Outbound client contract.
//!
//! A [`Bot`] is anything that can execute a raw [`ApiRequest`]. Typed methods
//! live on the [`BotApi`] extension trait, which is implemented for every bot
//! (including `dyn Bot`), so wrappers such as a resilient pipeline only need
//! to implement [`Bot::call`] to sit transparently under every typed method.
//!
//! ```rust,ignore
//! use switchyard_core::{BotApi, BoxedBot};
//!
//! async fn greet(bot: &BoxedBot, chat_id: i64, cancel: &CancellationToken) -> ApiResult<()> {
//!     bot.send_message(chat_id, "hello", cancel).await?;
//!     Ok(())
//! }
//! ```

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use tokio_util::sync::CancellationToken;
use tracing::warn;

use crate::api::ApiRequest;
use crate::error::{ApiError, ApiResult};
use crate::model::{BotCommand, CallbackQuery, CommandScope, Message, User, WebhookInfo};

/// The core Bot trait.
#[async_trait]
pub trait Bot: Send + Sync + 'static {
    /// Returns the bot's numeric identifier.
    fn id(&self) -> i64;

    /// Executes a raw API call.
    ///
    /// Implementations must return [`ApiError::Cancelled`] promptly once
    /// `cancel` fires.
    async fn call(&self, request: ApiRequest, cancel: &CancellationToken) -> ApiResult<Value>;
}

/// A shared Bot trait object.
pub type BoxedBot = Arc<dyn Bot>;

/// Parameters of an `answerCallbackQuery` call.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CallbackAnswer {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub show_alert: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

impl CallbackAnswer {
    /// An answer that shows `text` as a notification.
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            ..Default::default()
        }
    }

    /// Shows the text as a modal alert instead of a notification.
    pub fn alert(mut self) -> Self {
        self.show_alert = true;
        self
    }

    /// Opens `url` on the client.
    pub fn url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }
}

fn decode<T: DeserializeOwned>(value: Value) -> ApiResult<T> {
    Ok(serde_json::from_value(value)?)
}

/// Typed API methods available on every [`Bot`].
#[async_trait]
pub trait BotApi: Bot {
    async fn get_me(&self, cancel: &CancellationToken) -> ApiResult<User> {
        decode(self.call(ApiRequest::new("getMe", json!({})), cancel).await?)
    }

    async fn send_message(
        &self,
        chat_id: i64,
        text: &str,
        cancel: &CancellationToken,
    ) -> ApiResult<Message> {
        let request = ApiRequest::new("sendMessage", json!({ "chat_id": chat_id, "text": text }))
            .with_chat(chat_id);
        decode(self.call(request, cancel).await?)
    }

    async fn edit_message_text(
        &self,
        chat_id: i64,
        message_id: i64,
        text: &str,
        cancel: &CancellationToken,
    ) -> ApiResult<Value> {
        let request = ApiRequest::new(
            "editMessageText",
            json!({ "chat_id": chat_id, "message_id": message_id, "text": text }),
        )
        .with_chat(chat_id);
        self.call(request, cancel).await
    }

    /// Replaces the inline keyboard of the message a callback query came from.
    ///
    /// Inline-mode messages are addressed by `inline_message_id`, others by
    /// chat and message id.
    async fn edit_message_reply_markup(
        &self,
        query: &CallbackQuery,
        reply_markup: Option<Value>,
        cancel: &CancellationToken,
    ) -> ApiResult<Value> {
        let markup = reply_markup.unwrap_or(Value::Null);
        let request = if let Some(inline_id) = &query.inline_message_id {
            ApiRequest::new(
                "editMessageReplyMarkup",
                json!({ "inline_message_id": inline_id, "reply_markup": markup }),
            )
        } else if let Some(message) = &query.message {
            ApiRequest::new(
                "editMessageReplyMarkup",
                json!({
                    "chat_id": message.chat.id,
                    "message_id": message.message_id,
                    "reply_markup": markup,
                }),
            )
            .with_chat(message.chat.id)
        } else {
            return Err(ApiError::MissingTarget);
        };
        self.call(request, cancel).await
    }

    async fn answer_callback_query(
        &self,
        query_id: &str,
        answer: &CallbackAnswer,
        cancel: &CancellationToken,
    ) -> ApiResult<bool> {
        let mut params = serde_json::to_value(answer)?;
        params["callback_query_id"] = json!(query_id);
        decode(
            self.call(ApiRequest::new("answerCallbackQuery", params), cancel)
                .await?,
        )
    }

    /// Answers an inline query, warning about duplicate result ids first.
    async fn answer_inline_query(
        &self,
        query_id: &str,
        results: Vec<Value>,
        cancel: &CancellationToken,
    ) -> ApiResult<bool> {
        {
            let mut seen = HashSet::new();
            for id in results.iter().filter_map(|r| r.get("id")).filter_map(Value::as_str) {
                if !seen.insert(id) {
                    warn!(query_id, result_id = id, "duplicate inline query result id");
                }
            }
        }

        let request = ApiRequest::new(
            "answerInlineQuery",
            json!({ "inline_query_id": query_id, "results": results }),
        );
        decode(self.call(request, cancel).await?)
    }

    async fn set_my_commands(
        &self,
        commands: &[BotCommand],
        scope: CommandScope,
        cancel: &CancellationToken,
    ) -> ApiResult<bool> {
        let request = ApiRequest::new(
            "setMyCommands",
            json!({ "commands": commands, "scope": scope }),
        );
        decode(self.call(request, cancel).await?)
    }

    async fn delete_my_commands(
        &self,
        scope: CommandScope,
        cancel: &CancellationToken,
    ) -> ApiResult<bool> {
        let request = ApiRequest::new("deleteMyCommands", json!({ "scope": scope }));
        decode(self.call(request, cancel).await?)
    }

    /// Registers `url` as the webhook; an empty url removes it.
    async fn set_webhook(&self, url: &str, cancel: &CancellationToken) -> ApiResult<bool> {
        decode(
            self.call(ApiRequest::new("setWebhook", json!({ "url": url })), cancel)
                .await?,
        )
    }

    async fn get_webhook_info(&self, cancel: &CancellationToken) -> ApiResult<WebhookInfo> {
        decode(
            self.call(ApiRequest::new("getWebhookInfo", json!({})), cancel)
                .await?,
        )
    }

    async fn get_updates(
        &self,
        offset: i64,
        limit: u32,
        cancel: &CancellationToken,
    ) -> ApiResult<Vec<Value>> {
        let request = ApiRequest::new("getUpdates", json!({ "offset": offset, "limit": limit }));
        decode(self.call(request, cancel).await?)
    }
}

impl<T: Bot + ?Sized> BotApi for T {}

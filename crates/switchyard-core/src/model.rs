//! Inbound event data model.
//!
//! These types mirror the subset of the Bot API payloads the dispatch core
//! needs. An [`Update`] is immutable once received; message payloads are held
//! behind an `Arc` so entity views and handlers can share them without
//! copying.
//!
//! ```text
//! Update { id }
//! └── UpdatePayload
//!     ├── Message / EditedMessage / ChannelPost / EditedChannelPost → Message
//!     ├── CallbackQuery
//!     ├── InlineQuery
//!     └── Unknown
//! ```

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

// ============================================================================
// Users and chats
// ============================================================================

/// A user or bot account.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    /// Unique numeric identifier.
    pub id: i64,
    /// Whether this account is a bot.
    #[serde(default)]
    pub is_bot: bool,
    /// First name.
    #[serde(default)]
    pub first_name: String,
    /// Username without the leading `@`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
}

/// The kind of conversation a message belongs to.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChatKind {
    /// One-to-one conversation with a user.
    #[default]
    Private,
    /// Basic group.
    Group,
    /// Supergroup.
    Supergroup,
    /// Broadcast channel.
    Channel,
    /// Any chat type this crate does not know about.
    #[serde(other)]
    Unknown,
}

impl ChatKind {
    /// Returns `true` for direct, one-to-one conversations.
    pub fn is_private(self) -> bool {
        matches!(self, Self::Private)
    }

    /// Returns `true` for groups and supergroups.
    pub fn is_group(self) -> bool {
        matches!(self, Self::Group | Self::Supergroup)
    }
}

/// A conversation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chat {
    /// Unique numeric identifier.
    pub id: i64,
    /// Chat type.
    #[serde(rename = "type")]
    pub kind: ChatKind,
    /// Public username, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    /// Title for groups and channels.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
}

// ============================================================================
// Messages and entities
// ============================================================================

/// Annotation type of a [`MessageEntity`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Mention,
    Hashtag,
    Cashtag,
    /// A slash command such as `/start` or `/start@MyBot`.
    BotCommand,
    Url,
    Email,
    PhoneNumber,
    Bold,
    Italic,
    Underline,
    Strikethrough,
    Spoiler,
    Code,
    Pre,
    TextLink,
    TextMention,
    CustomEmoji,
    #[serde(other)]
    Unknown,
}

/// A substring annotation within a message's text.
///
/// `offset` and `length` are byte positions into [`Message::text`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageEntity {
    /// Annotation type.
    #[serde(rename = "type")]
    pub kind: EntityKind,
    /// Byte offset of the annotated substring.
    pub offset: usize,
    /// Byte length of the annotated substring.
    pub length: usize,
    /// Target URL for text links.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    /// Mentioned user for text mentions.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<User>,
    /// Programming language for pre blocks.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
}

impl MessageEntity {
    /// Creates a plain entity of the given kind.
    pub fn new(kind: EntityKind, offset: usize, length: usize) -> Self {
        Self {
            kind,
            offset,
            length,
            url: None,
            user: None,
            language: None,
        }
    }
}

/// A message in a chat or channel.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    /// Identifier unique within the chat.
    pub message_id: i64,
    /// Sender; absent for channel posts.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from: Option<User>,
    /// Original sender of a forwarded message.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub forward_from: Option<User>,
    /// Conversation the message belongs to.
    pub chat: Chat,
    /// Unix timestamp.
    #[serde(default)]
    pub date: i64,
    /// Text content.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    /// Annotations of [`text`](Self::text).
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub entities: Vec<MessageEntity>,
}

impl Message {
    /// Returns the text content, or an empty string.
    pub fn text(&self) -> &str {
        self.text.as_deref().unwrap_or_default()
    }

    /// Returns the sender, falling back to the forward origin.
    pub fn sender(&self) -> Option<&User> {
        self.from.as_ref().or(self.forward_from.as_ref())
    }

    /// A short content classification for telemetry.
    pub fn content_type(&self) -> &'static str {
        if self.text.is_some() { "text" } else { "other" }
    }
}

// ============================================================================
// Queries
// ============================================================================

/// A press on an inline keyboard button.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallbackQuery {
    /// Identifier used to answer the query.
    pub id: String,
    /// User who pressed the button.
    pub from: User,
    /// Message carrying the keyboard, when sent by the bot.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<Message>,
    /// Identifier of an inline-mode message carrying the keyboard.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inline_message_id: Option<String>,
    /// Data attached to the button.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<String>,
    #[serde(default)]
    pub chat_instance: String,
}

/// An inline-mode query.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InlineQuery {
    /// Identifier used to answer the query.
    pub id: String,
    /// Querying user.
    pub from: User,
    /// Query text.
    #[serde(default)]
    pub query: String,
    /// Pagination offset.
    #[serde(default)]
    pub offset: String,
}

// ============================================================================
// Update
// ============================================================================

/// Discriminant of an [`Update`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UpdateKind {
    Message,
    EditedMessage,
    ChannelPost,
    EditedChannelPost,
    CallbackQuery,
    InlineQuery,
    Unknown,
}

impl UpdateKind {
    /// Returns the wire name of this kind.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Message => "message",
            Self::EditedMessage => "edited_message",
            Self::ChannelPost => "channel_post",
            Self::EditedChannelPost => "edited_channel_post",
            Self::CallbackQuery => "callback_query",
            Self::InlineQuery => "inline_query",
            Self::Unknown => "unknown",
        }
    }
}

impl fmt::Display for UpdateKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Kind-specific payload of an [`Update`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpdatePayload {
    Message(Arc<Message>),
    EditedMessage(Arc<Message>),
    ChannelPost(Arc<Message>),
    EditedChannelPost(Arc<Message>),
    CallbackQuery(CallbackQuery),
    InlineQuery(InlineQuery),
    /// An update kind this crate does not model.
    Unknown,
}

/// One inbound occurrence delivered to a bot.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(from = "RawUpdate")]
pub struct Update {
    /// Monotonic update identifier.
    pub id: i64,
    /// Kind-specific payload.
    pub payload: UpdatePayload,
}

impl Update {
    /// Creates an update from its parts.
    pub fn new(id: i64, payload: UpdatePayload) -> Self {
        Self { id, payload }
    }

    /// Returns the update's kind.
    pub fn kind(&self) -> UpdateKind {
        match &self.payload {
            UpdatePayload::Message(_) => UpdateKind::Message,
            UpdatePayload::EditedMessage(_) => UpdateKind::EditedMessage,
            UpdatePayload::ChannelPost(_) => UpdateKind::ChannelPost,
            UpdatePayload::EditedChannelPost(_) => UpdateKind::EditedChannelPost,
            UpdatePayload::CallbackQuery(_) => UpdateKind::CallbackQuery,
            UpdatePayload::InlineQuery(_) => UpdateKind::InlineQuery,
            UpdatePayload::Unknown => UpdateKind::Unknown,
        }
    }

    /// Returns the message carried by message-like updates.
    pub fn message(&self) -> Option<&Arc<Message>> {
        match &self.payload {
            UpdatePayload::Message(m)
            | UpdatePayload::EditedMessage(m)
            | UpdatePayload::ChannelPost(m)
            | UpdatePayload::EditedChannelPost(m) => Some(m),
            _ => None,
        }
    }

    /// Returns the callback query, if this is one.
    pub fn callback_query(&self) -> Option<&CallbackQuery> {
        match &self.payload {
            UpdatePayload::CallbackQuery(q) => Some(q),
            _ => None,
        }
    }

    /// Returns the inline query, if this is one.
    pub fn inline_query(&self) -> Option<&InlineQuery> {
        match &self.payload {
            UpdatePayload::InlineQuery(q) => Some(q),
            _ => None,
        }
    }
}

/// Wire shape of an update: one optional field per kind.
#[derive(Deserialize)]
struct RawUpdate {
    update_id: i64,
    #[serde(default)]
    message: Option<Message>,
    #[serde(default)]
    edited_message: Option<Message>,
    #[serde(default)]
    channel_post: Option<Message>,
    #[serde(default)]
    edited_channel_post: Option<Message>,
    #[serde(default)]
    callback_query: Option<CallbackQuery>,
    #[serde(default)]
    inline_query: Option<InlineQuery>,
}

impl From<RawUpdate> for Update {
    fn from(raw: RawUpdate) -> Self {
        let payload = if let Some(m) = raw.message {
            UpdatePayload::Message(Arc::new(m))
        } else if let Some(m) = raw.edited_message {
            UpdatePayload::EditedMessage(Arc::new(m))
        } else if let Some(m) = raw.channel_post {
            UpdatePayload::ChannelPost(Arc::new(m))
        } else if let Some(m) = raw.edited_channel_post {
            UpdatePayload::EditedChannelPost(Arc::new(m))
        } else if let Some(q) = raw.callback_query {
            UpdatePayload::CallbackQuery(q)
        } else if let Some(q) = raw.inline_query {
            UpdatePayload::InlineQuery(q)
        } else {
            UpdatePayload::Unknown
        };

        Self {
            id: raw.update_id,
            payload,
        }
    }
}

// ============================================================================
// Command publication types
// ============================================================================

/// A command as published to the platform's command menu.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BotCommand {
    /// Command name without the leading slash.
    pub command: String,
    /// Human-readable description.
    pub description: String,
}

impl BotCommand {
    pub fn new(command: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            description: description.into(),
        }
    }
}

/// Which chats and users a command is authorized for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CommandScope {
    /// Every chat without a narrower scope.
    Default,
    /// All one-to-one conversations.
    AllPrivateChats,
    /// All groups and supergroups.
    AllGroupChats,
    /// Administrators of all groups and supergroups.
    AllChatAdministrators,
    /// One specific chat.
    Chat { chat_id: i64 },
    /// Administrators of one specific chat.
    ChatAdministrators { chat_id: i64 },
    /// One member of one specific chat.
    ChatMember { chat_id: i64, user_id: i64 },
}

impl CommandScope {
    /// Scopes that can be published without a concrete chat.
    pub const SUPPORTED: [CommandScope; 4] = [
        CommandScope::Default,
        CommandScope::AllPrivateChats,
        CommandScope::AllGroupChats,
        CommandScope::AllChatAdministrators,
    ];
}

/// Webhook registration state reported by the platform.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WebhookInfo {
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub has_custom_certificate: bool,
    #[serde(default)]
    pub pending_update_count: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_error_date: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_error_message: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_update_message_kind() {
        let update: Update = serde_json::from_str(
            r#"{"update_id": 7, "message": {"message_id": 1, "chat": {"id": 5, "type": "private"}, "text": "hi"}}"#,
        )
        .unwrap();

        assert_eq!(update.id, 7);
        assert_eq!(update.kind(), UpdateKind::Message);
        assert_eq!(update.message().unwrap().text(), "hi");
    }

    #[test]
    fn test_update_unknown_kind() {
        let update: Update =
            serde_json::from_str(r#"{"update_id": 8, "poll": {"id": "x"}}"#).unwrap();
        assert_eq!(update.kind(), UpdateKind::Unknown);
        assert!(update.message().is_none());
    }

    #[test]
    fn test_channel_post_has_no_sender() {
        let update: Update = serde_json::from_str(
            r#"{"update_id": 9, "channel_post": {"message_id": 3, "chat": {"id": -100, "type": "channel"}}}"#,
        )
        .unwrap();
        let message = update.message().unwrap();
        assert_eq!(update.kind(), UpdateKind::ChannelPost);
        assert!(message.sender().is_none());
        assert_eq!(message.content_type(), "other");
    }

    #[test]
    fn test_sender_falls_back_to_forward_origin() {
        let message = Message {
            forward_from: Some(User {
                id: 11,
                ..Default::default()
            }),
            ..Default::default()
        };
        assert_eq!(message.sender().map(|u| u.id), Some(11));
    }

    #[test]
    fn test_scope_wire_names() {
        let json = serde_json::to_value(CommandScope::ChatMember {
            chat_id: 1,
            user_id: 2,
        })
        .unwrap();
        assert_eq!(json["type"], "chat_member");

        let json = serde_json::to_value(CommandScope::AllPrivateChats).unwrap();
        assert_eq!(json["type"], "all_private_chats");
    }

    #[test]
    fn test_unknown_entity_kind() {
        let entity: MessageEntity =
            serde_json::from_str(r#"{"type": "blockquote", "offset": 0, "length": 1}"#).unwrap();
        assert_eq!(entity.kind, EntityKind::Unknown);
    }
}

//! # Switchyard Core
//!
//! Shared building blocks of the Switchyard bot framework:
//!
//! - **Data model**: inbound [`Update`]s and their payloads ([`model`])
//! - **Entity views**: parsed command entities over message text ([`EntityRef`])
//! - **Identity codec**: salted, reversible route tokens ([`EncodedId`])
//! - **Outbound contract**: the raw [`Bot`] client and typed [`BotApi`] methods
//! - **Errors**: upstream failure classification ([`ApiError`])
//!
//! ```text
//! ┌──────────┐   Update    ┌────────────┐   ApiRequest   ┌─────┐
//! │ Endpoint │────────────▶│  Handlers  │───────────────▶│ Bot │
//! └──────────┘             └────────────┘                └─────┘
//! ```

pub mod api;
pub mod bot;
pub mod entity;
pub mod error;
pub mod identity;
pub mod model;

pub use api::{ApiRequest, ApiResponse, ResponseParameters};
pub use bot::{Bot, BotApi, BoxedBot, CallbackAnswer};
pub use entity::EntityRef;
pub use error::{ApiError, ApiResult};
pub use identity::{EncodedId, IdPart};
pub use model::{
    BotCommand, CallbackQuery, Chat, ChatKind, CommandScope, EntityKind, InlineQuery, Message,
    MessageEntity, Update, UpdateKind, UpdatePayload, User, WebhookInfo,
};

pub use tokio_util::sync::CancellationToken;

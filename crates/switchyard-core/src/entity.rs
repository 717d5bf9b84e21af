//! Entity views over message text.
//!
//! [`EntityRef`] pairs a [`MessageEntity`] with the message it annotates and
//! exposes the parsed pieces of a bot command:
//!
//! ```text
//! "/help@MyBot topics"
//!  ^^^^^           command()      = "/help"
//!   ^^^^           command_name() = "help"
//!       ^^^^^      command_bot()  = Some("MyBot")
//!             ^^^^ arguments()    = "topics"
//! ```

use std::sync::Arc;

use crate::model::{Chat, EntityKind, Message, MessageEntity, User};

const COMMAND_MARKER: char = '/';
const BOT_SEPARATOR: char = '@';

/// A single entity together with the message that owns it.
#[derive(Debug, Clone)]
pub struct EntityRef {
    message: Arc<Message>,
    entity: MessageEntity,
    probe: bool,
}

impl EntityRef {
    /// Creates a view of `entity` inside `message`.
    pub fn new(message: Arc<Message>, entity: MessageEntity) -> Self {
        Self {
            message,
            entity,
            probe: false,
        }
    }

    /// Creates an empty command entity at the start of `message`.
    ///
    /// Command metadata treats this as a no-op invocation of any command and
    /// only evaluates scopes against it.
    pub fn probe(message: Arc<Message>) -> Self {
        Self {
            probe: true,
            ..Self::new(message, MessageEntity::new(EntityKind::BotCommand, 0, 0))
        }
    }

    /// Returns every entity of `message` as a view, in text order.
    pub fn all(message: &Arc<Message>) -> Vec<Self> {
        message
            .entities
            .iter()
            .map(|entity| Self::new(Arc::clone(message), entity.clone()))
            .collect()
    }

    /// The owning message.
    pub fn message(&self) -> &Arc<Message> {
        &self.message
    }

    /// The raw entity.
    pub fn entity(&self) -> &MessageEntity {
        &self.entity
    }

    /// The entity type.
    pub fn kind(&self) -> EntityKind {
        self.entity.kind
    }

    /// Returns `true` for bot command entities.
    pub fn is_command(&self) -> bool {
        self.entity.kind == EntityKind::BotCommand
    }

    /// Returns `true` only for views built by [`probe`](Self::probe).
    ///
    /// Entities taken from a message are never probes, whatever their length.
    pub fn is_probe(&self) -> bool {
        self.probe
    }

    /// The annotated substring, or `""` when the offsets fall outside the text.
    pub fn value(&self) -> &str {
        let text = self.message.text();
        self.entity
            .offset
            .checked_add(self.entity.length)
            .and_then(|end| text.get(self.entity.offset..end))
            .unwrap_or_default()
    }

    /// The command part of the value, without any `@bot` qualifier.
    pub fn command(&self) -> &str {
        let value = self.value();
        match value.find(BOT_SEPARATOR) {
            Some(at) => &value[..at],
            None => value,
        }
    }

    /// The command without its leading marker.
    pub fn command_name(&self) -> &str {
        let command = self.command();
        command.strip_prefix(COMMAND_MARKER).unwrap_or(command)
    }

    /// The `@bot` qualifier without the separator, when present and non-empty.
    pub fn command_bot(&self) -> Option<&str> {
        let value = self.value();
        value
            .find(BOT_SEPARATOR)
            .map(|at| &value[at + BOT_SEPARATOR.len_utf8()..])
            .filter(|bot| !bot.is_empty())
    }

    /// Text following the entity, with leading whitespace removed.
    pub fn arguments(&self) -> &str {
        let text = self.message.text();
        let end = self.entity.offset.saturating_add(self.entity.length);
        text.get(end..).unwrap_or_default().trim_start()
    }

    /// The chat the message belongs to.
    pub fn chat(&self) -> &Chat {
        &self.message.chat
    }

    /// The message sender, falling back to the forward origin.
    pub fn sender(&self) -> Option<&User> {
        self.message.sender()
    }
}

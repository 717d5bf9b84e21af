//! Entity-level dispatch for text messages.

use std::sync::Arc;

use async_trait::async_trait;
use switchyard_core::{BotApi, EntityRef, Message};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::{EntityHandlers, MessageContext};
use crate::context::UpdateContext;
use crate::error::HandlerResult;
use crate::handler::{Filter, Handler, HandlerMetadata, Registration};

/// The built-in command that lists the commands usable in the current chat.
pub const LIST_COMMANDS: &str = "/commands";

/// Runs the entity table for every entity of a message, in text order.
///
/// Commands qualified with another bot's name are skipped for every entity
/// handler. The bot's own name is fetched at most once per message, and only
/// when a qualified command is seen.
pub struct TextMessageHandler<MC, R> {
    ctx: Arc<UpdateContext>,
    entities: Arc<EntityHandlers<MC, R>>,
}

impl<MC, R> TextMessageHandler<MC, R>
where
    MC: Send + Sync + 'static,
    R: Send + 'static,
{
    /// Registers the handler for every message that carries entities.
    pub fn registration(
        entities: Arc<EntityHandlers<MC, R>>,
    ) -> Registration<Arc<Message>, MessageContext<MC>, R> {
        Self::registration_with(
            Filter::new(|message: &Arc<Message>, _| !message.entities.is_empty()),
            entities,
        )
    }

    /// Registers the handler under custom metadata.
    pub fn registration_with<M>(
        meta: M,
        entities: Arc<EntityHandlers<MC, R>>,
    ) -> Registration<Arc<Message>, MessageContext<MC>, R>
    where
        M: HandlerMetadata<Arc<Message>, MessageContext<MC>> + 'static,
    {
        Registration::new(meta, move |ctx| Self {
            ctx: Arc::clone(ctx),
            entities: Arc::clone(&entities),
        })
    }

    /// Description lines of every entity handler that would accept an empty
    /// command in `message`'s chat.
    fn command_listing(&self, message: &Arc<Message>, context: Option<&MC>) -> Vec<String> {
        let probe = EntityRef::probe(Arc::clone(message));
        self.entities
            .iter()
            .map(Registration::metadata)
            .filter(|meta| meta.should_process(&probe, context))
            .filter_map(|meta| meta.description())
            .filter(|line| !line.is_empty())
            .collect()
    }
}

#[async_trait]
impl<MC, R> Handler<Arc<Message>, MessageContext<MC>, R> for TextMessageHandler<MC, R>
where
    MC: Send + Sync + 'static,
    R: Send + 'static,
{
    async fn handle(
        &self,
        message: &Arc<Message>,
        context: Option<&MessageContext<MC>>,
        cancel: &CancellationToken,
    ) -> HandlerResult<Option<R>> {
        let context = context.and_then(|(_, context)| context.as_ref());
        let mut own_name: Option<Option<String>> = None;

        for entity in EntityRef::all(message) {
            if entity.is_command()
                && let Some(target) = entity.command_bot()
            {
                if own_name.is_none() {
                    own_name = Some(self.ctx.bot().get_me(cancel).await?.username);
                }
                let addressed_to_us = own_name
                    .as_ref()
                    .and_then(|name| name.as_deref())
                    .is_some_and(|name| name.eq_ignore_ascii_case(target));
                if !addressed_to_us {
                    debug!(command = entity.command(), target, "command addressed to another bot");
                    continue;
                }
            }

            if let Some(result) = self
                .entities
                .dispatch(&self.ctx, &entity, context, cancel)
                .await?
            {
                return Ok(Some(result));
            }

            if entity.is_command() && entity.command() == LIST_COMMANDS {
                let lines = self.command_listing(message, context);
                if lines.is_empty() {
                    continue;
                }
                self.ctx
                    .bot()
                    .send_message(message.chat.id, &lines.join("\n"), cancel)
                    .await?;
                return Ok(None);
            }
        }

        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::CommandMeta;
    use crate::update::test_support::{RecordingBot, context, text_message};
    use parking_lot::Mutex;
    use switchyard_core::{CommandScope, Update, UpdateKind, UpdatePayload};

    struct Reply {
        name: &'static str,
        calls: Arc<Mutex<Vec<String>>>,
    }

    #[async_trait]
    impl Handler<EntityRef, (), &'static str> for Reply {
        async fn handle(
            &self,
            entity: &EntityRef,
            _context: Option<&()>,
            _cancel: &CancellationToken,
        ) -> HandlerResult<Option<&'static str>> {
            self.calls.lock().push(entity.value().to_string());
            Ok(Some(self.name))
        }
    }

    fn command(
        calls: &Arc<Mutex<Vec<String>>>,
        meta: CommandMeta,
        name: &'static str,
    ) -> Registration<EntityRef, (), &'static str> {
        Registration::shared(
            meta,
            Reply {
                name,
                calls: Arc::clone(calls),
            },
        )
    }

    async fn run(
        bot: &Arc<RecordingBot>,
        entities: EntityHandlers<(), &'static str>,
        text: &str,
    ) -> Option<&'static str> {
        let message = text_message(text);
        let update = Update::new(1, UpdatePayload::Message(Arc::clone(&message)));
        let ctx = context(bot, update);
        let registration = TextMessageHandler::registration(Arc::new(entities));

        registration
            .build(&ctx)
            .handle(
                &message,
                Some(&(UpdateKind::Message, Some(()))),
                &CancellationToken::new(),
            )
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_command_for_this_bot() {
        let bot = Arc::new(RecordingBot::default());
        let calls = Arc::new(Mutex::new(Vec::new()));
        let entities = EntityHandlers::new().with(command(
            &calls,
            CommandMeta::new("help", "Show help").scope(CommandScope::AllPrivateChats),
            "help",
        ));

        let result = run(&bot, entities, "/help@mybot").await;

        assert_eq!(result, Some("help"));
        assert_eq!(bot.methods(), vec!["getMe"]);
    }

    #[tokio::test]
    async fn test_command_for_other_bot_is_skipped() {
        let bot = Arc::new(RecordingBot::default());
        let calls = Arc::new(Mutex::new(Vec::new()));
        let entities = EntityHandlers::new().with(command(
            &calls,
            CommandMeta::new("help", "Show help"),
            "help",
        ));

        let result = run(&bot, entities, "/help@OtherBot /help@AnotherBot").await;

        assert_eq!(result, None);
        assert!(calls.lock().is_empty());
        // Own name is looked up once per message.
        assert_eq!(bot.methods(), vec!["getMe"]);
    }

    #[tokio::test]
    async fn test_unqualified_command_needs_no_lookup() {
        let bot = Arc::new(RecordingBot::default());
        let calls = Arc::new(Mutex::new(Vec::new()));
        let entities = EntityHandlers::new().with(command(
            &calls,
            CommandMeta::new("start", "Start"),
            "start",
        ));

        assert_eq!(run(&bot, entities, "/start").await, Some("start"));
        assert!(bot.methods().is_empty());
    }

    #[tokio::test]
    async fn test_later_entity_can_decide() {
        let bot = Arc::new(RecordingBot::default());
        let calls = Arc::new(Mutex::new(Vec::new()));
        let entities = EntityHandlers::new().with(command(
            &calls,
            CommandMeta::new("stop", "Stop"),
            "stop",
        ));

        assert_eq!(run(&bot, entities, "/go /stop").await, Some("stop"));
        assert_eq!(*calls.lock(), vec!["/stop"]);
    }

    #[tokio::test]
    async fn test_commands_listing() {
        let bot = Arc::new(RecordingBot::default());
        let calls = Arc::new(Mutex::new(Vec::new()));
        let entities = EntityHandlers::new()
            .with(command(
                &calls,
                CommandMeta::new("start", "Start over").order(1),
                "start",
            ))
            .with(command(
                &calls,
                CommandMeta::new("help", "Show help").scope(CommandScope::AllPrivateChats),
                "help",
            ))
            .with(command(
                &calls,
                CommandMeta::new("kick", "Kick a member").scope(CommandScope::AllGroupChats),
                "kick",
            ))
            .with(command(&calls, CommandMeta::new("debug", ""), "debug"));

        let result = run(&bot, entities, "/commands").await;

        assert_eq!(result, None);
        assert!(calls.lock().is_empty());

        let sent = bot.find("sendMessage").unwrap();
        assert_eq!(sent.chat_id, Some(7));
        assert_eq!(sent.params["text"], "/help - Show help\n/start - Start over");
    }

    #[tokio::test]
    async fn test_empty_listing_continues() {
        let bot = Arc::new(RecordingBot::default());
        let calls = Arc::new(Mutex::new(Vec::new()));
        let entities = EntityHandlers::new().with(command(
            &calls,
            CommandMeta::new("kick", "Kick").scope(CommandScope::AllGroupChats),
            "kick",
        ));

        assert_eq!(run(&bot, entities, "/commands").await, None);
        assert!(bot.find("sendMessage").is_none());
    }
}

use std::marker::PhantomData;
use std::sync::Arc;

use async_trait::async_trait;
use switchyard_core::{Message, Update, UpdateKind};
use tokio_util::sync::CancellationToken;

use super::{ContextFn, MessageHandlers, UpdateFilter};
use crate::context::UpdateContext;
use crate::error::HandlerResult;
use crate::handler::{Handler, Registration};

/// Routes message-like updates into a message handler table.
///
/// Any decisive message result marks the update as handled.
pub struct MessageUpdateHandler<MC, R> {
    ctx: Arc<UpdateContext>,
    handlers: Arc<MessageHandlers<MC, R>>,
    context: Option<ContextFn<Message, MC>>,
    _result: PhantomData<fn() -> R>,
}

impl<MC, R> MessageUpdateHandler<MC, R>
where
    MC: Send + Sync + 'static,
    R: Send + 'static,
{
    /// Update kinds carrying a message.
    pub const KINDS: [UpdateKind; 4] = [
        UpdateKind::Message,
        UpdateKind::EditedMessage,
        UpdateKind::ChannelPost,
        UpdateKind::EditedChannelPost,
    ];

    /// Registers the handler with no message context.
    pub fn registration(handlers: Arc<MessageHandlers<MC, R>>) -> Registration<Update, (), bool> {
        Self::build_registration(handlers, None)
    }

    /// Registers the handler, deriving a message context with `context`.
    pub fn registration_with_context<F>(
        handlers: Arc<MessageHandlers<MC, R>>,
        context: F,
    ) -> Registration<Update, (), bool>
    where
        F: Fn(&Message) -> Option<MC> + Send + Sync + 'static,
    {
        Self::build_registration(handlers, Some(Arc::new(context)))
    }

    fn build_registration(
        handlers: Arc<MessageHandlers<MC, R>>,
        context: Option<ContextFn<Message, MC>>,
    ) -> Registration<Update, (), bool> {
        Registration::new(UpdateFilter::new(Self::KINDS), move |ctx| Self {
            ctx: Arc::clone(ctx),
            handlers: Arc::clone(&handlers),
            context: context.clone(),
            _result: PhantomData,
        })
    }
}

#[async_trait]
impl<MC, R> Handler<Update, (), bool> for MessageUpdateHandler<MC, R>
where
    MC: Send + Sync + 'static,
    R: Send + 'static,
{
    async fn handle(
        &self,
        update: &Update,
        _context: Option<&()>,
        cancel: &CancellationToken,
    ) -> HandlerResult<Option<bool>> {
        let Some(message) = update.message() else {
            return Ok(None);
        };

        let sender = message.sender();
        self.ctx.record_opt("uid", sender.map(|user| user.id));
        self.ctx
            .record_opt("username", sender.and_then(|user| user.username.as_deref()));
        self.ctx.record("messageType", message.content_type());
        self.ctx.record_opt("chat", message.chat.username.as_deref());
        self.ctx.record("cid", message.chat.id);
        self.ctx.record("mid", message.message_id);

        let context = (
            update.kind(),
            self.context.as_ref().and_then(|derive| derive(message)),
        );

        let result = self
            .handlers
            .dispatch(&self.ctx, message, Some(&context), cancel)
            .await?;

        Ok(result.map(|_| true))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handler::Filter;
    use crate::update::MessageContext;
    use crate::update::test_support::{RecordingBot, context, text_message};
    use parking_lot::Mutex;
    use switchyard_core::{CallbackQuery, UpdatePayload};

    struct Capture {
        seen: Arc<Mutex<Option<(UpdateKind, Option<String>)>>>,
        result: Option<u8>,
    }

    #[async_trait]
    impl Handler<Arc<Message>, MessageContext<String>, u8> for Capture {
        async fn handle(
            &self,
            _message: &Arc<Message>,
            context: Option<&MessageContext<String>>,
            _cancel: &CancellationToken,
        ) -> HandlerResult<Option<u8>> {
            *self.seen.lock() = context.cloned();
            Ok(self.result)
        }
    }

    fn table(
        seen: &Arc<Mutex<Option<(UpdateKind, Option<String>)>>>,
        result: Option<u8>,
    ) -> Arc<MessageHandlers<String, u8>> {
        Arc::new(MessageHandlers::new().with(Registration::shared(
            Filter::always(),
            Capture {
                seen: Arc::clone(seen),
                result,
            },
        )))
    }

    #[tokio::test]
    async fn test_decisive_message_result_handles_update() {
        let bot = Arc::new(RecordingBot::default());
        let seen = Arc::new(Mutex::new(None));
        let registration = MessageUpdateHandler::registration_with_context(
            table(&seen, Some(0)),
            |message: &Message| Some(message.text().to_uppercase()),
        );

        let update = Update::new(1, UpdatePayload::EditedMessage(text_message("hi")));
        let ctx = context(&bot, update.clone());
        let handler = registration.build(&ctx);

        let result = handler
            .handle(&update, None, &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(result, Some(true));
        assert_eq!(
            *seen.lock(),
            Some((UpdateKind::EditedMessage, Some("HI".to_string())))
        );

        let properties = ctx.properties();
        assert_eq!(properties["uid"], "7");
        assert_eq!(properties["username"], "alice");
        assert_eq!(properties["messageType"], "text");
        assert_eq!(properties["cid"], "7");
        assert_eq!(properties["mid"], "5");
        assert!(!properties.contains_key("chat"));
    }

    #[tokio::test]
    async fn test_declined_message_leaves_update_unhandled() {
        let bot = Arc::new(RecordingBot::default());
        let seen = Arc::new(Mutex::new(None));
        let registration = MessageUpdateHandler::registration(table(&seen, None));

        let update = Update::new(1, UpdatePayload::Message(text_message("hi")));
        let ctx = context(&bot, update.clone());
        let result = registration
            .build(&ctx)
            .handle(&update, None, &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(result, None);
        assert_eq!(*seen.lock(), Some((UpdateKind::Message, None)));
    }

    #[test]
    fn test_filter_accepts_message_kinds_only() {
        let seen = Arc::new(Mutex::new(None));
        let registration = MessageUpdateHandler::registration(table(&seen, None));
        let meta = registration.metadata();

        let post = Update::new(1, UpdatePayload::ChannelPost(text_message("x")));
        let callback = Update::new(2, UpdatePayload::CallbackQuery(CallbackQuery::default()));

        assert!(meta.should_process(&post, None));
        assert!(!meta.should_process(&callback, None));
    }
}

use std::sync::Arc;

use async_trait::async_trait;
use switchyard_core::{BotApi, CallbackAnswer, Update, UpdateKind};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::{CallbackHandlers, ContextFn, UpdateFilter};
use crate::context::UpdateContext;
use crate::error::HandlerResult;
use crate::handler::{Handler, Registration};

/// Alert shown when a callback query handler ran out of time.
pub const TIMEOUT_ANSWER: &str = "Operation timed out. Please, try again.";

/// Dispatches callback queries and always answers them.
///
/// The decisive result of the callback table is sent as the answer; when no
/// handler decides an empty answer is sent so the client stops its spinner.
pub struct CallbackUpdateHandler<CC> {
    ctx: Arc<UpdateContext>,
    handlers: Arc<CallbackHandlers<CC>>,
    context: Option<ContextFn<Update, CC>>,
}

impl<CC> CallbackUpdateHandler<CC>
where
    CC: Send + Sync + 'static,
{
    pub fn registration(handlers: Arc<CallbackHandlers<CC>>) -> Registration<Update, (), bool> {
        Self::build_registration(handlers, None)
    }

    pub fn registration_with_context<F>(
        handlers: Arc<CallbackHandlers<CC>>,
        context: F,
    ) -> Registration<Update, (), bool>
    where
        F: Fn(&Update) -> Option<CC> + Send + Sync + 'static,
    {
        Self::build_registration(handlers, Some(Arc::new(context)))
    }

    fn build_registration(
        handlers: Arc<CallbackHandlers<CC>>,
        context: Option<ContextFn<Update, CC>>,
    ) -> Registration<Update, (), bool> {
        Registration::new(
            UpdateFilter::new([UpdateKind::CallbackQuery]),
            move |ctx| Self {
                ctx: Arc::clone(ctx),
                handlers: Arc::clone(&handlers),
                context: context.clone(),
            },
        )
    }
}

#[async_trait]
impl<CC> Handler<Update, (), bool> for CallbackUpdateHandler<CC>
where
    CC: Send + Sync + 'static,
{
    async fn handle(
        &self,
        update: &Update,
        _context: Option<&()>,
        cancel: &CancellationToken,
    ) -> HandlerResult<Option<bool>> {
        let Some(query) = update.callback_query() else {
            return Ok(None);
        };

        self.ctx.record("uid", query.from.id);
        self.ctx.record_opt("username", query.from.username.as_deref());
        self.ctx.record_opt("data", query.data.as_deref());

        let context = self.context.as_ref().and_then(|derive| derive(update));

        match self
            .handlers
            .dispatch(&self.ctx, query, context.as_ref(), cancel)
            .await
        {
            Ok(answer) => {
                let answer = answer.unwrap_or_default();
                self.ctx
                    .bot()
                    .answer_callback_query(&query.id, &answer, cancel)
                    .await?;
            }
            Err(err) if err.is_cancellation() && !self.ctx.is_caller_cancelled() => {
                // The handler token is already cancelled; answer on the caller's.
                let answer = CallbackAnswer::text(TIMEOUT_ANSWER).alert();
                if let Err(answer_err) = self
                    .ctx
                    .bot()
                    .answer_callback_query(&query.id, &answer, self.ctx.caller_token())
                    .await
                {
                    debug!(error = %answer_err, "failed to report callback timeout");
                }
                warn!(query_id = %query.id, "callback query timed out");
                return Err(err);
            }
            Err(err) => return Err(err),
        }

        Ok(Some(true))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::HandlerError;
    use crate::handler::Filter;
    use crate::update::test_support::RecordingBot;
    use serde_json::json;
    use switchyard_core::{ApiError, BoxedBot, CallbackQuery, UpdatePayload, User};

    enum Behaviour {
        Answer(&'static str),
        Decline,
        Fail(fn() -> HandlerError),
    }

    struct Scripted(Behaviour);

    #[async_trait]
    impl Handler<CallbackQuery, (), CallbackAnswer> for Scripted {
        async fn handle(
            &self,
            _query: &CallbackQuery,
            _context: Option<&()>,
            _cancel: &CancellationToken,
        ) -> HandlerResult<Option<CallbackAnswer>> {
            match &self.0 {
                Behaviour::Answer(text) => Ok(Some(CallbackAnswer::text(*text))),
                Behaviour::Decline => Ok(None),
                Behaviour::Fail(make) => Err(make()),
            }
        }
    }

    fn callback_update() -> Update {
        Update::new(
            3,
            UpdatePayload::CallbackQuery(CallbackQuery {
                id: "cb-1".into(),
                from: User {
                    id: 11,
                    username: Some("bob".into()),
                    ..Default::default()
                },
                data: Some("vote:1".into()),
                ..Default::default()
            }),
        )
    }

    async fn run(
        bot: &Arc<RecordingBot>,
        behaviour: Behaviour,
        caller: CancellationToken,
    ) -> (HandlerResult<Option<bool>>, Arc<UpdateContext>) {
        let handlers = Arc::new(
            CallbackHandlers::<()>::new()
                .with(Registration::shared(Filter::always(), Scripted(behaviour))),
        );
        let update = callback_update();
        let ctx = UpdateContext::new(Arc::clone(bot) as BoxedBot, update.clone(), caller);
        let result = CallbackUpdateHandler::registration(handlers)
            .build(&ctx)
            .handle(&update, None, &ctx.caller_token().child_token())
            .await;
        (result, ctx)
    }

    #[tokio::test]
    async fn test_answers_with_handler_result() {
        let bot = Arc::new(RecordingBot::default());
        let (result, ctx) = run(&bot, Behaviour::Answer("Voted"), CancellationToken::new()).await;

        assert_eq!(result.unwrap(), Some(true));
        let answer = bot.find("answerCallbackQuery").unwrap();
        assert_eq!(answer.params, json!({ "callback_query_id": "cb-1", "text": "Voted" }));

        let properties = ctx.properties();
        assert_eq!(properties["uid"], "11");
        assert_eq!(properties["username"], "bob");
        assert_eq!(properties["data"], "vote:1");
    }

    #[tokio::test]
    async fn test_answers_even_when_declined() {
        let bot = Arc::new(RecordingBot::default());
        let (result, _) = run(&bot, Behaviour::Decline, CancellationToken::new()).await;

        assert_eq!(result.unwrap(), Some(true));
        let answer = bot.find("answerCallbackQuery").unwrap();
        assert_eq!(answer.params, json!({ "callback_query_id": "cb-1" }));
    }

    #[tokio::test]
    async fn test_internal_timeout_answers_with_alert() {
        let bot = Arc::new(RecordingBot::default());
        let (result, _) = run(
            &bot,
            Behaviour::Fail(|| HandlerError::Api(ApiError::Timeout)),
            CancellationToken::new(),
        )
        .await;

        assert!(result.unwrap_err().is_cancellation());
        let answer = bot.find("answerCallbackQuery").unwrap();
        assert_eq!(answer.params["text"], TIMEOUT_ANSWER);
        assert_eq!(answer.params["show_alert"], true);
    }

    #[tokio::test]
    async fn test_caller_cancellation_is_not_answered() {
        let bot = Arc::new(RecordingBot::default());
        let caller = CancellationToken::new();
        caller.cancel();

        let (result, _) = run(&bot, Behaviour::Fail(|| HandlerError::Cancelled), caller).await;

        assert!(matches!(result.unwrap_err(), HandlerError::Cancelled));
        assert!(bot.requests.lock().is_empty());
    }

    #[tokio::test]
    async fn test_other_errors_propagate_without_answer() {
        let bot = Arc::new(RecordingBot::default());
        let (result, _) = run(
            &bot,
            Behaviour::Fail(|| HandlerError::other("broken")),
            CancellationToken::new(),
        )
        .await;

        assert!(matches!(result.unwrap_err(), HandlerError::Other(_)));
        assert!(bot.find("answerCallbackQuery").is_none());
    }
}

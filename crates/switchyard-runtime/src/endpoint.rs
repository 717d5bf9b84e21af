//! Inbound update boundary.
//!
//! [`Endpoint::receive`] is what a webhook host calls with the route token
//! taken from the request path and the raw body. It resolves the bot,
//! parses the update and runs the update handler table inside an `update`
//! span. The returned [`Outcome`] tells the host how to answer.
//!
//! Cancellation is split in two: the host's token aborts handling as
//! [`Outcome::CallerCancelled`], while the optional handler timeout cancels
//! only a child token and yields [`Outcome::TimedOut`], which the platform
//! may redeliver. Either way the update-kind handlers get a short grace
//! period to wind down, so a timed out callback query is still answered.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use switchyard_core::{BoxedBot, Update};
use switchyard_framework::{HandlerError, HandlerResult, UpdateContext, UpdateHandlers};
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, debug, error, info, info_span, warn};

use crate::registry::BotRegistry;
use crate::webhook::WebhookRoutes;

/// How long cancelled handlers may take to wind down.
pub const DEFAULT_CANCEL_GRACE: Duration = Duration::from_secs(5);

/// How handling an inbound update ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// A handler decided `true`.
    Handled,
    /// A handler decided `false`.
    Declined,
    /// No handler decided.
    Unhandled,
    /// The host cancelled the request.
    CallerCancelled,
    /// The internal handler timeout fired.
    TimedOut,
    /// A handler failed.
    Failed,
    /// The body was not a valid update.
    Malformed,
    /// The route token did not resolve to a registered bot.
    UnknownRoute,
}

impl Outcome {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Handled => "handled",
            Self::Declined => "declined",
            Self::Unhandled => "unhandled",
            Self::CallerCancelled => "caller_cancelled",
            Self::TimedOut => "timed_out",
            Self::Failed => "failed",
            Self::Malformed => "malformed",
            Self::UnknownRoute => "unknown_route",
        }
    }

    /// Whether the host should acknowledge delivery to the platform.
    pub fn acknowledges(self) -> bool {
        !matches!(self, Self::UnknownRoute)
    }

    /// Whether the platform should deliver the update again.
    pub fn is_retryable(self) -> bool {
        matches!(self, Self::TimedOut)
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Entry point for inbound updates.
pub struct Endpoint {
    registry: Arc<BotRegistry>,
    routes: Arc<WebhookRoutes>,
    handlers: Arc<UpdateHandlers>,
    handler_timeout: Option<Duration>,
    cancel_grace: Duration,
}

impl Endpoint {
    pub fn new(
        registry: Arc<BotRegistry>,
        routes: Arc<WebhookRoutes>,
        handlers: Arc<UpdateHandlers>,
    ) -> Self {
        Self {
            registry,
            routes,
            handlers,
            handler_timeout: None,
            cancel_grace: DEFAULT_CANCEL_GRACE,
        }
    }

    /// Cancels handling that runs longer than `timeout`.
    pub fn with_handler_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.handler_timeout = timeout;
        self
    }

    /// Time handlers get to wind down after cancellation before they are
    /// dropped.
    pub fn with_cancel_grace(mut self, grace: Duration) -> Self {
        self.cancel_grace = grace;
        self
    }

    /// Number of top-level update handlers.
    pub fn handler_count(&self) -> usize {
        self.handlers.len()
    }

    /// Handles a webhook delivery for `route_token`.
    pub async fn receive(
        &self,
        route_token: &str,
        body: &[u8],
        cancel: &CancellationToken,
    ) -> Outcome {
        let Some(bot_id) = self.routes.resolve(route_token) else {
            warn!("Webhook request for an invalid route");
            return Outcome::UnknownRoute;
        };
        let Some(bot) = self.registry.get(bot_id) else {
            warn!(bot_id, "Webhook request for an unregistered bot");
            return Outcome::UnknownRoute;
        };

        let update: Update = match serde_json::from_slice(body) {
            Ok(update) => update,
            Err(err) => {
                warn!(
                    bot_id,
                    error = %err,
                    line = err.line(),
                    column = err.column(),
                    "Malformed update payload"
                );
                return Outcome::Malformed;
            }
        };

        self.handle(bot, update, cancel).await
    }

    /// Dispatches an already parsed update.
    pub async fn handle(&self, bot: BoxedBot, update: Update, cancel: &CancellationToken) -> Outcome {
        let span = info_span!(
            "update",
            bot_id = bot.id(),
            update_id = update.id,
            kind = %update.kind()
        );

        async move {
            let ctx = UpdateContext::new(bot, update, cancel.clone());
            let handler_token = cancel.child_token();
            let result = self.dispatch(&ctx, &handler_token).await;
            let outcome = classify(result, &ctx);

            let properties = ctx.properties();
            match outcome {
                Outcome::Failed | Outcome::TimedOut => {
                    info!(outcome = %outcome, ?properties, "Update completed")
                }
                _ => debug!(outcome = %outcome, ?properties, "Update completed"),
            }
            outcome
        }
        .instrument(span)
        .await
    }

    async fn dispatch(
        &self,
        ctx: &Arc<UpdateContext>,
        token: &CancellationToken,
    ) -> HandlerResult<Option<bool>> {
        let update = Arc::clone(ctx.update());
        let dispatch = self
            .handlers
            .dispatch_cooperative(ctx, &update, None, token);
        tokio::pin!(dispatch);

        let deadline = async {
            match self.handler_timeout {
                Some(limit) => tokio::time::sleep(limit).await,
                None => std::future::pending::<()>().await,
            }
        };

        tokio::select! {
            result = &mut dispatch => return result,
            _ = deadline => token.cancel(),
            _ = token.cancelled() => {}
        }

        match tokio::time::timeout(self.cancel_grace, dispatch).await {
            Ok(result) => result,
            Err(_) => {
                debug!(grace_ms = self.cancel_grace.as_millis() as u64, "handlers ignored cancellation");
                Err(HandlerError::Cancelled)
            }
        }
    }
}

fn classify(result: HandlerResult<Option<bool>>, ctx: &UpdateContext) -> Outcome {
    match result {
        Ok(Some(true)) => Outcome::Handled,
        Ok(Some(false)) => Outcome::Declined,
        Ok(None) => Outcome::Unhandled,
        Err(err) if err.is_cancellation() => {
            if ctx.is_caller_cancelled() {
                debug!("Update cancelled by caller");
                Outcome::CallerCancelled
            } else {
                warn!(error = %err, "Update handling timed out");
                Outcome::TimedOut
            }
        }
        Err(HandlerError::Api(err)) if err.is_benign() => {
            debug!(error = %err, "Update handling hit a benign API error");
            Outcome::Failed
        }
        Err(err) => {
            error!(error = %err, "Update handling failed");
            Outcome::Failed
        }
    }
}

impl fmt::Debug for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Endpoint")
            .field("handlers", &self.handlers.len())
            .field("handler_timeout", &self.handler_timeout)
            .field("cancel_grace", &self.cancel_grace)
            .finish_non_exhaustive()
    }
}

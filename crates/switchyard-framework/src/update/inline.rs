use std::sync::Arc;

use async_trait::async_trait;
use switchyard_core::{Update, UpdateKind};
use tokio_util::sync::CancellationToken;

use super::{InlineHandlers, UpdateFilter};
use crate::context::UpdateContext;
use crate::error::HandlerResult;
use crate::handler::{Handler, Registration};

/// Dispatches inline queries; the inline table's decision is the update's.
pub struct InlineQueryUpdateHandler {
    ctx: Arc<UpdateContext>,
    handlers: Arc<InlineHandlers>,
}

impl InlineQueryUpdateHandler {
    pub fn registration(handlers: Arc<InlineHandlers>) -> Registration<Update, (), bool> {
        Registration::new(
            UpdateFilter::new([UpdateKind::InlineQuery]),
            move |ctx| Self {
                ctx: Arc::clone(ctx),
                handlers: Arc::clone(&handlers),
            },
        )
    }
}

#[async_trait]
impl Handler<Update, (), bool> for InlineQueryUpdateHandler {
    async fn handle(
        &self,
        update: &Update,
        _context: Option<&()>,
        cancel: &CancellationToken,
    ) -> HandlerResult<Option<bool>> {
        let Some(query) = update.inline_query() else {
            return Ok(None);
        };

        self.ctx.record("uid", query.from.id);
        self.ctx.record_opt("username", query.from.username.as_deref());
        self.ctx.record("query", &query.query);

        self.handlers.dispatch(&self.ctx, query, None, cancel).await
    }
}

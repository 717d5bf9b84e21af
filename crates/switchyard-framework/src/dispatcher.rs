//! Ordered, first-responder-wins dispatch.
//!
//! A [`HandlerSet`] holds the registrations for one kind of data, sorted once
//! by ascending [`order`](crate::HandlerMetadata::order). Sorting is stable,
//! so registrations with equal priority keep the order they were added in.
//!
//! When data is dispatched:
//!
//! 1. Registrations are visited in priority order
//! 2. A registration whose metadata rejects the data is skipped without
//!    building its handler
//! 3. Otherwise the handler is built and awaited; the next one does not start
//!    until it completes
//! 4. The first `Some` result ends the dispatch and is returned
//!
//! ```rust,ignore
//! let handlers = HandlerSet::new()
//!     .with(Registration::shared(Filter::always().order(10), Fallback))
//!     .with(Registration::new(CommandMeta::new("help", "Show help"), |ctx| Help::new(ctx)));
//!
//! let decision = handlers.dispatch(&ctx, &entity, None, &cancel).await?;
//! ```

use std::fmt;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

use crate::context::UpdateContext;
use crate::error::{HandlerError, HandlerResult};
use crate::handler::Registration;

/// An ordered collection of handler registrations.
pub struct HandlerSet<D, C, R> {
    registrations: Vec<Registration<D, C, R>>,
}

impl<D, C, R> Default for HandlerSet<D, C, R> {
    fn default() -> Self {
        Self {
            registrations: Vec::new(),
        }
    }
}

impl<D, C, R> HandlerSet<D, C, R> {
    /// Creates an empty set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a registration, keeping the set ordered.
    pub fn add(&mut self, registration: Registration<D, C, R>) {
        self.registrations.push(registration);
        self.registrations.sort_by_key(Registration::order);
    }

    /// Adds a registration (builder pattern).
    pub fn with(mut self, registration: Registration<D, C, R>) -> Self {
        self.add(registration);
        self
    }

    /// Registrations in dispatch order.
    pub fn iter(&self) -> impl Iterator<Item = &Registration<D, C, R>> {
        self.registrations.iter()
    }

    pub fn len(&self) -> usize {
        self.registrations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.registrations.is_empty()
    }
}

impl<D, C, R> FromIterator<Registration<D, C, R>> for HandlerSet<D, C, R> {
    fn from_iter<I: IntoIterator<Item = Registration<D, C, R>>>(iter: I) -> Self {
        let mut registrations: Vec<_> = iter.into_iter().collect();
        registrations.sort_by_key(Registration::order);
        Self { registrations }
    }
}

impl<D, C, R> HandlerSet<D, C, R>
where
    D: Sync,
    C: Sync,
    R: Send,
{
    /// Runs applicable handlers in order until one returns a decision.
    ///
    /// Returns `Ok(None)` when every handler declined or none applied.
    /// Cancelling `cancel` aborts the pending handler with
    /// [`HandlerError::Cancelled`]; errors raised by a handler propagate
    /// unchanged.
    pub async fn dispatch(
        &self,
        ctx: &Arc<UpdateContext>,
        data: &D,
        context: Option<&C>,
        cancel: &CancellationToken,
    ) -> HandlerResult<Option<R>> {
        self.run(ctx, data, context, cancel, true).await
    }

    /// Like [`dispatch`](Self::dispatch), but a pending handler is left to
    /// observe `cancel` itself and is awaited until it returns.
    ///
    /// Meant for tables whose handlers dispatch nested tables and still have
    /// work to do once those are cancelled, such as answering a callback
    /// query. Bound the wait from the outside.
    pub async fn dispatch_cooperative(
        &self,
        ctx: &Arc<UpdateContext>,
        data: &D,
        context: Option<&C>,
        cancel: &CancellationToken,
    ) -> HandlerResult<Option<R>> {
        self.run(ctx, data, context, cancel, false).await
    }

    async fn run(
        &self,
        ctx: &Arc<UpdateContext>,
        data: &D,
        context: Option<&C>,
        cancel: &CancellationToken,
        race_cancel: bool,
    ) -> HandlerResult<Option<R>> {
        for registration in &self.registrations {
            if cancel.is_cancelled() {
                return Err(HandlerError::Cancelled);
            }

            if !registration.metadata().should_process(data, context) {
                trace!(handler = registration.name(), "handler skipped");
                continue;
            }

            let handler = registration.build(ctx);
            let pending = handler.handle(data, context, cancel);
            let result = if race_cancel {
                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => return Err(HandlerError::Cancelled),
                    result = pending => result?,
                }
            } else {
                pending.await?
            };

            if let Some(result) = result {
                debug!(
                    handler = registration.name(),
                    order = registration.order(),
                    "handler decided"
                );
                return Ok(Some(result));
            }

            trace!(handler = registration.name(), "handler declined");
        }

        Ok(None)
    }
}

impl<D, C, R> Clone for HandlerSet<D, C, R> {
    fn clone(&self) -> Self {
        Self {
            registrations: self.registrations.clone(),
        }
    }
}

impl<D, C, R> fmt::Debug for HandlerSet<D, C, R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.registrations.iter()).finish()
    }
}

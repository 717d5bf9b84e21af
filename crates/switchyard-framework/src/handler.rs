//! Handler system for the Switchyard framework.
//!
//! A handler chain is an explicit table of [`Registration`]s. Each
//! registration pairs a factory, which builds a handler bound to the current
//! [`UpdateContext`], with [`HandlerMetadata`] describing its priority and
//! applicability. Handlers are only materialized when their metadata accepts
//! the data being dispatched.
//!
//! # Example
//!
//! ```rust,ignore
//! struct Echo { bot: BoxedBot }
//!
//! #[async_trait]
//! impl Handler<Message, MessageContext<()>, bool> for Echo {
//!     async fn handle(&self, message: &Message, _: Option<&MessageContext<()>>, cancel: &CancellationToken)
//!         -> HandlerResult<Option<bool>>
//!     {
//!         self.bot.send_message(message.chat.id, message.text(), cancel).await?;
//!         Ok(Some(true))
//!     }
//! }
//!
//! let registration = Registration::new(Filter::always(), |ctx| Echo { bot: ctx.bot().clone() });
//! ```

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::context::UpdateContext;
use crate::error::HandlerResult;

// ============================================================================
// Handler Trait
// ============================================================================

/// A unit of logic that may act on `D` and produce a decisive `R`.
///
/// Returning `Ok(None)` declines; the dispatch moves on to the next handler.
#[async_trait]
pub trait Handler<D, C, R>: Send + Sync {
    async fn handle(
        &self,
        data: &D,
        context: Option<&C>,
        cancel: &CancellationToken,
    ) -> HandlerResult<Option<R>>;
}

/// A shared handler trait object.
pub type BoxedHandler<D, C, R> = Arc<dyn Handler<D, C, R>>;

// ============================================================================
// Metadata
// ============================================================================

/// Static description of a registered handler.
pub trait HandlerMetadata<D, C>: Send + Sync {
    /// Priority; lower values run first.
    fn order(&self) -> i32 {
        0
    }

    /// Whether the handler applies to `data` in `context`.
    fn should_process(&self, data: &D, context: Option<&C>) -> bool;

    /// Human-readable line shown in command listings.
    fn description(&self) -> Option<String> {
        None
    }
}

impl<D, C, M> HandlerMetadata<D, C> for Arc<M>
where
    M: HandlerMetadata<D, C> + ?Sized,
{
    fn order(&self) -> i32 {
        (**self).order()
    }

    fn should_process(&self, data: &D, context: Option<&C>) -> bool {
        (**self).should_process(data, context)
    }

    fn description(&self) -> Option<String> {
        (**self).description()
    }
}

type Predicate<D, C> = Arc<dyn Fn(&D, Option<&C>) -> bool + Send + Sync>;

/// Closure-backed metadata for handlers that need no dedicated type.
pub struct Filter<D, C> {
    order: i32,
    description: Option<String>,
    predicate: Predicate<D, C>,
}

impl<D, C> Filter<D, C> {
    /// Metadata that accepts everything.
    pub fn always() -> Self {
        Self::new(|_, _| true)
    }

    /// Metadata accepting whatever `predicate` accepts.
    pub fn new<F>(predicate: F) -> Self
    where
        F: Fn(&D, Option<&C>) -> bool + Send + Sync + 'static,
    {
        Self {
            order: 0,
            description: None,
            predicate: Arc::new(predicate),
        }
    }

    pub fn order(mut self, order: i32) -> Self {
        self.order = order;
        self
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

impl<D, C> HandlerMetadata<D, C> for Filter<D, C> {
    fn order(&self) -> i32 {
        self.order
    }

    fn should_process(&self, data: &D, context: Option<&C>) -> bool {
        (self.predicate)(data, context)
    }

    fn description(&self) -> Option<String> {
        self.description.clone()
    }
}

// ============================================================================
// Registration
// ============================================================================

type Factory<D, C, R> = Arc<dyn Fn(&Arc<UpdateContext>) -> BoxedHandler<D, C, R> + Send + Sync>;

/// A (factory, metadata) pair.
pub struct Registration<D, C, R> {
    name: &'static str,
    factory: Factory<D, C, R>,
    meta: Arc<dyn HandlerMetadata<D, C>>,
}

impl<D: 'static, C: 'static, R: 'static> Registration<D, C, R> {
    /// Registers a handler built per update by `factory`.
    pub fn new<M, H, F>(meta: M, factory: F) -> Self
    where
        M: HandlerMetadata<D, C> + 'static,
        H: Handler<D, C, R> + 'static,
        F: Fn(&Arc<UpdateContext>) -> H + Send + Sync + 'static,
    {
        Self {
            name: std::any::type_name::<H>(),
            factory: Arc::new(move |ctx| Arc::new(factory(ctx)) as BoxedHandler<D, C, R>),
            meta: Arc::new(meta),
        }
    }

    /// Registers one handler instance shared by every update.
    pub fn shared<M, H>(meta: M, handler: H) -> Self
    where
        M: HandlerMetadata<D, C> + 'static,
        H: Handler<D, C, R> + 'static,
    {
        let handler: BoxedHandler<D, C, R> = Arc::new(handler);
        Self {
            name: std::any::type_name::<H>(),
            factory: Arc::new(move |_| Arc::clone(&handler)),
            meta: Arc::new(meta),
        }
    }
}

impl<D, C, R> Registration<D, C, R> {
    /// Type name of the registered handler.
    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn metadata(&self) -> &dyn HandlerMetadata<D, C> {
        self.meta.as_ref()
    }

    pub fn order(&self) -> i32 {
        self.meta.order()
    }

    /// Materializes the handler for `ctx`.
    pub fn build(&self, ctx: &Arc<UpdateContext>) -> BoxedHandler<D, C, R> {
        (self.factory)(ctx)
    }
}

impl<D, C, R> Clone for Registration<D, C, R> {
    fn clone(&self) -> Self {
        Self {
            name: self.name,
            factory: Arc::clone(&self.factory),
            meta: Arc::clone(&self.meta),
        }
    }
}

impl<D, C, R> fmt::Debug for Registration<D, C, R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registration")
            .field("name", &self.name)
            .field("order", &self.meta.order())
            .finish_non_exhaustive()
    }
}

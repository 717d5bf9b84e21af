//! Update-kind handlers.
//!
//! The update table is the entry point of every dispatch: its registrations
//! carry [`UpdateFilter`] metadata and fan out into the per-kind tables.
//!
//! ```text
//! UpdateHandlers ──▶ MessageUpdateHandler ──▶ MessageHandlers ──▶ TextMessageHandler ──▶ EntityHandlers
//!                ──▶ CallbackUpdateHandler ─▶ CallbackHandlers
//!                ──▶ InlineQueryUpdateHandler ─▶ InlineHandlers
//! ```

mod callback;
mod inline;
mod message;
mod text;

pub use callback::{CallbackUpdateHandler, TIMEOUT_ANSWER};
pub use inline::InlineQueryUpdateHandler;
pub use message::MessageUpdateHandler;
pub use text::{LIST_COMMANDS, TextMessageHandler};

use std::sync::Arc;

use switchyard_core::{CallbackAnswer, CallbackQuery, EntityRef, InlineQuery, Message, Update, UpdateKind};

use crate::dispatcher::HandlerSet;
use crate::handler::HandlerMetadata;

/// Context handed to message handlers: the update kind and an optional
/// application value derived from the message.
pub type MessageContext<MC> = (UpdateKind, Option<MC>);

/// Top-level table; `true` means the update was handled.
pub type UpdateHandlers = HandlerSet<Update, (), bool>;
pub type MessageHandlers<MC, R> = HandlerSet<Arc<Message>, MessageContext<MC>, R>;
pub type EntityHandlers<MC, R> = HandlerSet<EntityRef, MC, R>;
pub type CallbackHandlers<CC> = HandlerSet<CallbackQuery, CC, CallbackAnswer>;
pub type InlineHandlers = HandlerSet<InlineQuery, (), bool>;

/// Derives an application context from inbound data.
pub type ContextFn<T, C> = Arc<dyn Fn(&T) -> Option<C> + Send + Sync>;

/// Metadata accepting a fixed set of update kinds.
#[derive(Debug, Clone)]
pub struct UpdateFilter {
    kinds: Vec<UpdateKind>,
}

impl UpdateFilter {
    pub fn new(kinds: impl IntoIterator<Item = UpdateKind>) -> Self {
        Self {
            kinds: kinds.into_iter().collect(),
        }
    }

    pub fn kinds(&self) -> &[UpdateKind] {
        &self.kinds
    }
}

impl<C> HandlerMetadata<Update, C> for UpdateFilter {
    fn should_process(&self, update: &Update, _context: Option<&C>) -> bool {
        self.kinds.contains(&update.kind())
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use switchyard_core::UpdatePayload;

    #[test]
    fn test_update_filter() {
        let filter = UpdateFilter::new([UpdateKind::CallbackQuery]);
        let callback = Update::new(1, UpdatePayload::CallbackQuery(CallbackQuery::default()));
        let unknown = Update::new(2, UpdatePayload::Unknown);

        assert!(HandlerMetadata::<Update, ()>::should_process(&filter, &callback, None));
        assert!(!HandlerMetadata::<Update, ()>::should_process(&filter, &unknown, None));
        assert_eq!(HandlerMetadata::<Update, ()>::order(&filter), 0);
    }
}

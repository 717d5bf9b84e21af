//! Per-update context.
//!
//! One [`UpdateContext`] is created for every inbound update and shared by
//! every handler factory invoked while dispatching it. It carries the bot the
//! update was addressed to, the update itself, the caller's cancellation
//! token and a bag of telemetry properties the boundary reports once the
//! update completes.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;
use switchyard_core::{BoxedBot, Update};
use tokio_util::sync::CancellationToken;

/// The shared context for a single update dispatch.
pub struct UpdateContext {
    bot: BoxedBot,
    update: Arc<Update>,
    caller: CancellationToken,
    properties: Mutex<BTreeMap<&'static str, String>>,
}

impl UpdateContext {
    /// Creates a context for `update`, cancelled only when `caller` is.
    pub fn new(bot: BoxedBot, update: Update, caller: CancellationToken) -> Arc<Self> {
        Arc::new(Self {
            bot,
            update: Arc::new(update),
            caller,
            properties: Mutex::new(BTreeMap::new()),
        })
    }

    /// The bot the update was delivered to.
    pub fn bot(&self) -> &BoxedBot {
        &self.bot
    }

    pub fn update(&self) -> &Arc<Update> {
        &self.update
    }

    /// The token of whoever delivered the update.
    ///
    /// Handlers receive a child of this token; when the child is cancelled but
    /// this one is not, the cancellation came from an internal timeout.
    pub fn caller_token(&self) -> &CancellationToken {
        &self.caller
    }

    /// Returns `true` if the caller requested cancellation.
    pub fn is_caller_cancelled(&self) -> bool {
        self.caller.is_cancelled()
    }

    /// Records a telemetry property, replacing any previous value.
    pub fn record(&self, key: &'static str, value: impl fmt::Display) {
        self.properties.lock().insert(key, value.to_string());
    }

    /// Records a property only when `value` is present.
    pub fn record_opt(&self, key: &'static str, value: Option<impl fmt::Display>) {
        if let Some(value) = value {
            self.record(key, value);
        }
    }

    /// Returns a snapshot of the recorded properties.
    pub fn properties(&self) -> BTreeMap<&'static str, String> {
        self.properties.lock().clone()
    }
}

impl fmt::Debug for UpdateContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UpdateContext")
            .field("bot_id", &self.bot.id())
            .field("update_id", &self.update.id)
            .field("kind", &self.update.kind())
            .finish_non_exhaustive()
    }
}

//! Registry of the bots served by this process.

use std::collections::BTreeMap;

use parking_lot::RwLock;
use switchyard_core::BoxedBot;
use tracing::info;

use crate::error::{RuntimeError, RuntimeResult};

/// Bots keyed by their numeric id.
///
/// Iteration is in ascending id order.
#[derive(Default)]
pub struct BotRegistry {
    bots: RwLock<BTreeMap<i64, BoxedBot>>,
}

impl BotRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `bot` under its own id.
    pub fn register(&self, bot: BoxedBot) -> RuntimeResult<()> {
        let id = bot.id();
        let mut bots = self.bots.write();
        if bots.contains_key(&id) {
            return Err(RuntimeError::BotExists(id));
        }
        bots.insert(id, bot);
        info!(bot_id = id, "Registered bot");
        Ok(())
    }

    pub fn unregister(&self, id: i64) -> RuntimeResult<BoxedBot> {
        let bot = self
            .bots
            .write()
            .remove(&id)
            .ok_or(RuntimeError::BotNotFound(id))?;
        info!(bot_id = id, "Unregistered bot");
        Ok(bot)
    }

    pub fn get(&self, id: i64) -> Option<BoxedBot> {
        self.bots.read().get(&id).cloned()
    }

    pub fn ids(&self) -> Vec<i64> {
        self.bots.read().keys().copied().collect()
    }

    /// Snapshot of every registered bot.
    pub fn all(&self) -> Vec<BoxedBot> {
        self.bots.read().values().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.bots.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.bots.read().is_empty()
    }
}

impl std::fmt::Debug for BotRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BotRegistry")
            .field("bots", &self.ids())
            .finish()
    }
}

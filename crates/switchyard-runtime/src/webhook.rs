//! Guarded webhook routes.
//!
//! Each bot is reachable under `<path>/<token>`, where the token encodes the
//! bot id together with the bot's current secret salt. A request is only
//! accepted when the salt decoded from its token equals the salt the
//! provider reports now, so rotating a salt revokes every route issued
//! before the rotation.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use parking_lot::RwLock;
use switchyard_core::EncodedId;
use tracing::{debug, info};

use crate::config::WebhookConfig;

/// Token payload: bot id plus salt.
pub type RouteId = EncodedId<i64, i32>;

/// Source of per-bot route salts.
pub trait SaltProvider: Send + Sync {
    /// The salt currently valid for `bot_id`, or `None` for unsalted routes.
    fn current_salt(&self, bot_id: i64) -> Option<i32>;
}

/// Every route uses salt zero.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoSalt;

impl SaltProvider for NoSalt {
    fn current_salt(&self, _bot_id: i64) -> Option<i32> {
        None
    }
}

/// In-memory salts that can be rotated at runtime.
#[derive(Debug, Default)]
pub struct StaticSalts {
    salts: RwLock<HashMap<i64, i32>>,
}

impl StaticSalts {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(self, bot_id: i64, salt: i32) -> Self {
        self.set(bot_id, salt);
        self
    }

    /// Sets or rotates the salt of `bot_id`.
    pub fn set(&self, bot_id: i64, salt: i32) {
        let previous = self.salts.write().insert(bot_id, salt);
        if previous.is_some_and(|old| old != salt) {
            info!(bot_id, "Webhook salt rotated");
        }
    }

    pub fn remove(&self, bot_id: i64) {
        self.salts.write().remove(&bot_id);
    }
}

impl SaltProvider for StaticSalts {
    fn current_salt(&self, bot_id: i64) -> Option<i32> {
        self.salts.read().get(&bot_id).copied()
    }
}

/// Generates and validates guarded webhook routes.
pub struct WebhookRoutes {
    salts: Arc<dyn SaltProvider>,
    base_url: Option<String>,
    path: String,
}

impl WebhookRoutes {
    /// Routes mounted under `path` with no salts.
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            salts: Arc::new(NoSalt),
            base_url: None,
            path: path.into(),
        }
    }

    pub fn from_config(config: &WebhookConfig) -> Self {
        let routes = Self::new(config.path.clone());
        match &config.base_url {
            Some(url) => routes.with_base_url(url.clone()),
            None => routes,
        }
    }

    pub fn with_salts(mut self, salts: Arc<dyn SaltProvider>) -> Self {
        self.salts = salts;
        self
    }

    /// Public origin used by [`webhook_url`](Self::webhook_url).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    fn salt_for(&self, bot_id: i64) -> i32 {
        self.salts.current_salt(bot_id).unwrap_or(0)
    }

    /// The route token for `bot_id` under its current salt.
    pub fn route_token(&self, bot_id: i64) -> String {
        RouteId::new(bot_id, self.salt_for(bot_id)).encode()
    }

    /// `<path>/<token>`.
    pub fn route_path(&self, bot_id: i64) -> String {
        format!(
            "{}/{}",
            self.path.trim_end_matches('/'),
            self.route_token(bot_id)
        )
    }

    /// Absolute webhook URL, if a base URL is configured.
    pub fn webhook_url(&self, bot_id: i64) -> Option<String> {
        let base = self.base_url.as_deref()?;
        Some(format!(
            "{}{}",
            base.trim_end_matches('/'),
            self.route_path(bot_id)
        ))
    }

    /// Returns the bot id a route token was issued for, if it is still valid.
    pub fn resolve(&self, token: &str) -> Option<i64> {
        let route = RouteId::decode(token);
        if route.is_empty() {
            debug!("Malformed webhook route token");
            return None;
        }

        let expected = self.salt_for(route.id);
        if route.sub_id != expected {
            debug!(bot_id = route.id, "Webhook route salt mismatch");
            return None;
        }

        Some(route.id)
    }
}

impl fmt::Debug for WebhookRoutes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WebhookRoutes")
            .field("base_url", &self.base_url)
            .field("path", &self.path)
            .finish_non_exhaustive()
    }
}

//! Runtime error types.

use switchyard_core::ApiError;
use thiserror::Error;

use crate::config::ConfigError;

/// Errors that can occur during runtime operations.
#[derive(Error, Debug)]
pub enum RuntimeError {
    /// Bot not found.
    #[error("Bot not found: {0}")]
    BotNotFound(i64),

    /// Bot already exists.
    #[error("Bot already exists: {0}")]
    BotExists(i64),

    /// Webhook URLs need `webhook.base_url`.
    #[error("No webhook base URL configured")]
    MissingBaseUrl,

    /// An outbound call failed.
    #[error("Bot {bot_id}: {source}")]
    Api {
        bot_id: i64,
        #[source]
        source: ApiError,
    },

    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl RuntimeError {
    pub fn api(bot_id: i64, source: ApiError) -> Self {
        Self::Api { bot_id, source }
    }
}

/// Result type for runtime operations.
pub type RuntimeResult<T> = Result<T, RuntimeError>;

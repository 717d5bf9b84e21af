//! Configuration for the Switchyard runtime.
//!
//! Layered loading from files and `SWITCHYARD_*` environment variables,
//! followed by validation.

pub mod error;
pub mod loader;
pub mod schema;
pub mod validation;

pub use error::{ConfigError, ConfigResult};
pub use loader::{ConfigLoader, Profile, load_config};
pub use schema::{
    BotConfig, DispatchConfig, LimitConfig, LogFormat, LogOutput, LogRotation, LoggingConfig,
    ResilienceConfig, RetryConfig, SpanEventConfig, SwitchyardConfig, WebhookConfig,
};
pub use validation::validate_config;

//! Switchyard Runtime - hosting-facing layer of the Switchyard bot framework.
//!
//! This crate provides:
//! - Layered configuration (`ConfigLoader`, `SwitchyardConfig`)
//! - Logging setup (`LoggingBuilder`)
//! - The resilience policy cache and the outbound call pipeline
//!   (`PolicyCache`, `OutboundPipeline`, `ResilientBot`)
//! - Guarded webhook routes (`WebhookRoutes`)
//! - The inbound update boundary (`Endpoint`) and maintenance operations
//! - Runtime assembly (`Switchyard`)
//!
//! # Request Flow
//!
//! ```text
//! host ──▶ Endpoint::receive ──▶ WebhookRoutes::resolve ──▶ BotRegistry
//!                            └──▶ UpdateHandlers ──▶ handlers ──▶ ResilientBot ──▶ platform
//! ```
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use switchyard_runtime::Switchyard;
//!
//! let switchyard = Switchyard::builder().build(handlers)?;
//! switchyard.register_bot(client)?;
//! switchyard.maintenance().refresh(&cancel).await?;
//!
//! // For every webhook request:
//! let outcome = switchyard.endpoint().receive(token, &body, &cancel).await;
//! ```

pub mod config;
pub mod endpoint;
pub mod error;
pub mod logging;
pub mod maintenance;
pub mod pipeline;
pub mod policy;
pub mod registry;
pub mod runtime;
pub mod webhook;

#[cfg(test)]
mod testing;

// Re-exports
pub use config::{
    BotConfig, ConfigError, ConfigLoader, ConfigResult, LimitConfig, LoggingConfig, Profile,
    ResilienceConfig, SwitchyardConfig, WebhookConfig, load_config,
};
pub use endpoint::{Endpoint, Outcome};
pub use error::{RuntimeError, RuntimeResult};
pub use logging::{LoggingBuilder, SpanEvents};
pub use maintenance::{BotStatus, Maintenance};
pub use pipeline::{OutboundPipeline, ResilientBot};
pub use policy::{Expiration, PolicyCache, PolicyError, RateLimiter, RetryPolicy};
pub use registry::BotRegistry;
pub use runtime::{Switchyard, SwitchyardBuilder};
pub use webhook::{NoSalt, RouteId, SaltProvider, StaticSalts, WebhookRoutes};

// Re-export tracing for use by other crates
pub use tracing;
pub use tracing_subscriber;

/// Logging macros for handler code.
pub mod prelude {
    pub use tracing::{Level, debug, error, info, instrument, span, trace, warn};
}

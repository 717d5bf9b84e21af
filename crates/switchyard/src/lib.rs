//! # Switchyard
//!
//! A webhook-driven chat bot framework.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────┐     ┌──────────┐     ┌────────────────┐     ┌───────────────┐
//! │   Host   │────▶│ Endpoint │────▶│ UpdateHandlers │────▶│ Your handlers │──▶ ResilientBot ──▶ platform
//! │ (server) │     │ (route)  │     │  (ordered)     │     │               │
//! └──────────┘     └──────────┘     └────────────────┘     └───────────────┘
//! ```
//!
//! - **Core**: data model, the outbound [`Bot`](core::Bot) contract and the
//!   identity codec
//! - **Framework**: ordered first-responder-wins dispatch, the command
//!   matcher and the per-kind update handlers
//! - **Runtime**: configuration, logging, the resilience pipeline, webhook
//!   routes, the inbound endpoint and maintenance operations
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use switchyard::prelude::*;
//!
//! let commands = EntityHandlers::new()
//!     .with(Registration::new(CommandMeta::new("start", "Start over"), |ctx| Start::new(ctx)));
//! let messages = MessageHandlers::new()
//!     .with(TextMessageHandler::registration(Arc::new(commands)));
//! let handlers = UpdateHandlers::new()
//!     .with(MessageUpdateHandler::<(), bool>::registration(Arc::new(messages)));
//!
//! let switchyard = Switchyard::builder().build(handlers)?;
//! switchyard.register_bot(client)?;
//! ```
//!
//! ## Features
//!
//! - `toml-config`: TOML configuration files (default)
//! - `yaml-config`: YAML configuration files
//! - `json-log`: JSON log output

pub use switchyard_core as core;
pub use switchyard_framework as framework;
pub use switchyard_runtime as runtime;

/// Commonly used types for building bots.
///
/// ```rust,ignore
/// use switchyard::prelude::*;
/// ```
pub mod prelude {
    // Runtime - main entry point
    pub use switchyard_runtime::{Outcome, Switchyard, SwitchyardConfig};

    // Handler system
    pub use switchyard_framework::{
        CallbackHandlers, CallbackUpdateHandler, CommandMeta, EntityHandlers, Filter, Handler,
        HandlerError, HandlerMetadata, HandlerResult, InlineHandlers, InlineQueryUpdateHandler,
        MessageContext, MessageHandlers, MessageUpdateHandler, Registration, TextMessageHandler,
        UpdateContext, UpdateHandlers,
    };

    // Data model and outbound calls
    pub use switchyard_core::{
        ApiError, ApiResult, Bot, BotApi, BoxedBot, CallbackAnswer, CallbackQuery,
        CancellationToken, CommandScope, EntityRef, Message, Update, UpdateKind,
    };

    pub use switchyard_runtime::prelude::*;
}

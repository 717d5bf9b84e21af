//! # Switchyard Framework
//!
//! Dispatch layer of the Switchyard bot framework.
//!
//! This layer provides:
//! - The [`Handler`] trait and [`HandlerMetadata`] for priority and applicability
//! - Explicit registration tables ([`Registration`], [`HandlerSet`]) with
//!   first-responder-wins dispatch
//! - The command matcher ([`CommandMeta`]) with scope and alias support
//! - Update-kind handlers that fan an update out into message, entity,
//!   callback query and inline query tables
//!
//! ```text
//! Update ──▶ UpdateHandlers ──▶ MessageUpdateHandler ──▶ TextMessageHandler ──▶ CommandMeta + handler
//! ```

pub mod command;
pub mod context;
pub mod dispatcher;
pub mod error;
pub mod handler;
pub mod update;

pub use command::{AdministratorDirectory, CommandMeta, StaticAdministrators};
pub use context::UpdateContext;
pub use dispatcher::HandlerSet;
pub use error::{HandlerError, HandlerResult};
pub use handler::{BoxedHandler, Filter, Handler, HandlerMetadata, Registration};
pub use update::{
    CallbackHandlers, CallbackUpdateHandler, ContextFn, EntityHandlers, InlineHandlers,
    InlineQueryUpdateHandler, MessageContext, MessageHandlers, MessageUpdateHandler,
    TextMessageHandler, UpdateFilter, UpdateHandlers,
};

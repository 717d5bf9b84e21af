//! Command matching.
//!
//! [`CommandMeta`] is the metadata of an entity handler that answers a slash
//! command. It decides applicability in four steps:
//!
//! 1. The entity must be a bot command
//! 2. Its name (without the leading `/`) must equal the declared command or
//!    one of its aliases, ignoring case
//! 3. Any declared scope authorizing the chat and sender accepts it
//! 4. Otherwise the optional fallback predicate gets the last word
//!
//! The `@bot` qualifier is not checked here: the text handler drops entities
//! addressed to other bots before any metadata sees them.
//!
//! ```rust,ignore
//! let meta = CommandMeta::new("help", "Show help")
//!     .alias("h")
//!     .scope(CommandScope::AllPrivateChats)
//!     .scope(CommandScope::AllGroupChats);
//! ```

mod scope;

pub use scope::{AdminCheck, AdministratorDirectory, StaticAdministrators, scope_allows};

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use switchyard_core::{BotCommand, CommandScope, EntityRef};
use tracing::{trace, warn};

use crate::handler::HandlerMetadata;

type Fallback = Arc<dyn Fn(&EntityRef) -> bool + Send + Sync>;

/// Metadata of a command handler.
pub struct CommandMeta {
    command: BotCommand,
    aliases: Vec<String>,
    scopes: Vec<CommandScope>,
    order: i32,
    fallback: Option<Fallback>,
    admins: Option<Arc<dyn AdministratorDirectory>>,
    warned_admin_gap: AtomicBool,
}

impl CommandMeta {
    /// Declares `command` (without the leading `/`) with a menu description.
    pub fn new(command: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            command: BotCommand::new(command, description),
            aliases: Vec::new(),
            scopes: Vec::new(),
            order: 0,
            fallback: None,
            admins: None,
            warned_admin_gap: AtomicBool::new(false),
        }
    }

    /// Adds an alternative name.
    pub fn alias(mut self, alias: impl Into<String>) -> Self {
        self.aliases.push(alias.into());
        self
    }

    /// Adds a scope. Without any, the command uses [`CommandScope::Default`].
    pub fn scope(mut self, scope: CommandScope) -> Self {
        self.scopes.push(scope);
        self
    }

    pub fn order(mut self, order: i32) -> Self {
        self.order = order;
        self
    }

    /// Accepts entities for which no scope passed when `fallback` returns `true`.
    pub fn fallback<F>(mut self, fallback: F) -> Self
    where
        F: Fn(&EntityRef) -> bool + Send + Sync + 'static,
    {
        self.fallback = Some(Arc::new(fallback));
        self
    }

    /// Checks administrator scopes against `directory`.
    pub fn administrators(mut self, directory: Arc<dyn AdministratorDirectory>) -> Self {
        self.admins = Some(directory);
        self
    }

    /// The command as published to the platform.
    pub fn command(&self) -> &BotCommand {
        &self.command
    }

    pub fn aliases(&self) -> &[String] {
        &self.aliases
    }

    /// Declared scopes, or `[Default]` when none were declared.
    pub fn scopes(&self) -> &[CommandScope] {
        if self.scopes.is_empty() {
            &[CommandScope::Default]
        } else {
            &self.scopes
        }
    }

    /// Returns `true` if `name` is the command or one of its aliases.
    pub fn matches_name(&self, name: &str) -> bool {
        self.command.command.eq_ignore_ascii_case(name)
            || self.aliases.iter().any(|alias| alias.eq_ignore_ascii_case(name))
    }

    /// Returns `true` if any declared scope authorizes the entity's chat and sender.
    pub fn matches_scope(&self, entity: &EntityRef) -> bool {
        let check = self.admin_check();
        self.scopes()
            .iter()
            .any(|scope| scope_allows(scope, entity.chat(), entity.sender(), check))
    }

    /// Full applicability decision for `entity`.
    ///
    /// An empty probe entity skips the name check so command listings can ask
    /// which commands are usable in a chat.
    pub fn accepts(&self, entity: &EntityRef) -> bool {
        if !entity.is_command() {
            return false;
        }

        if !entity.is_probe() && !self.matches_name(entity.command_name()) {
            return false;
        }

        if self.matches_scope(entity) {
            return true;
        }

        let accepted = self.fallback.as_ref().is_some_and(|fallback| fallback(entity));
        trace!(
            command = %self.command.command,
            chat_id = entity.chat().id,
            accepted,
            "no scope matched, fallback consulted"
        );
        accepted
    }

    fn admin_check(&self) -> AdminCheck<'_> {
        match &self.admins {
            Some(directory) => AdminCheck::Directory(directory.as_ref()),
            None => {
                let uses_admin_scope = self.scopes.iter().any(|scope| {
                    matches!(
                        scope,
                        CommandScope::AllChatAdministrators | CommandScope::ChatAdministrators { .. }
                    )
                });
                if uses_admin_scope && !self.warned_admin_gap.swap(true, Ordering::Relaxed) {
                    warn!(
                        command = %self.command.command,
                        "administrator scope without an administrator directory, any group member is accepted"
                    );
                }
                AdminCheck::GroupMembership
            }
        }
    }
}

impl<C> HandlerMetadata<EntityRef, C> for CommandMeta {
    fn order(&self) -> i32 {
        self.order
    }

    fn should_process(&self, entity: &EntityRef, _context: Option<&C>) -> bool {
        self.accepts(entity)
    }

    fn description(&self) -> Option<String> {
        if self.command.description.is_empty() {
            return None;
        }
        Some(format!("/{} - {}", self.command.command, self.command.description))
    }
}

impl fmt::Debug for CommandMeta {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CommandMeta")
            .field("command", &self.command)
            .field("aliases", &self.aliases)
            .field("scopes", &self.scopes())
            .field("order", &self.order)
            .finish_non_exhaustive()
    }
}

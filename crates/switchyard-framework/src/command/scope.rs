//! Scope evaluation.
//!
//! Every [`CommandScope`] variant maps to one arm of [`scope_allows`].
//! Administrator scopes consult an [`AdministratorDirectory`] when one is
//! configured; without it they degrade to a group-membership check.

use std::collections::{HashMap, HashSet};

use parking_lot::RwLock;
use switchyard_core::{Chat, CommandScope, User};

/// Answers whether a user administers a chat.
///
/// Lookups are synchronous; implementations are expected to serve from a
/// cache refreshed out of band (for example from `getChatAdministrators`).
pub trait AdministratorDirectory: Send + Sync {
    fn is_administrator(&self, chat_id: i64, user_id: i64) -> bool;
}

/// An in-memory administrator list.
#[derive(Debug, Default)]
pub struct StaticAdministrators {
    chats: RwLock<HashMap<i64, HashSet<i64>>>,
}

impl StaticAdministrators {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the administrator list of `chat_id`.
    pub fn set(&self, chat_id: i64, users: impl IntoIterator<Item = i64>) {
        self.chats.write().insert(chat_id, users.into_iter().collect());
    }

    /// Adds a single administrator (builder pattern).
    pub fn with(self, chat_id: i64, user_id: i64) -> Self {
        self.chats.write().entry(chat_id).or_default().insert(user_id);
        self
    }
}

impl AdministratorDirectory for StaticAdministrators {
    fn is_administrator(&self, chat_id: i64, user_id: i64) -> bool {
        self.chats
            .read()
            .get(&chat_id)
            .is_some_and(|users| users.contains(&user_id))
    }
}

/// How administrator scopes are checked.
#[derive(Clone, Copy)]
pub enum AdminCheck<'a> {
    /// Look the sender up in a directory.
    Directory(&'a dyn AdministratorDirectory),
    /// No directory configured: any group member passes.
    GroupMembership,
}

impl AdminCheck<'_> {
    fn allows(self, chat: &Chat, sender: Option<&User>) -> bool {
        if !chat.kind.is_group() {
            return false;
        }
        match self {
            Self::Directory(directory) => {
                sender.is_some_and(|user| directory.is_administrator(chat.id, user.id))
            }
            Self::GroupMembership => true,
        }
    }
}

/// Returns `true` if `scope` authorizes a command in `chat` sent by `sender`.
pub fn scope_allows(
    scope: &CommandScope,
    chat: &Chat,
    sender: Option<&User>,
    admins: AdminCheck<'_>,
) -> bool {
    match *scope {
        CommandScope::Default => true,
        CommandScope::AllPrivateChats => chat.kind.is_private(),
        CommandScope::AllGroupChats => chat.kind.is_group(),
        CommandScope::AllChatAdministrators => admins.allows(chat, sender),
        CommandScope::Chat { chat_id } => chat.id == chat_id,
        CommandScope::ChatAdministrators { chat_id } => {
            chat.id == chat_id && admins.allows(chat, sender)
        }
        CommandScope::ChatMember { chat_id, user_id } => {
            chat.id == chat_id && sender.is_some_and(|user| user.id == user_id)
        }
    }
}

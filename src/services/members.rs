//! Chat administrators and the rights they hold

use std::fmt;
use std::sync::{Mutex, MutexGuard};

use ahash::{AHashMap, AHashSet};
use async_trait::async_trait;
use thiserror::Error;

/// Administrator rights a command may require
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Permission {
    PostMessages,
    EditMessages,
    DeleteMessages,
    RestrictMembers,
    PromoteMembers,
    ChangeInfo,
    InviteUsers,
    PinMessages,
}

impl fmt::Display for Permission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::PostMessages => "can_post_messages",
            Self::EditMessages => "can_edit_messages",
            Self::DeleteMessages => "can_delete_messages",
            Self::RestrictMembers => "can_restrict_members",
            Self::PromoteMembers => "can_promote_members",
            Self::ChangeInfo => "can_change_info",
            Self::InviteUsers => "can_invite_users",
            Self::PinMessages => "can_pin_messages",
        };
        write!(f, "{}", name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdminStatus {
    /// Holds every right, whatever the flags say
    Creator,
    Administrator,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatAdmin {
    pub user_id: i64,
    pub status: AdminStatus,
    pub permissions: AHashSet<Permission>,
}

impl ChatAdmin {
    pub fn creator(user_id: i64) -> Self {
        Self {
            user_id,
            status: AdminStatus::Creator,
            permissions: AHashSet::new(),
        }
    }

    pub fn administrator(user_id: i64, permissions: impl IntoIterator<Item = Permission>) -> Self {
        Self {
            user_id,
            status: AdminStatus::Administrator,
            permissions: permissions.into_iter().collect(),
        }
    }

    pub fn has_all(&self, required: &[Permission]) -> bool {
        self.status == AdminStatus::Creator
            || required.iter().all(|p| self.permissions.contains(p))
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MembersError {
    #[error("administrators of chat {chat_id} unavailable: {reason}")]
    Unavailable { chat_id: i64, reason: String },
}

/// Who administers a chat, and as whom the bot acts
#[async_trait]
pub trait ChatMembers: Send + Sync {
    /// Platform id of the bot account
    fn bot_id(&self) -> i64;

    async fn administrators(&self, chat_id: i64) -> Result<Vec<ChatAdmin>, MembersError>;
}

/// Administrator lists kept in memory, keyed by chat
pub struct InMemoryMembers {
    bot_id: i64,
    admins: Mutex<AHashMap<i64, Vec<ChatAdmin>>>,
}

impl InMemoryMembers {
    pub fn new(bot_id: i64) -> Self {
        Self {
            bot_id,
            admins: Mutex::new(AHashMap::new()),
        }
    }

    /// Add or replace an administrator of `chat_id`
    pub fn set_admin(&self, chat_id: i64, admin: ChatAdmin) {
        let mut admins = self.admins();
        let list = admins.entry(chat_id).or_default();
        list.retain(|known| known.user_id != admin.user_id);
        list.push(admin);
    }

    pub fn remove_admin(&self, chat_id: i64, user_id: i64) {
        if let Some(list) = self.admins().get_mut(&chat_id) {
            list.retain(|known| known.user_id != user_id);
        }
    }

    fn admins(&self) -> MutexGuard<'_, AHashMap<i64, Vec<ChatAdmin>>> {
        self.admins.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait]
impl ChatMembers for InMemoryMembers {
    fn bot_id(&self) -> i64 {
        self.bot_id
    }

    async fn administrators(&self, chat_id: i64) -> Result<Vec<ChatAdmin>, MembersError> {
        Ok(self.admins().get(&chat_id).cloned().unwrap_or_default())
    }
}

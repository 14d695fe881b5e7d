//! Core type definitions used throughout the codebase

use std::fmt;

use ahash::AHashMap;
use serde::{Deserialize, Serialize};

/// Identity of a user as reported by the chat platform
///
/// Depending on where it came from, only part of it may be known: a bare
/// `@username` mention carries no id, an `id123` argument carries no name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlatformUser {
    pub id: Option<i64>,
    pub username: Option<String>,
    pub full_name: Option<String>,
    pub is_bot: bool,
}

impl PlatformUser {
    pub fn by_id(id: i64) -> Self {
        Self {
            id: Some(id),
            ..Self::default()
        }
    }

    pub fn by_username(username: impl Into<String>) -> Self {
        Self {
            username: Some(username.into()),
            ..Self::default()
        }
    }

    pub fn with_name(mut self, full_name: impl Into<String>) -> Self {
        self.full_name = Some(full_name.into());
        self
    }

    pub fn bot(mut self) -> Self {
        self.is_bot = true;
        self
    }
}

/// A user record owned by the user directory
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DomainUser {
    /// Internal sequential id
    pub id: u64,
    /// Platform id, unknown for users only ever seen by username
    pub platform_id: Option<i64>,
    pub username: Option<String>,
    pub full_name: Option<String>,
    pub is_bot: bool,
}

impl DomainUser {
    /// Human-readable reference used in replies
    pub fn mention(&self) -> String {
        if let Some(username) = &self.username {
            return format!("@{}", username);
        }
        if let Some(name) = &self.full_name {
            return name.clone();
        }
        match self.platform_id {
            Some(id) => format!("id{}", id),
            None => format!("user #{}", self.id),
        }
    }
}

impl fmt::Display for DomainUser {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.mention())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DomainChat {
    pub chat_id: i64,
    pub title: Option<String>,
}

impl fmt::Display for DomainChat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.title {
            Some(title) => write!(f, "{} ({})", title, self.chat_id),
            None => write!(f, "chat {}", self.chat_id),
        }
    }
}

/// Entity markup attached to a message
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MessageEntity {
    /// `@username`
    Mention { username: String },
    /// A link to a user without a public username, rendered as `text`
    TextMention { user: PlatformUser, text: String },
}

/// Reference to a delivered message, used to retract it later
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MessageHandle {
    pub chat_id: i64,
    pub message_id: i64,
}

/// Values the ambient context can hold
#[derive(Debug, Clone, PartialEq)]
pub enum ContextValue {
    User(DomainUser),
    Chat(DomainChat),
}

/// Per-event ambient data, filled in by middleware before binding
#[derive(Debug, Clone, Default)]
pub struct ContextData {
    values: AHashMap<&'static str, ContextValue>,
}

impl ContextData {
    pub const USER: &'static str = "user";
    pub const CHAT: &'static str = "chat";
    pub const TARGET: &'static str = "target";

    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: &'static str, value: ContextValue) {
        self.values.insert(key, value);
    }

    pub fn get(&self, key: &str) -> Option<&ContextValue> {
        self.values.get(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }
}

/// An inbound chat message
#[derive(Debug, Clone, Default)]
pub struct Event {
    pub message_id: i64,
    pub chat_id: i64,
    pub chat_title: Option<String>,
    pub sender: PlatformUser,
    /// Set when the message was posted on behalf of a channel
    pub sender_chat: Option<i64>,
    pub text: String,
    /// Author of the message this one replies to
    pub reply_to: Option<PlatformUser>,
    pub entities: Vec<MessageEntity>,
    pub context: ContextData,
}

impl Event {
    pub fn new(chat_id: i64, sender: PlatformUser, text: impl Into<String>) -> Self {
        Self {
            chat_id,
            sender,
            text: text.into(),
            ..Self::default()
        }
    }

    pub fn replying_to(mut self, user: PlatformUser) -> Self {
        self.reply_to = Some(user);
        self
    }

    pub fn with_entity(mut self, entity: MessageEntity) -> Self {
        self.entities.push(entity);
        self
    }

    /// Split `/name@bot rest` into the lower-cased command name and the
    /// argument text. `None` if the message is not a command.
    pub fn command(&self) -> Option<(String, &str)> {
        let text = self.text.trim_start();
        let body = text.strip_prefix('/')?;
        let (head, args) = match body.find(char::is_whitespace) {
            Some(idx) => (&body[..idx], body[idx..].trim_start()),
            None => (body, ""),
        };
        let name = head.split('@').next().unwrap_or(head);
        if name.is_empty() {
            return None;
        }
        Some((name.to_lowercase(), args))
    }

    /// Argument text after the command, or an empty string
    pub fn command_args(&self) -> &str {
        self.command().map(|(_, args)| args).unwrap_or("")
    }

    pub fn handle(&self) -> MessageHandle {
        MessageHandle {
            chat_id: self.chat_id,
            message_id: self.message_id,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_split() {
        let event = Event::new(1, PlatformUser::by_id(1), "/Mute@modbot id5  2h spam");
        let (name, args) = event.command().unwrap();
        assert_eq!(name, "mute");
        assert_eq!(args, "id5  2h spam");
    }

    #[test]
    fn test_command_without_args() {
        let event = Event::new(1, PlatformUser::by_id(1), "/unmute");
        assert_eq!(event.command(), Some(("unmute".to_string(), "")));
        assert_eq!(event.command_args(), "");
    }

    #[test]
    fn test_plain_text_is_not_command() {
        let event = Event::new(1, PlatformUser::by_id(1), "hello /mute");
        assert!(event.command().is_none());
        assert!(Event::new(1, PlatformUser::by_id(1), "/ x").command().is_none());
    }

    #[test]
    fn test_mention_fallbacks() {
        let mut user = DomainUser {
            id: 7,
            platform_id: Some(42),
            username: None,
            full_name: None,
            is_bot: false,
        };
        assert_eq!(user.mention(), "id42");
        user.full_name = Some("Ann Lee".into());
        assert_eq!(user.mention(), "Ann Lee");
        user.username = Some("ann".into());
        assert_eq!(user.mention(), "@ann");
    }
}

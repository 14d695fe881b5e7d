//! Standard middleware stages

use std::sync::Arc;

use async_trait::async_trait;

use crate::core::config::PermissionConfig;
use crate::core::types::{ContextData, ContextValue, DomainChat, Event};
use crate::locks::LockRegistry;
use crate::services::{ChatAdmin, ChatMembers, MessageDelivery, Permission, UserDirectory};
use crate::throttle::{ThrottleCoordinator, ThrottleKey};

use super::dispatcher::{Middleware, Next, Outcome};
use super::registry::Command;

/// Resolves the sender and chat into the event context
///
/// Messages posted on behalf of a channel have no user to act as and are
/// dropped. Resolution of a given sender is serialized through the lock
/// registry so that concurrent first messages create a single record.
pub struct ContextLoader {
    directory: Arc<dyn UserDirectory>,
    locks: Arc<LockRegistry<i64>>,
}

impl ContextLoader {
    pub fn new(directory: Arc<dyn UserDirectory>, locks: Arc<LockRegistry<i64>>) -> Self {
        Self { directory, locks }
    }
}

#[async_trait]
impl Middleware for ContextLoader {
    async fn handle(&self, mut event: Event, command: &Command, next: Next<'_>) -> Outcome {
        if let Some(channel) = event.sender_chat {
            tracing::debug!("Dropping message sent on behalf of channel {}", channel);
            return Outcome::Cancelled;
        }

        let resolved = {
            let _guard = match event.sender.id {
                Some(id) => Some(self.locks.acquire(id).await),
                None => None,
            };
            self.directory.resolve_or_create(&event.sender).await
        };
        let user = match resolved {
            Ok(user) => user,
            Err(e) => {
                tracing::warn!("Could not resolve sender {:?}: {}", event.sender, e);
                return Outcome::Failed("Could not fetch user data.".into());
            }
        };

        // Chats are not persisted, so there is nothing to create under a lock
        let chat = DomainChat {
            chat_id: event.chat_id,
            title: event.chat_title.clone(),
        };
        event.context.insert(ContextData::USER, ContextValue::User(user));
        event.context.insert(ContextData::CHAT, ContextValue::Chat(chat));

        next.run(event, command).await
    }
}

/// Logs every command that reaches it
pub struct CommandLog;

#[async_trait]
impl Middleware for CommandLog {
    async fn handle(&self, event: Event, command: &Command, next: Next<'_>) -> Outcome {
        let user = match event.context.get(ContextData::USER) {
            Some(ContextValue::User(user)) => user.to_string(),
            _ => format!("{:?}", event.sender.id),
        };
        let chat = match event.context.get(ContextData::CHAT) {
            Some(ContextValue::Chat(chat)) => chat.to_string(),
            _ => event.chat_id.to_string(),
        };
        tracing::info!("/{} by {} in {}: {}", command.name(), user, chat, event.text);

        next.run(event, command).await
    }
}

/// Applies the command's cooldown
///
/// The key is the command's explicit throttle key, or the configured prefix
/// followed by the command name, scoped to the chat and sender. A blocked
/// call waits out the cooldown (see [`ThrottleCoordinator::handle_throttled`])
/// and is then cancelled.
pub struct Throttle {
    coordinator: Arc<ThrottleCoordinator>,
}

impl Throttle {
    pub fn new(coordinator: Arc<ThrottleCoordinator>) -> Self {
        Self { coordinator }
    }

    pub fn key_for(&self, event: &Event, command: &Command) -> ThrottleKey {
        let name = command
            .rate_limit
            .as_ref()
            .and_then(|limit| limit.key.clone())
            .unwrap_or_else(|| format!("{}{}", self.coordinator.config().key_prefix, command.name()));
        ThrottleKey::new(name).scoped(event.chat_id, event.sender.id)
    }
}

#[async_trait]
impl Middleware for Throttle {
    async fn handle(&self, event: Event, command: &Command, next: Next<'_>) -> Outcome {
        let limit = command
            .rate_limit
            .as_ref()
            .map(|limit| limit.limit)
            .unwrap_or_else(|| self.coordinator.config().default_limit());
        let key = self.key_for(&event, command);

        if let Err(throttled) = self.coordinator.check(&key, limit) {
            self.coordinator
                .handle_throttled(event.chat_id, Some(event.message_id), throttled)
                .await;
            return Outcome::Cancelled;
        }

        next.run(event, command).await
    }
}

/// Enforces the command's required administrator rights
///
/// The caller is checked first. A caller without the rights is cancelled
/// silently and the triggering message is deleted when the bot may delete
/// messages. If the caller passes but the bot lacks the rights, the bot asks
/// for them in a reply. The chat creator passes any check.
pub struct PermissionCheck {
    members: Arc<dyn ChatMembers>,
    delivery: Arc<dyn MessageDelivery>,
    config: PermissionConfig,
}

impl PermissionCheck {
    pub fn new(
        members: Arc<dyn ChatMembers>,
        delivery: Arc<dyn MessageDelivery>,
        config: PermissionConfig,
    ) -> Self {
        Self {
            members,
            delivery,
            config,
        }
    }
}

fn holds(admins: &[ChatAdmin], user_id: Option<i64>, required: &[Permission]) -> bool {
    user_id
        .and_then(|id| admins.iter().find(|admin| admin.user_id == id))
        .is_some_and(|admin| admin.has_all(required))
}

#[async_trait]
impl Middleware for PermissionCheck {
    async fn handle(&self, event: Event, command: &Command, next: Next<'_>) -> Outcome {
        let required = command.required_permissions.as_slice();
        if required.is_empty() {
            return next.run(event, command).await;
        }

        // One lookup serves both the caller and the bot
        let admins = match self.members.administrators(event.chat_id).await {
            Ok(admins) => admins,
            Err(e) => {
                tracing::warn!("Could not check rights for /{}: {}", command.name(), e);
                return Outcome::Failed("Could not fetch chat administrators.".into());
            }
        };
        let bot_id = Some(self.members.bot_id());

        if !holds(&admins, event.sender.id, required) {
            tracing::debug!(
                "{:?} lacks rights for /{} in chat {}",
                event.sender.id,
                command.name(),
                event.chat_id
            );
            if holds(&admins, bot_id, &[Permission::DeleteMessages]) {
                if let Err(e) = self.delivery.delete(event.handle()).await {
                    tracing::warn!("Could not delete unauthorized command: {}", e);
                }
            }
            return Outcome::Cancelled;
        }

        if !holds(&admins, bot_id, required) {
            tracing::debug!("Bot lacks rights for /{} in chat {}", command.name(), event.chat_id);
            if let Err(e) = self
                .delivery
                .send(event.chat_id, Some(event.message_id), &self.config.bot_missing_rights_text)
                .await
            {
                tracing::warn!("Could not ask for admin rights: {}", e);
            }
            return Outcome::Cancelled;
        }

        tracing::trace!("All rights granted for /{}", command.name());
        next.run(event, command).await
    }
}

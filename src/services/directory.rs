//! User directory: maps platform identities to domain user records

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use ahash::AHashMap;
use async_trait::async_trait;
use thiserror::Error;

use crate::core::types::{DomainUser, PlatformUser};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DirectoryError {
    #[error("no user known with username @{0}")]
    UnknownUsername(String),
    #[error("platform identity carries neither id nor username")]
    NoIdentity,
    #[error("directory backend error: {0}")]
    Backend(String),
}

/// Resolves (and creates on first sight) domain users
#[async_trait]
pub trait UserDirectory: Send + Sync {
    async fn resolve_or_create(&self, user: &PlatformUser) -> Result<DomainUser, DirectoryError>;
}

#[derive(Default)]
struct DirectoryState {
    records: AHashMap<u64, DomainUser>,
    by_platform_id: AHashMap<i64, u64>,
    next_id: u64,
}

impl DirectoryState {
    fn find(&self, user: &PlatformUser) -> Option<u64> {
        if let Some(id) = user.id {
            return self.by_platform_id.get(&id).copied();
        }
        let username = user.username.as_deref()?;
        self.records
            .values()
            .find(|record| {
                record
                    .username
                    .as_deref()
                    .is_some_and(|known| known.eq_ignore_ascii_case(username))
            })
            .map(|record| record.id)
    }
}

/// In-process directory
///
/// Lookup and creation are separate steps with an optional simulated
/// round-trip in between, like a real store. Callers that must not create
/// duplicates serialize per identity through a
/// [`LockRegistry`](crate::locks::LockRegistry).
pub struct InMemoryDirectory {
    state: Mutex<DirectoryState>,
    latency: Duration,
    created: AtomicUsize,
}

impl Default for InMemoryDirectory {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryDirectory {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(DirectoryState {
                next_id: 1,
                ..DirectoryState::default()
            }),
            latency: Duration::ZERO,
            created: AtomicUsize::new(0),
        }
    }

    /// Simulate storage latency between lookup and insert
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// Number of records created so far (duplicates included)
    pub fn created_count(&self) -> usize {
        self.created.load(Ordering::SeqCst)
    }

    pub fn len(&self) -> usize {
        self.state().records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn get_by_platform_id(&self, platform_id: i64) -> Option<DomainUser> {
        let state = self.state();
        let id = state.by_platform_id.get(&platform_id)?;
        state.records.get(id).cloned()
    }

    fn state(&self) -> MutexGuard<'_, DirectoryState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Bring a stored record up to date with fresh platform data
    fn refresh(&self, id: u64, user: &PlatformUser) -> Option<DomainUser> {
        let mut state = self.state();
        let record = state.records.get_mut(&id)?;
        if record.platform_id.is_none() {
            record.platform_id = user.id;
        }
        // Only full profiles (ones carrying a name) overwrite stored fields
        if user.full_name.is_some() {
            record.full_name = user.full_name.clone();
            record.username = user.username.clone();
            record.is_bot = record.is_bot || user.is_bot;
        }
        let record = record.clone();
        if let Some(platform_id) = record.platform_id {
            state.by_platform_id.insert(platform_id, record.id);
        }
        Some(record)
    }
}

#[async_trait]
impl UserDirectory for InMemoryDirectory {
    async fn resolve_or_create(&self, user: &PlatformUser) -> Result<DomainUser, DirectoryError> {
        let existing = self.state().find(user);
        if let Some(record) = existing.and_then(|id| self.refresh(id, user)) {
            return Ok(record);
        }

        let Some(platform_id) = user.id else {
            return Err(match &user.username {
                Some(username) => DirectoryError::UnknownUsername(username.clone()),
                None => DirectoryError::NoIdentity,
            });
        };

        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }

        let mut state = self.state();
        let record = DomainUser {
            id: state.next_id,
            platform_id: Some(platform_id),
            username: user.username.clone(),
            full_name: user.full_name.clone(),
            is_bot: user.is_bot,
        };
        state.next_id += 1;
        state.by_platform_id.insert(platform_id, record.id);
        state.records.insert(record.id, record.clone());
        self.created.fetch_add(1, Ordering::SeqCst);

        tracing::debug!("Created user record {} for platform id {}", record.id, platform_id);
        Ok(record)
    }
}

//! Per-key async locks with idle eviction
//!
//! Entries are created on first request and never torn down by holders. A
//! periodic sweep drops every entry nobody holds or waits on, which keeps the
//! map bounded over the life of the process.

use std::fmt;
use std::hash::Hash;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use ahash::AHashMap;
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};
use tokio::task::JoinHandle;

pub type KeyLock = Arc<AsyncMutex<()>>;

pub struct LockRegistry<K> {
    entries: Mutex<AHashMap<K, KeyLock>>,
}

impl<K> Default for LockRegistry<K> {
    fn default() -> Self {
        Self {
            entries: Mutex::new(AHashMap::new()),
        }
    }
}

impl<K> LockRegistry<K>
where
    K: Eq + Hash + Clone + fmt::Debug,
{
    pub fn new() -> Self {
        Self::default()
    }

    /// Mutex for `key`, created if missing
    ///
    /// The returned handle pins the entry: it survives sweeps for as long as
    /// any clone of the handle is alive.
    pub fn handle(&self, key: K) -> KeyLock {
        let mut entries = self.entries();
        Arc::clone(entries.entry(key).or_default())
    }

    /// Wait for exclusive access to `key`; dropping the guard releases it
    pub async fn acquire(&self, key: K) -> OwnedMutexGuard<()> {
        self.handle(key).lock_owned().await
    }

    /// Remove every entry that is neither held nor awaited
    ///
    /// Holders and waiters keep a clone of the entry's `Arc`, so an entry
    /// whose count is one is idle. The count is read under the map lock and
    /// new handles are only handed out under that same lock, so no entry can
    /// become busy between the check and the removal.
    pub fn sweep(&self) -> usize {
        let mut entries = self.entries();
        let before = entries.len();
        entries.retain(|key, lock| {
            let busy = Arc::strong_count(lock) > 1;
            if !busy {
                tracing::trace!("Evicting idle lock {:?}", key);
            }
            busy
        });
        let evicted = before - entries.len();
        if evicted > 0 {
            tracing::debug!("Lock sweep evicted {} of {} entries", evicted, before);
        }
        evicted
    }

    /// Drop all entries regardless of state
    ///
    /// Current holders keep their (now detached) mutex; a later `acquire`
    /// for the same key gets a fresh one. Only for administrative reset.
    pub fn clear(&self) {
        self.entries().clear();
    }

    pub fn len(&self) -> usize {
        self.entries().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn contains(&self, key: &K) -> bool {
        self.entries().contains_key(key)
    }

    fn entries(&self) -> MutexGuard<'_, AHashMap<K, KeyLock>> {
        self.entries.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl<K> LockRegistry<K>
where
    K: Eq + Hash + Clone + fmt::Debug + Send + 'static,
{
    /// Run [`sweep`](Self::sweep) every `every` until the registry is dropped
    pub fn spawn_sweeper(self: &Arc<Self>, every: Duration) -> JoinHandle<()> {
        let registry = Arc::downgrade(self);
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(every);
            // First tick completes immediately
            interval.tick().await;
            loop {
                interval.tick().await;
                let Some(registry) = registry.upgrade() else {
                    break;
                };
                registry.sweep();
            }
            tracing::debug!("Lock registry dropped, sweeper stopped");
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_entries_created_lazily() {
        let registry = LockRegistry::new();
        assert!(registry.is_empty());
        let guard = registry.acquire("a".to_string()).await;
        assert!(registry.contains(&"a".to_string()));
        drop(guard);
        let _again = registry.acquire("a".to_string()).await;
        assert_eq!(registry.len(), 1);
    }

    #[tokio::test]
    async fn test_sweep_spares_held_and_pinned_entries() {
        let registry = LockRegistry::new();
        let held = registry.acquire(1).await;
        let pinned = registry.handle(2);
        drop(registry.acquire(3).await);

        assert_eq!(registry.sweep(), 1);
        assert!(registry.contains(&1));
        assert!(registry.contains(&2));
        assert!(!registry.contains(&3));

        drop(held);
        drop(pinned);
        assert_eq!(registry.sweep(), 2);
        assert!(registry.is_empty());
    }

    #[tokio::test]
    async fn test_clear_drops_everything() {
        let registry = LockRegistry::new();
        let _held = registry.acquire(1).await;
        registry.handle(2);
        registry.clear();
        assert!(registry.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_background_sweeper() {
        let registry = Arc::new(LockRegistry::new());
        let sweeper = registry.spawn_sweeper(Duration::from_secs(1800));

        let held = registry.acquire("busy").await;
        drop(registry.acquire("idle").await);

        tokio::time::sleep(Duration::from_secs(1801)).await;
        assert!(registry.contains(&"busy"));
        assert!(!registry.contains(&"idle"));

        drop(held);
        drop(registry);
        tokio::time::sleep(Duration::from_secs(1800)).await;
        assert!(sweeper.await.is_ok());
    }
}

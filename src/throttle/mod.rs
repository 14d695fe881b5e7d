//! Command cooldowns with a self-cleaning "blocked" notice
//!
//! [`ThrottleCoordinator::check`] records every call for a key. A call within
//! the cooldown of the previous one is a violation: the consecutive counter
//! grows and the window restarts, so a burst keeps the command blocked until
//! it quiets down. [`ThrottleCoordinator::handle_throttled`] posts a notice on
//! the first violations, waits out the cooldown and, if nothing else arrived
//! meanwhile, releases the key and retracts the notice.
//!
//! A key whose cooldown has run out without a violation is dead weight. It
//! is hidden from [`ThrottleCoordinator::status`] at once and dropped from
//! the map on the next sweep, which `check` runs every
//! `throttle.sweep_interval_secs` and [`ThrottleCoordinator::spawn_sweeper`]
//! runs on a timer for idle periods.

use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use ahash::AHashMap;
use tokio::task::JoinHandle;
use tokio::time::Instant;

use crate::core::config::ThrottleConfig;
use crate::core::types::MessageHandle;
use crate::services::MessageDelivery;

/// Identity a cooldown is tracked against
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ThrottleKey {
    pub name: String,
    pub chat: Option<i64>,
    pub user: Option<i64>,
}

impl ThrottleKey {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            chat: None,
            user: None,
        }
    }

    pub fn scoped(mut self, chat: i64, user: Option<i64>) -> Self {
        self.chat = Some(chat);
        self.user = user;
        self
    }
}

impl fmt::Display for ThrottleKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)?;
        if let Some(chat) = self.chat {
            write!(f, " chat={}", chat)?;
        }
        if let Some(user) = self.user {
            write!(f, " user={}", user)?;
        }
        Ok(())
    }
}

/// A call arrived before the cooldown elapsed
///
/// Consumed by the throttle handling path; never turned into a reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Throttled {
    pub key: ThrottleKey,
    /// Cooldown in force
    pub rate: Duration,
    /// Time since the previous call
    pub delta: Duration,
    /// Consecutive calls including the last allowed one
    pub exceeded_count: u32,
}

impl Throttled {
    /// Time left until the key may be called again
    pub fn remaining(&self) -> Duration {
        self.rate.saturating_sub(self.delta)
    }
}

/// Snapshot of a key's state
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThrottleStatus {
    pub rate: Duration,
    pub last_call: Instant,
    pub exceeded_count: u32,
}

#[derive(Debug)]
struct ThrottleState {
    rate: Duration,
    last_call: Instant,
    exceeded_count: u32,
    notices: Vec<MessageHandle>,
}

impl ThrottleState {
    /// Cooldown over and nothing left to retract
    ///
    /// A key with posted notices belongs to the pending `handle_throttled`
    /// call that will retract them.
    fn expired(&self, now: Instant) -> bool {
        self.notices.is_empty() && now.saturating_duration_since(self.last_call) >= self.rate
    }
}

struct ThrottleTable {
    states: AHashMap<ThrottleKey, ThrottleState>,
    last_sweep: Instant,
}

impl ThrottleTable {
    fn sweep(&mut self, now: Instant) -> usize {
        let before = self.states.len();
        self.states.retain(|_, state| !state.expired(now));
        self.last_sweep = now;
        before - self.states.len()
    }
}

pub struct ThrottleCoordinator {
    table: Mutex<ThrottleTable>,
    delivery: Arc<dyn MessageDelivery>,
    config: ThrottleConfig,
}

impl ThrottleCoordinator {
    pub fn new(delivery: Arc<dyn MessageDelivery>, config: ThrottleConfig) -> Self {
        Self {
            table: Mutex::new(ThrottleTable {
                states: AHashMap::new(),
                last_sweep: Instant::now(),
            }),
            delivery,
            config,
        }
    }

    pub fn config(&self) -> &ThrottleConfig {
        &self.config
    }

    /// Record a call for `key`, failing if it falls within `limit` of the
    /// previous one
    pub fn check(&self, key: &ThrottleKey, limit: Duration) -> Result<(), Throttled> {
        let now = Instant::now();
        let mut table = self.table();
        if now.saturating_duration_since(table.last_sweep) >= self.config.sweep_interval() {
            table.sweep(now);
        }

        let Some(state) = table.states.get_mut(key) else {
            table.states.insert(
                key.clone(),
                ThrottleState {
                    rate: limit,
                    last_call: now,
                    exceeded_count: 1,
                    notices: Vec::new(),
                },
            );
            return Ok(());
        };

        let delta = now.saturating_duration_since(state.last_call);
        state.rate = limit;
        state.last_call = now;

        if delta >= limit {
            state.exceeded_count = 1;
            return Ok(());
        }

        state.exceeded_count += 1;
        tracing::debug!(
            "Throttled {} ({} consecutive, {:?} left)",
            key,
            state.exceeded_count,
            limit - delta
        );
        Err(Throttled {
            key: key.clone(),
            rate: limit,
            delta,
            exceeded_count: state.exceeded_count,
        })
    }

    /// State of `key`, or `None` once its cooldown ran out
    pub fn status(&self, key: &ThrottleKey) -> Option<ThrottleStatus> {
        let now = Instant::now();
        self.table()
            .states
            .get(key)
            .filter(|state| !state.expired(now))
            .map(|state| ThrottleStatus {
                rate: state.rate,
                last_call: state.last_call,
                exceeded_count: state.exceeded_count,
            })
    }

    /// Keys held in memory, expired ones included until the next sweep
    pub fn len(&self) -> usize {
        self.table().states.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop every key whose cooldown has run out, returning how many went
    pub fn sweep(&self) -> usize {
        let evicted = self.table().sweep(Instant::now());
        if evicted > 0 {
            tracing::debug!("Swept {} expired throttle keys", evicted);
        }
        evicted
    }

    /// Sweep every `every` until the coordinator is dropped
    pub fn spawn_sweeper(self: &Arc<Self>, every: Duration) -> JoinHandle<()> {
        let coordinator = Arc::downgrade(self);
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(every);
            interval.tick().await;
            loop {
                interval.tick().await;
                let Some(coordinator) = coordinator.upgrade() else {
                    break;
                };
                coordinator.sweep();
            }
            tracing::debug!("Throttle coordinator dropped, sweeper stopped");
        })
    }

    /// Forget `key`, returning the notices still posted for it
    pub fn release(&self, key: &ThrottleKey) -> Vec<MessageHandle> {
        match self.table().states.remove(key) {
            Some(state) => {
                tracing::debug!("Released throttle key {}", key);
                state.notices
            }
            None => Vec::new(),
        }
    }

    /// Notify, wait out the cooldown, then clean up if the burst is over
    ///
    /// Delivery failures are logged and otherwise ignored.
    pub async fn handle_throttled(&self, chat_id: i64, reply_to: Option<i64>, throttled: Throttled) {
        if throttled.exceeded_count <= self.config.notice_threshold {
            match self
                .delivery
                .send(chat_id, reply_to, &self.config.notice_text)
                .await
            {
                Ok(handle) => {
                    if !self.remember_notice(&throttled.key, handle) {
                        self.retract(vec![handle]).await;
                    }
                }
                Err(e) => tracing::warn!("Could not post throttle notice: {}", e),
            }
        }

        tokio::time::sleep(throttled.remaining()).await;

        // Raw lookup: the cooldown may have just run out, yet the notices
        // stored on the key still have to be retracted
        let unchanged = self
            .table()
            .states
            .get(&throttled.key)
            .is_some_and(|state| state.exceeded_count == throttled.exceeded_count);
        if unchanged {
            let notices = self.release(&throttled.key);
            self.retract(notices).await;
        }
    }

    fn remember_notice(&self, key: &ThrottleKey, handle: MessageHandle) -> bool {
        match self.table().states.get_mut(key) {
            Some(state) => {
                state.notices.push(handle);
                true
            }
            None => false,
        }
    }

    async fn retract(&self, notices: Vec<MessageHandle>) {
        for handle in notices {
            if let Err(e) = self.delivery.delete(handle).await {
                tracing::warn!("Could not retract throttle notice: {}", e);
            }
        }
    }

    fn table(&self) -> MutexGuard<'_, ThrottleTable> {
        self.table.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

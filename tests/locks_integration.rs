//! Integration tests for the lock registry under contention

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use modguard::core::types::PlatformUser;
use modguard::locks::LockRegistry;
use modguard::services::{InMemoryDirectory, UserDirectory};

#[tokio::test]
async fn test_second_acquire_waits_for_release() {
    let registry = Arc::new(LockRegistry::new());
    let entered = Arc::new(AtomicBool::new(false));

    let guard = registry.acquire("42".to_string()).await;

    let waiter = {
        let registry = Arc::clone(&registry);
        let entered = Arc::clone(&entered);
        tokio::spawn(async move {
            let _guard = registry.acquire("42".to_string()).await;
            entered.store(true, Ordering::SeqCst);
        })
    };

    for _ in 0..10 {
        tokio::task::yield_now().await;
    }
    assert!(!entered.load(Ordering::SeqCst));

    drop(guard);
    waiter.await.unwrap();
    assert!(entered.load(Ordering::SeqCst));
}

#[tokio::test(start_paused = true)]
async fn test_lock_prevents_duplicate_creation() {
    let registry = Arc::new(LockRegistry::new());
    let directory = Arc::new(InMemoryDirectory::new().with_latency(Duration::from_millis(50)));

    let tasks: Vec<_> = (0..8)
        .map(|_| {
            let registry = Arc::clone(&registry);
            let directory = Arc::clone(&directory);
            tokio::spawn(async move {
                let _guard = registry.acquire(42i64).await;
                directory.resolve_or_create(&PlatformUser::by_id(42)).await
            })
        })
        .collect();

    let mut ids = Vec::new();
    for task in tasks {
        ids.push(task.await.unwrap().unwrap().id);
    }

    assert_eq!(directory.created_count(), 1);
    assert!(ids.iter().all(|id| *id == ids[0]));
}

#[tokio::test(start_paused = true)]
async fn test_unserialized_lookups_duplicate() {
    let directory = Arc::new(InMemoryDirectory::new().with_latency(Duration::from_millis(50)));

    let tasks: Vec<_> = (0..4)
        .map(|_| {
            let directory = Arc::clone(&directory);
            tokio::spawn(async move { directory.resolve_or_create(&PlatformUser::by_id(42)).await })
        })
        .collect();
    for task in tasks {
        task.await.unwrap().unwrap();
    }

    assert!(directory.created_count() > 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_sweep_never_evicts_held_lock_under_churn() {
    const KEYS: u64 = 4;
    const WORKERS: usize = 16;
    const ROUNDS: usize = 200;

    let registry = Arc::new(LockRegistry::<u64>::new());
    let holders: Arc<Vec<AtomicUsize>> = Arc::new((0..KEYS).map(|_| AtomicUsize::new(0)).collect());
    let violations = Arc::new(AtomicUsize::new(0));

    let workers: Vec<_> = (0..WORKERS)
        .map(|worker| {
            let registry = Arc::clone(&registry);
            let holders = Arc::clone(&holders);
            let violations = Arc::clone(&violations);
            tokio::spawn(async move {
                for round in 0..ROUNDS {
                    let key = ((worker + round) as u64) % KEYS;
                    let _guard = registry.acquire(key).await;

                    let slot = &holders[key as usize];
                    if slot.fetch_add(1, Ordering::SeqCst) != 0 {
                        violations.fetch_add(1, Ordering::SeqCst);
                    }
                    if !registry.contains(&key) {
                        violations.fetch_add(1, Ordering::SeqCst);
                    }
                    tokio::task::yield_now().await;
                    slot.fetch_sub(1, Ordering::SeqCst);
                }
            })
        })
        .collect();

    let sweeper = {
        let registry = Arc::clone(&registry);
        tokio::spawn(async move {
            let mut evicted = 0;
            for _ in 0..2000 {
                evicted += registry.sweep();
                tokio::task::yield_now().await;
            }
            evicted
        })
    };

    for worker in workers {
        worker.await.unwrap();
    }
    sweeper.await.unwrap();

    assert_eq!(violations.load(Ordering::SeqCst), 0);
    registry.sweep();
    assert!(registry.is_empty());
}

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use thiserror::Error;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::debug;
use uuid::Uuid;

pub const DEFAULT_LOCK_TIMEOUT: Duration = Duration::from_secs(60);

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LockError {
    #[error("timed out after {waited:?} waiting for the build lock of `{documentation_id}`")]
    Timeout {
        documentation_id: Uuid,
        waited: Duration,
    },
}

/// One async mutex per documentation, created on first use.
///
/// Acquisition is a plain future raced against a timer; when the timer wins
/// the future is dropped, which removes the waiter from the mutex queue. A
/// timed-out caller therefore never ends up owning the lock later.
#[derive(Clone)]
pub struct BuildLockRegistry {
    locks: Arc<DashMap<Uuid, Arc<Mutex<()>>>>,
    timeout: Duration,
}

impl Default for BuildLockRegistry {
    fn default() -> Self {
        Self::new(DEFAULT_LOCK_TIMEOUT)
    }
}

/// Held for the duration of one pass.
pub struct BuildLockGuard {
    documentation_id: Uuid,
    _guard: OwnedMutexGuard<()>,
}

impl BuildLockGuard {
    pub fn documentation_id(&self) -> Uuid {
        self.documentation_id
    }
}

impl BuildLockRegistry {
    pub fn new(timeout: Duration) -> Self {
        Self {
            locks: Arc::new(DashMap::new()),
            timeout,
        }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    fn lock_for(&self, documentation_id: Uuid) -> Arc<Mutex<()>> {
        self.locks
            .entry(documentation_id)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    pub async fn acquire_within(
        &self,
        documentation_id: Uuid,
        timeout: Duration,
    ) -> Result<BuildLockGuard, LockError> {
        let lock = self.lock_for(documentation_id);
        match tokio::time::timeout(timeout, lock.lock_owned()).await {
            Ok(guard) => Ok(BuildLockGuard {
                documentation_id,
                _guard: guard,
            }),
            Err(_) => {
                debug!(
                    target = "application::locks",
                    documentation_id = %documentation_id,
                    waited_ms = timeout.as_millis() as u64,
                    "build lock acquisition timed out"
                );
                Err(LockError::Timeout {
                    documentation_id,
                    waited: timeout,
                })
            }
        }
    }

    /// Run `task` while holding the documentation's lock, waiting at most the
    /// registry timeout.
    pub async fn run_exclusive<F, Fut, T>(
        &self,
        documentation_id: Uuid,
        task: F,
    ) -> Result<T, LockError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = T>,
    {
        self.run_exclusive_within(documentation_id, self.timeout, task)
            .await
    }

    pub async fn run_exclusive_within<F, Fut, T>(
        &self,
        documentation_id: Uuid,
        timeout: Duration,
        task: F,
    ) -> Result<T, LockError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = T>,
    {
        let _guard = self.acquire_within(documentation_id, timeout).await?;
        Ok(task().await)
    }

    /// Drop every lock nobody holds or waits on. Returns how many were removed.
    pub fn prune_idle(&self) -> usize {
        let before = self.locks.len();
        self.locks.retain(|_, lock| Arc::strong_count(lock) > 1);
        before.saturating_sub(self.locks.len())
    }

    pub fn len(&self) -> usize {
        self.locks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.locks.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use tokio::sync::oneshot;

    use super::*;

    #[tokio::test]
    async fn timed_out_waiter_does_not_leak_the_lock() {
        let registry = BuildLockRegistry::new(Duration::from_millis(20));
        let id = Uuid::from_u128(1);

        let holder = registry.acquire_within(id, DEFAULT_LOCK_TIMEOUT).await.expect("lock");
        let result = registry.run_exclusive(id, || async { 1 }).await;
        assert!(matches!(result, Err(LockError::Timeout { .. })));

        drop(holder);
        let value = registry
            .run_exclusive(id, || async { 2 })
            .await
            .expect("lock released");
        assert_eq!(value, 2);
    }

    #[tokio::test]
    async fn passes_for_one_documentation_never_overlap() {
        let registry = BuildLockRegistry::default();
        let id = Uuid::from_u128(2);
        let active = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::new();
        for _ in 0..4 {
            let registry = registry.clone();
            let active = active.clone();
            let peak = peak.clone();
            handles.push(tokio::spawn(async move {
                registry
                    .run_exclusive(id, || async {
                        let now = active.fetch_add(1, Ordering::SeqCst) + 1;
                        peak.fetch_max(now, Ordering::SeqCst);
                        tokio::time::sleep(Duration::from_millis(5)).await;
                        active.fetch_sub(1, Ordering::SeqCst);
                    })
                    .await
                    .expect("lock");
            }));
        }
        for handle in handles {
            handle.await.expect("join");
        }

        assert_eq!(peak.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn different_documentations_do_not_contend() {
        let registry = BuildLockRegistry::new(Duration::from_millis(20));
        let _first = registry
            .acquire_within(Uuid::from_u128(1), DEFAULT_LOCK_TIMEOUT)
            .await
            .expect("first");
        let second = registry.run_exclusive(Uuid::from_u128(2), || async {}).await;
        assert!(second.is_ok());
    }

    #[tokio::test]
    async fn prune_keeps_held_and_awaited_locks() {
        let registry = BuildLockRegistry::default();
        registry
            .run_exclusive(Uuid::from_u128(1), || async {})
            .await
            .expect("lock");
        let held = registry
            .acquire_within(Uuid::from_u128(2), DEFAULT_LOCK_TIMEOUT)
            .await
            .expect("lock");

        let (started_tx, started_rx) = oneshot::channel();
        let waiter_registry = registry.clone();
        let waiter = tokio::spawn(async move {
            let _ = started_tx.send(());
            waiter_registry
                .run_exclusive(Uuid::from_u128(2), || async {})
                .await
        });
        started_rx.await.expect("waiter started");

        assert_eq!(registry.len(), 2);
        assert_eq!(registry.prune_idle(), 1);
        assert_eq!(registry.len(), 1);

        drop(held);
        waiter.await.expect("join").expect("waiter acquired");
        assert_eq!(registry.prune_idle(), 1);
        assert!(registry.is_empty());
    }
}

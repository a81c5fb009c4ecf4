//! Per-identity serialization of session processing.

use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

/// One async mutex per identity.
///
/// Holding the guard serializes load, handle, and persist for that identity.
/// Entries are created on demand and pruned once nobody holds or waits on
/// them.
#[derive(Default)]
pub struct SessionLocks {
    locks: scc::HashMap<String, Arc<Mutex<()>>>,
}

impl SessionLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Waits for exclusive access to `identity`.
    pub async fn acquire(&self, identity: &str) -> OwnedMutexGuard<()> {
        let lock = self
            .locks
            .entry_async(identity.to_string())
            .await
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .get()
            .clone();
        lock.lock_owned().await
    }

    /// Drops entries with no holder and no waiter. Returns how many were
    /// removed.
    pub async fn prune_idle(&self) -> usize {
        let before = self.locks.len();
        // The map holds one reference; any other is a held guard or a waiter.
        self.locks
            .retain_async(|_, lock| Arc::strong_count(lock) > 1)
            .await;
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
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_same_identity_is_serialized() {
        let locks = Arc::new(SessionLocks::new());
        let guard = locks.acquire("u1").await;

        let waiter = {
            let locks = locks.clone();
            tokio::spawn(async move {
                let _guard = locks.acquire("u1").await;
            })
        };

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!waiter.is_finished());

        drop(guard);
        tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .unwrap()
            .unwrap();
    }

    #[tokio::test]
    async fn test_different_identities_do_not_block() {
        let locks = SessionLocks::new();
        let _a = locks.acquire("u1").await;
        let b = tokio::time::timeout(Duration::from_secs(1), locks.acquire("u2")).await;
        assert!(b.is_ok());
        assert_eq!(locks.len(), 2);
    }

    #[tokio::test]
    async fn test_prune_keeps_held_locks() {
        let locks = SessionLocks::new();
        let held = locks.acquire("u1").await;
        drop(locks.acquire("u2").await);

        assert_eq!(locks.prune_idle().await, 1);
        assert_eq!(locks.len(), 1);

        drop(held);
        assert_eq!(locks.prune_idle().await, 1);
        assert!(locks.is_empty());
    }
}

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError, Weak};

use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};
use uuid::Uuid;

/// One async lock per live session id. Requests that carry the same session
/// cookie run one after another, so each sees what the previous one saved.
#[derive(Default)]
pub struct SessionLocks {
    locks: Mutex<HashMap<Uuid, Weak<AsyncMutex<()>>>>,
}

impl SessionLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Waits until no other request holds `id`. The lock is released when
    /// the guard is dropped.
    pub async fn acquire(&self, id: Uuid) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
            locks.retain(|_, lock| lock.strong_count() > 0);
            match locks.get(&id).and_then(Weak::upgrade) {
                Some(lock) => lock,
                None => {
                    let lock = Arc::new(AsyncMutex::new(()));
                    locks.insert(id, Arc::downgrade(&lock));
                    lock
                }
            }
        };
        lock.lock_owned().await
    }

    #[cfg(test)]
    fn tracked(&self) -> usize {
        let locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
        locks.values().filter(|lock| lock.strong_count() > 0).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio::time::timeout;

    #[tokio::test]
    async fn test_same_session_waits() {
        let locks = SessionLocks::new();
        let id = Uuid::new_v4();

        let held = locks.acquire(id).await;
        assert!(timeout(Duration::from_millis(20), locks.acquire(id))
            .await
            .is_err());

        drop(held);
        assert!(timeout(Duration::from_millis(20), locks.acquire(id))
            .await
            .is_ok());
    }

    #[tokio::test]
    async fn test_other_sessions_do_not_wait() {
        let locks = SessionLocks::new();
        let _held = locks.acquire(Uuid::new_v4()).await;
        assert!(timeout(Duration::from_millis(20), locks.acquire(Uuid::new_v4()))
            .await
            .is_ok());
    }

    #[tokio::test]
    async fn test_released_locks_are_forgotten() {
        let locks = SessionLocks::new();
        let guard = locks.acquire(Uuid::new_v4()).await;
        assert_eq!(locks.tracked(), 1);
        drop(guard);
        assert_eq!(locks.tracked(), 0);
    }
}

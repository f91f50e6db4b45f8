//! Per-key serialisation of in-flight calls.

use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

type Locks = DashMap<String, Arc<Mutex<()>>>;

/// Lets at most one call per key run at a time.
///
/// A second call for the same key waits for the first to finish, so the
/// cells it writes reflect the order calls were issued in. Calls for
/// different keys run concurrently. A key's lock is dropped once no call
/// holds or waits on it.
#[derive(Debug, Clone, Default)]
pub struct InFlightGuard {
    locks: Arc<Locks>,
}

/// A held turn for one key. Dropping it lets the next waiter run.
#[derive(Debug)]
pub struct Turn {
    key: String,
    held: Option<OwnedMutexGuard<()>>,
    locks: Arc<Locks>,
}

impl Drop for Turn {
    fn drop(&mut self) {
        self.held.take();
        // Only the map's reference left: nobody holds or waits on the key.
        self.locks.remove_if(&self.key, |_, lock| Arc::strong_count(lock) == 1);
    }
}

impl InFlightGuard {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn acquire(&self, key: &str) -> Turn {
        let lock = self.locks.entry(key.to_string()).or_default().clone();
        let held = lock.lock_owned().await;
        Turn {
            key: key.to_string(),
            held: Some(held),
            locks: Arc::clone(&self.locks),
        }
    }

    pub fn is_busy(&self, key: &str) -> bool {
        self.locks
            .get(key)
            .map(|lock| lock.try_lock().is_err())
            .unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_same_key_is_serialised() {
        let guard = InFlightGuard::new();
        let first = guard.acquire("roles/1").await;
        assert!(guard.is_busy("roles/1"));
        assert!(!guard.is_busy("roles/2"));

        let waiter = {
            let guard = guard.clone();
            tokio::spawn(async move {
                let _second = guard.acquire("roles/1").await;
            })
        };

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!waiter.is_finished());

        drop(first);
        waiter.await.unwrap();
        assert!(!guard.is_busy("roles/1"));
    }

    #[tokio::test]
    async fn test_other_keys_do_not_wait() {
        let guard = InFlightGuard::new();
        let _a = guard.acquire("a").await;
        let _b = guard.acquire("b").await;
        assert!(guard.is_busy("a") && guard.is_busy("b"));
    }

    #[tokio::test]
    async fn test_released_keys_are_forgotten() {
        let guard = InFlightGuard::new();
        for id in 0..50 {
            let _turn = guard.acquire(&format!("roles/{}", id)).await;
        }
        assert!(guard.locks.is_empty());
    }

    #[tokio::test]
    async fn test_key_kept_while_a_call_waits() {
        let guard = InFlightGuard::new();
        let first = guard.acquire("roles/1").await;

        let waiter = {
            let guard = guard.clone();
            tokio::spawn(async move {
                let _second = guard.acquire("roles/1").await;
                tokio::time::sleep(Duration::from_millis(20)).await;
            })
        };
        tokio::time::sleep(Duration::from_millis(10)).await;

        drop(first);
        assert!(guard.locks.contains_key("roles/1"));

        waiter.await.unwrap();
        assert!(guard.locks.is_empty());
    }
}

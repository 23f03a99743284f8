//! Process-wide named locks
//!
//! Some resources mutate a shared remote parent (e.g. several records
//! appending to the same DNS zone's permitted networks). Handlers serialise
//! those calls with a lock keyed by the parent's identity.
//!
//! ```rust,ignore
//! let _guard = cloudplane_core::lock::global()
//!     .lock(format!("private_dns_permitted_network_{instance}{zone}"))
//!     .await;
//! // the guard is released on every exit path, including `?`
//! ```

use std::collections::HashMap;
use std::sync::{Arc, LazyLock, Mutex, PoisonError};
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};
use tracing::trace;

static GLOBAL: LazyLock<KeyedMutex> = LazyLock::new(KeyedMutex::new);

/// The process-wide lock registry
pub fn global() -> &'static KeyedMutex {
    &GLOBAL
}

type LockMap = Mutex<HashMap<String, Arc<AsyncMutex<()>>>>;

/// Registry of lazily-created async mutexes keyed by string
///
/// A key's entry lives only while someone holds or waits for it.
#[derive(Debug, Default)]
pub struct KeyedMutex {
    locks: Arc<LockMap>,
}

/// Guard returned by [`KeyedMutex::lock`]; the key is unlocked on drop
#[derive(Debug)]
pub struct KeyGuard {
    key: String,
    guard: Option<OwnedMutexGuard<()>>,
    locks: Arc<LockMap>,
}

impl KeyGuard {
    /// The key this guard holds
    pub fn key(&self) -> &str {
        &self.key
    }
}

impl Drop for KeyGuard {
    fn drop(&mut self) {
        trace!("Releasing lock {}", self.key);
        drop(self.guard.take());

        // Only the map still refers to the mutex: nobody holds or waits
        let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
        if locks.get(&self.key).is_some_and(|m| Arc::strong_count(m) == 1) {
            locks.remove(&self.key);
        }
    }
}

impl KeyedMutex {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Acquire the lock for `key`, waiting while another holder has it
    pub async fn lock(&self, key: impl Into<String>) -> KeyGuard {
        let key = key.into();
        let mutex = self.entry(&key);

        trace!("Acquiring lock {}", key);
        let guard = mutex.lock_owned().await;

        self.guard(key, guard)
    }

    /// Acquire the lock for `key` only if nobody holds it
    pub fn try_lock(&self, key: impl Into<String>) -> Option<KeyGuard> {
        let key = key.into();
        let guard = self.entry(&key).try_lock_owned().ok()?;
        Some(self.guard(key, guard))
    }

    /// Number of keys currently held or waited on
    pub fn len(&self) -> usize {
        self.locks.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// Whether no key is held or waited on
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn guard(&self, key: String, guard: OwnedMutexGuard<()>) -> KeyGuard {
        KeyGuard {
            key,
            guard: Some(guard),
            locks: Arc::clone(&self.locks),
        }
    }

    fn entry(&self, key: &str) -> Arc<AsyncMutex<()>> {
        let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(locks.entry(key.to_string()).or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[tokio::test]
    async fn test_same_key_is_exclusive() {
        let locks = KeyedMutex::new();

        let guard = locks.lock("zone-a").await;
        assert_eq!(guard.key(), "zone-a");
        assert!(locks.try_lock("zone-a").is_none());

        drop(guard);
        assert!(locks.try_lock("zone-a").is_some());
    }

    #[test]
    fn test_waiter_wakes_when_guard_drops() {
        let locks = KeyedMutex::new();
        let guard = tokio_test::block_on(locks.lock("zone-a"));

        let mut waiter = tokio_test::task::spawn(locks.lock("zone-a"));
        tokio_test::assert_pending!(waiter.poll());

        drop(guard);
        assert!(waiter.is_woken());
        let next = tokio_test::assert_ready!(waiter.poll());
        assert_eq!(next.key(), "zone-a");
    }

    #[tokio::test]
    async fn test_different_keys_are_independent() {
        let locks = KeyedMutex::new();

        let _a = locks.lock("zone-a").await;
        let b = locks.try_lock("zone-b");
        assert!(b.is_some());
        assert_eq!(locks.len(), 2);
    }

    #[tokio::test]
    async fn test_idle_keys_are_dropped() {
        let locks = KeyedMutex::new();

        for n in 0..16 {
            let _guard = locks.lock(format!("zone-{n}")).await;
            assert_eq!(locks.len(), 1);
        }
        assert!(locks.is_empty());

        drop(locks.try_lock("zone-a"));
        assert!(locks.is_empty());
    }

    #[test]
    fn test_key_kept_while_waited_on() {
        let locks = KeyedMutex::new();
        let guard = tokio_test::block_on(locks.lock("zone-a"));
        let mut waiter = tokio_test::task::spawn(locks.lock("zone-a"));
        tokio_test::assert_pending!(waiter.poll());

        drop(guard);
        assert_eq!(locks.len(), 1);

        let next = tokio_test::assert_ready!(waiter.poll());
        drop(next);
        drop(waiter);
        assert!(locks.is_empty());
    }

    #[tokio::test]
    async fn test_released_on_error_path() {
        let locks = KeyedMutex::new();

        async fn failing(locks: &KeyedMutex) -> crate::Result<()> {
            let _guard = locks.lock("parent").await;
            let call: crate::Result<()> = Err(crate::Error::validation("boom"));
            call?;
            Ok(())
        }

        assert!(failing(&locks).await.is_err());
        assert!(locks.try_lock("parent").is_some());
    }

    #[tokio::test]
    async fn test_serialises_concurrent_holders() {
        let locks = Arc::new(KeyedMutex::new());
        let inside = Arc::new(AtomicUsize::new(0));
        let max_inside = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::new();
        for _ in 0..8 {
            let locks = Arc::clone(&locks);
            let inside = Arc::clone(&inside);
            let max_inside = Arc::clone(&max_inside);
            handles.push(tokio::spawn(async move {
                let _guard = locks.lock("shared").await;
                let now = inside.fetch_add(1, Ordering::SeqCst) + 1;
                max_inside.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(2)).await;
                inside.fetch_sub(1, Ordering::SeqCst);
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        assert_eq!(max_inside.load(Ordering::SeqCst), 1);
    }
}

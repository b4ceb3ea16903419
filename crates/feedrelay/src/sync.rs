//! Synchronization primitives.

use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{Mutex, OwnedMutexGuard};

/// Per-key async mutex.
///
/// Different keys can be held concurrently while holders of the same key are
/// serialized.
///
/// # Example
///
/// ```ignore
/// let locks = KeyedLocks::new();
///
/// let guard = locks.try_acquire("sub_a").unwrap();
/// assert!(locks.try_acquire("sub_a").is_none());
/// assert!(locks.try_acquire("sub_b").is_some());
/// ```
#[derive(Clone, Default)]
pub struct KeyedLocks {
    locks: Arc<DashMap<String, Arc<Mutex<()>>>>,
}

impl KeyedLocks {
    /// Create a new empty lock collection.
    pub fn new() -> Self {
        Self::default()
    }

    /// Get or create the lock for the given key.
    pub fn get(&self, key: &str) -> Arc<Mutex<()>> {
        self.locks
            .entry(key.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// Wait for the lock for `key`.
    pub async fn acquire(&self, key: &str) -> OwnedMutexGuard<()> {
        self.get(key).lock_owned().await
    }

    /// Acquire the lock for `key` if it is free.
    pub fn try_acquire(&self, key: &str) -> Option<OwnedMutexGuard<()>> {
        self.get(key).try_lock_owned().ok()
    }

    /// Forget the lock for `key`. Outstanding guards stay valid.
    pub fn remove(&self, key: &str) {
        self.locks.remove(key);
    }

    /// Return the number of lock entries currently held.
    pub fn len(&self) -> usize {
        self.locks.len()
    }

    /// Return true if there are no lock entries.
    pub fn is_empty(&self) -> bool {
        self.locks.is_empty()
    }
}

//! A map of async mutexes, one per key.
//!
//! Two tasks touching the same product (or the same session) serialise on the key's mutex, while tasks touching
//! different keys never contend. Entries are created on first use and dropped again once nobody holds or waits on
//! them, so the map stays as small as the set of keys currently in use.
use std::{
    collections::HashMap,
    fmt::Debug,
    hash::Hash,
    sync::{Arc, Mutex},
};

use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

type Slot = Arc<AsyncMutex<()>>;

pub struct KeyedLock<K> {
    slots: Arc<Mutex<HashMap<K, Slot>>>,
}

impl<K> Clone for KeyedLock<K> {
    fn clone(&self) -> Self {
        Self { slots: Arc::clone(&self.slots) }
    }
}

impl<K> Default for KeyedLock<K> {
    fn default() -> Self {
        Self { slots: Arc::new(Mutex::new(HashMap::new())) }
    }
}

impl<K> Debug for KeyedLock<K> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "KeyedLock")
    }
}

/// Holds the critical section for one key. Dropping the guard releases it.
pub struct KeyGuard<K: Eq + Hash + Clone> {
    key: K,
    guard: Option<OwnedMutexGuard<()>>,
    slots: Arc<Mutex<HashMap<K, Slot>>>,
}

impl<K: Eq + Hash + Clone> KeyGuard<K> {
    pub fn key(&self) -> &K {
        &self.key
    }
}

impl<K: Eq + Hash + Clone> Drop for KeyGuard<K> {
    fn drop(&mut self) {
        // Release the async mutex before inspecting the reference count.
        drop(self.guard.take());
        if let Ok(mut slots) = self.slots.lock() {
            let unused = slots.get(&self.key).map(|s| Arc::strong_count(s) == 1).unwrap_or(false);
            if unused {
                slots.remove(&self.key);
            }
        }
    }
}

impl<K: Eq + Hash + Clone> KeyedLock<K> {
    pub fn new() -> Self {
        Self::default()
    }

    fn slot(&self, key: &K) -> Slot {
        let mut slots = self.slots.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        Arc::clone(slots.entry(key.clone()).or_default())
    }

    /// Waits until the critical section for `key` is free and enters it.
    pub async fn lock(&self, key: &K) -> KeyGuard<K> {
        let slot = self.slot(key);
        let guard = slot.lock_owned().await;
        KeyGuard { key: key.clone(), guard: Some(guard), slots: Arc::clone(&self.slots) }
    }

    /// Enters the critical section for `key` only if nobody else is in it right now.
    pub fn try_lock(&self, key: &K) -> Option<KeyGuard<K>> {
        let slot = self.slot(key);
        let guard = slot.try_lock_owned().ok()?;
        Some(KeyGuard { key: key.clone(), guard: Some(guard), slots: Arc::clone(&self.slots) })
    }

    /// The number of keys that currently have a live critical section.
    pub fn active_keys(&self) -> usize {
        self.slots.lock().map(|s| s.len()).unwrap_or(0)
    }
}

#[cfg(test)]
mod test {
    use std::time::Duration;

    use super::*;

    #[tokio::test]
    async fn same_key_is_exclusive() {
        let locks = KeyedLock::<i64>::new();
        let guard = locks.lock(&1).await;
        assert!(locks.try_lock(&1).is_none());
        assert!(locks.try_lock(&2).is_some());
        drop(guard);
        assert!(locks.try_lock(&1).is_some());
    }

    #[tokio::test]
    async fn waiters_are_released_in_turn() {
        let locks = KeyedLock::<String>::new();
        let counter = Arc::new(Mutex::new(Vec::new()));
        let mut tasks = Vec::new();
        for i in 0..5 {
            let locks = locks.clone();
            let counter = counter.clone();
            tasks.push(tokio::spawn(async move {
                let _g = locks.lock(&"k".to_string()).await;
                counter.lock().unwrap().push(i);
                let inside = counter.lock().unwrap().len();
                tokio::time::sleep(Duration::from_millis(5)).await;
                assert_eq!(counter.lock().unwrap().len(), inside);
            }));
        }
        for t in tasks {
            t.await.unwrap();
        }
        assert_eq!(counter.lock().unwrap().len(), 5);
    }

    #[tokio::test]
    async fn unused_keys_are_dropped() {
        let locks = KeyedLock::<i64>::new();
        {
            let _a = locks.lock(&1).await;
            let _b = locks.lock(&2).await;
            assert_eq!(locks.active_keys(), 2);
        }
        assert_eq!(locks.active_keys(), 0);
        assert!(locks.try_lock(&3).is_some());
        assert_eq!(locks.active_keys(), 0);
    }
}

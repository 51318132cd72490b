//! Bounded, thread-safe status cache.
//!
//! Classifying a UCD or unit string means running a grammar over it and
//! consulting word lists. Documents repeat the same handful of values many
//! times, so classifications are memoized in a least-recently-used map.
//! The cache is shared by every parse in the process, so access goes
//! through a single mutex.

use std::num::NonZeroUsize;
use std::sync::{Mutex, MutexGuard, PoisonError};

use lru::LruCache;

/// Capacity used for the UCD and unit caches.
pub const DEFAULT_CAPACITY: usize = 200;

/// Fixed-capacity LRU map from raw strings to classification results.
pub struct StatusCache<V> {
    inner: Mutex<LruCache<String, V>>,
}

impl<V: Clone> StatusCache<V> {
    /// Creates a cache holding at most `capacity` entries (minimum 1).
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            inner: Mutex::new(LruCache::new(capacity)),
        }
    }

    /// Returns the cached value for `key`, computing and storing it on a miss.
    ///
    /// `compute` runs without the lock held; two threads missing on the same
    /// key may both compute it.
    pub fn get_or_insert_with<F>(&self, key: &str, compute: F) -> V
    where
        F: FnOnce() -> V,
    {
        let cached = self.lock().get(key).cloned();
        if let Some(value) = cached {
            return value;
        }
        let value = compute();
        self.lock().put(key.to_string(), value.clone());
        value
    }

    /// Number of cached entries.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// True if nothing is cached.
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> MutexGuard<'_, LruCache<String, V>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<V: Clone> Default for StatusCache<V> {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use std::sync::Arc;

    #[test]
    fn test_memoizes() {
        let cache = StatusCache::new(4);
        let calls = Cell::new(0);
        let compute = || {
            calls.set(calls.get() + 1);
            42
        };
        assert_eq!(cache.get_or_insert_with("a", compute), 42);
        assert_eq!(cache.get_or_insert_with("a", compute), 42);
        assert_eq!(calls.get(), 1);
    }

    #[test]
    fn test_evicts_least_recently_used() {
        let cache = StatusCache::new(2);
        cache.get_or_insert_with("a", || 1);
        cache.get_or_insert_with("b", || 2);
        // touch "a" so "b" is the eviction candidate
        cache.get_or_insert_with("a", || 0);
        cache.get_or_insert_with("c", || 3);
        assert_eq!(cache.len(), 2);
        assert_eq!(cache.get_or_insert_with("a", || 0), 1);
        assert_eq!(cache.get_or_insert_with("b", || 20), 20);
    }

    #[test]
    fn test_zero_capacity_is_clamped() {
        let cache = StatusCache::new(0);
        assert_eq!(cache.get_or_insert_with("x", || 'x'), 'x');
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_shared_across_threads() {
        let cache = Arc::new(StatusCache::<usize>::default());
        let handles: Vec<_> = (0..4)
            .map(|i| {
                let cache = Arc::clone(&cache);
                std::thread::spawn(move || {
                    for j in 0..50 {
                        let key = format!("k{}", (i * 50 + j) % 300);
                        cache.get_or_insert_with(&key, || j);
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert!(cache.len() <= DEFAULT_CAPACITY);
    }
}

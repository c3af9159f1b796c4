//! A thread-safe TTL cache backed by `DashMap`, lazily evicting on read.
//!
//! Both positive and negative results are cached; entries are never
//! actively swept, only dropped the next time they're read past expiry.

use std::hash::Hash;
use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;

#[derive(Clone)]
pub struct TtlCache<K, V> {
    inner: Arc<DashMap<K, (V, Instant)>>,
    ttl: Duration,
}

impl<K: Eq + Hash + Clone, V: Clone> TtlCache<K, V> {
    pub fn new(ttl: Duration) -> Self {
        Self {
            inner: Arc::new(DashMap::new()),
            ttl,
        }
    }

    pub fn get(&self, key: &K) -> Option<V> {
        if let Some(entry) = self.inner.get(key) {
            let (value, expires_at) = entry.value();
            if Instant::now() < *expires_at {
                return Some(value.clone());
            }
            drop(entry);
            self.inner.remove(key);
        }
        None
    }

    pub fn insert(&self, key: K, value: V) {
        self.inner.insert(key, (value, Instant::now() + self.ttl));
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}

//! In-memory LRU cache tier

use serde_json::Value;
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;

struct Entry {
    value: Value,
    stored_at: Instant,
    ttl: Duration,
}

impl Entry {
    fn is_expired(&self, now: Instant) -> bool {
        now.saturating_duration_since(self.stored_at) > self.ttl
    }
}

struct Inner {
    entries: HashMap<String, Entry>,
    // Keys in least-recently-used order, front = oldest
    order: Vec<String>,
}

impl Inner {
    fn touch(&mut self, key: &str) {
        if let Some(pos) = self.order.iter().position(|k| k == key) {
            let key = self.order.remove(pos);
            self.order.push(key);
        }
    }

    fn remove(&mut self, key: &str) {
        self.entries.remove(key);
        if let Some(pos) = self.order.iter().position(|k| k == key) {
            self.order.remove(pos);
        }
    }
}

/// Bounded in-memory cache with TTL and least-recently-used eviction.
pub struct MemoryCache {
    max_entries: usize,
    default_ttl: Duration,
    inner: Mutex<Inner>,
}

impl MemoryCache {
    /// Create a memory cache holding at most `max_entries` values.
    pub fn new(max_entries: usize, default_ttl: Duration) -> Self {
        Self {
            max_entries: max_entries.max(1),
            default_ttl,
            inner: Mutex::new(Inner {
                entries: HashMap::new(),
                order: Vec::new(),
            }),
        }
    }

    /// Get a value; expired entries are evicted and treated as absent.
    pub async fn get(&self, key: &str) -> Option<Value> {
        let mut inner = self.inner.lock().await;

        let expired = match inner.entries.get(key) {
            Some(entry) => entry.is_expired(Instant::now()),
            None => return None,
        };

        if expired {
            inner.remove(key);
            return None;
        }

        inner.touch(key);
        inner.entries.get(key).map(|entry| entry.value.clone())
    }

    /// Store a value, evicting the least-recently-used entry at capacity.
    pub async fn set(&self, key: &str, value: Value, ttl: Option<Duration>) {
        let mut inner = self.inner.lock().await;

        if !inner.entries.contains_key(key) && inner.entries.len() >= self.max_entries {
            if let Some(oldest) = inner.order.first().cloned() {
                inner.remove(&oldest);
            }
        }

        let entry = Entry {
            value,
            stored_at: Instant::now(),
            ttl: ttl.unwrap_or(self.default_ttl),
        };
        if inner.entries.insert(key.to_string(), entry).is_none() {
            inner.order.push(key.to_string());
        } else {
            inner.touch(key);
        }
    }

    /// Remove a value.
    pub async fn delete(&self, key: &str) {
        let mut inner = self.inner.lock().await;
        inner.remove(key);
    }

    /// Remove all values.
    pub async fn clear(&self) {
        let mut inner = self.inner.lock().await;
        inner.entries.clear();
        inner.order.clear();
    }

    /// Number of live entries (expired entries may still be counted until
    /// the next read touches them).
    pub async fn len(&self) -> usize {
        self.inner.lock().await.entries.len()
    }

    /// Whether the cache holds no entries.
    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

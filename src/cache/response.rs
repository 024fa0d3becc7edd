//! API-response cache tier
//!
//! Short-lived unbounded map for raw remote responses. Sits behind the
//! memory and disk tiers so repeated fetches within one run never hit the
//! network twice.

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

/// Cache tier for raw API responses.
pub struct ResponseCache {
    default_ttl: Duration,
    entries: Mutex<HashMap<String, Entry>>,
}

impl ResponseCache {
    /// Create a response cache with the given default TTL.
    pub fn new(default_ttl: Duration) -> Self {
        Self {
            default_ttl,
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Get a value; expired entries are evicted and treated as absent.
    pub async fn get(&self, key: &str) -> Option<Value> {
        let mut entries = self.entries.lock().await;

        let expired = match entries.get(key) {
            Some(entry) => Instant::now().saturating_duration_since(entry.stored_at) > entry.ttl,
            None => return None,
        };

        if expired {
            entries.remove(key);
            return None;
        }

        entries.get(key).map(|entry| entry.value.clone())
    }

    /// Store a value.
    pub async fn set(&self, key: &str, value: Value, ttl: Option<Duration>) {
        let mut entries = self.entries.lock().await;
        entries.insert(
            key.to_string(),
            Entry {
                value,
                stored_at: Instant::now(),
                ttl: ttl.unwrap_or(self.default_ttl),
            },
        );
    }

    /// Remove a value.
    pub async fn delete(&self, key: &str) {
        self.entries.lock().await.remove(key);
    }

    /// Remove all values.
    pub async fn clear(&self) {
        self.entries.lock().await.clear();
    }

    /// Whether the tier holds no entries.
    pub async fn is_empty(&self) -> bool {
        self.entries.lock().await.is_empty()
    }
}

//! Multi-level caching
//!
//! Composes three tiers behind one get/set/delete/clear contract:
//!
//! 1. **Memory** - bounded LRU, fastest, shortest-lived
//! 2. **Disk** - durable across runs, longest-lived
//! 3. **Response** - raw API responses, shortest TTL
//!
//! Reads promote hits into the faster tiers; writes go to all three tiers
//! concurrently. Disk tier I/O failures never fail a `get` or `set` for the
//! other tiers.

use serde_json::Value;
use std::path::PathBuf;
use std::time::Duration;

pub mod disk;
pub mod memory;
pub mod response;

pub use disk::DiskCache;
pub use memory::MemoryCache;
pub use response::ResponseCache;

/// Default TTL for the memory tier (1 hour).
pub const MEMORY_TTL: Duration = Duration::from_secs(3600);

/// Default TTL for the disk tier (24 hours).
pub const DISK_TTL: Duration = Duration::from_secs(86_400);

/// Default TTL for the response tier (30 minutes).
pub const RESPONSE_TTL: Duration = Duration::from_secs(1800);

/// Default capacity of the memory tier.
pub const MEMORY_MAX_ENTRIES: usize = 1000;

/// Cache errors. Only `clear` surfaces errors; the read/write paths treat
/// disk failures as misses.
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    /// I/O failure while clearing the disk tier
    #[error("cache I/O error: {0}")]
    Io(String),
}

/// Three-tier cache shared process-wide.
///
/// The cache outlives a single pipeline run; all mutation goes through its
/// synchronized accessors.
pub struct MultiLevelCache {
    memory: MemoryCache,
    disk: DiskCache,
    response: ResponseCache,
}

impl MultiLevelCache {
    /// Create a cache with the disk tier rooted at `cache_dir`.
    pub fn new(cache_dir: impl Into<PathBuf>) -> Self {
        Self {
            memory: MemoryCache::new(MEMORY_MAX_ENTRIES, MEMORY_TTL),
            disk: DiskCache::new(cache_dir, DISK_TTL),
            response: ResponseCache::new(RESPONSE_TTL),
        }
    }

    /// Get a value, checking tiers fastest-first and promoting hits.
    pub async fn get(&self, key: &str) -> Option<Value> {
        if let Some(value) = self.memory.get(key).await {
            crate::metrics::record_cache_hit("memory");
            return Some(value);
        }

        if let Some(value) = self.disk.get(key).await {
            crate::metrics::record_cache_hit("disk");
            self.memory.set(key, value.clone(), None).await;
            return Some(value);
        }

        if let Some(value) = self.response.get(key).await {
            crate::metrics::record_cache_hit("response");
            futures_util::join!(
                self.memory.set(key, value.clone(), None),
                self.disk.set(key, value.clone(), None),
            );
            return Some(value);
        }

        crate::metrics::record_cache_miss();
        None
    }

    /// Store a value in all three tiers concurrently.
    ///
    /// `ttl` overrides each tier's default when given; each tier otherwise
    /// enforces its own TTL.
    pub async fn set(&self, key: &str, value: Value, ttl: Option<Duration>) {
        futures_util::join!(
            self.memory.set(key, value.clone(), ttl),
            self.disk.set(key, value.clone(), ttl),
            self.response.set(key, value, ttl),
        );
    }

    /// Remove a value from all tiers.
    pub async fn delete(&self, key: &str) {
        futures_util::join!(
            self.memory.delete(key),
            self.disk.delete(key),
            self.response.delete(key),
        );
    }

    /// Clear all tiers. All tiers are empty when this returns.
    pub async fn clear(&self) -> Result<(), CacheError> {
        let (_, disk_result, _) = futures_util::join!(
            self.memory.clear(),
            self.disk.clear(),
            self.response.clear(),
        );
        disk_result.map_err(|e| CacheError::Io(e.to_string()))
    }

    /// Direct access to the memory tier (tests and diagnostics).
    pub fn memory(&self) -> &MemoryCache {
        &self.memory
    }

    /// Direct access to the disk tier (tests and diagnostics).
    pub fn disk(&self) -> &DiskCache {
        &self.disk
    }

    /// Direct access to the response tier (tests and diagnostics).
    pub fn response(&self) -> &ResponseCache {
        &self.response
    }
}

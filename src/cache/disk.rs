//! On-disk cache tier
//!
//! One JSON file per key under the cache directory. I/O failures are
//! logged and reported as misses so a broken disk never takes down the
//! other tiers.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, warn};

#[derive(Serialize, Deserialize)]
struct DiskEntry {
    value: Value,
    stored_at_ms: i64,
    ttl_ms: u64,
}

impl DiskEntry {
    fn is_expired(&self, now_ms: i64) -> bool {
        now_ms.saturating_sub(self.stored_at_ms) > self.ttl_ms as i64
    }
}

/// Durable cache tier backed by per-key JSON files.
pub struct DiskCache {
    dir: PathBuf,
    default_ttl: Duration,
}

impl DiskCache {
    /// Create a disk cache rooted at `dir`.
    ///
    /// The directory is created on first write; a missing directory is a
    /// read miss, not an error.
    pub fn new(dir: impl Into<PathBuf>, default_ttl: Duration) -> Self {
        Self {
            dir: dir.into(),
            default_ttl,
        }
    }

    fn entry_path(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{}.json", sanitize_key(key)))
    }

    /// Get a value; expired entries are removed and treated as absent.
    /// I/O or decode failures are logged and treated as a miss.
    pub async fn get(&self, key: &str) -> Option<Value> {
        let path = self.entry_path(key);

        let contents = match tokio::fs::read_to_string(&path).await {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return None,
            Err(e) => {
                warn!(key, path = %path.display(), error = %e, "Disk cache read failed");
                return None;
            }
        };

        let entry: DiskEntry = match serde_json::from_str(&contents) {
            Ok(entry) => entry,
            Err(e) => {
                warn!(key, error = %e, "Disk cache entry corrupted, removing");
                let _ = tokio::fs::remove_file(&path).await;
                return None;
            }
        };

        if entry.is_expired(chrono::Utc::now().timestamp_millis()) {
            debug!(key, "Disk cache entry expired");
            let _ = tokio::fs::remove_file(&path).await;
            return None;
        }

        Some(entry.value)
    }

    /// Store a value. I/O failures are logged, never raised.
    pub async fn set(&self, key: &str, value: Value, ttl: Option<Duration>) {
        let entry = DiskEntry {
            value,
            stored_at_ms: chrono::Utc::now().timestamp_millis(),
            ttl_ms: ttl.unwrap_or(self.default_ttl).as_millis() as u64,
        };

        if let Err(e) = tokio::fs::create_dir_all(&self.dir).await {
            warn!(dir = %self.dir.display(), error = %e, "Disk cache directory creation failed");
            return;
        }

        let path = self.entry_path(key);
        let json = match serde_json::to_string(&entry) {
            Ok(json) => json,
            Err(e) => {
                warn!(key, error = %e, "Disk cache serialization failed");
                return;
            }
        };

        if let Err(e) = tokio::fs::write(&path, json).await {
            warn!(key, path = %path.display(), error = %e, "Disk cache write failed");
        }
    }

    /// Remove a value. A missing file is not an error.
    pub async fn delete(&self, key: &str) {
        let path = self.entry_path(key);
        if let Err(e) = tokio::fs::remove_file(&path).await {
            if e.kind() != std::io::ErrorKind::NotFound {
                warn!(key, error = %e, "Disk cache delete failed");
            }
        }
    }

    /// Remove all cache files under the directory.
    pub async fn clear(&self) -> std::io::Result<()> {
        let mut entries = match tokio::fs::read_dir(&self.dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(()),
            Err(e) => return Err(e),
        };

        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) == Some("json") {
                tokio::fs::remove_file(&path).await?;
            }
        }
        Ok(())
    }

    /// Write an entry with an explicit stored-at timestamp. Test hook for
    /// expiry behavior without wall-clock sleeps.
    #[cfg(test)]
    pub async fn set_with_stored_at(&self, key: &str, value: Value, ttl: Duration, stored_at_ms: i64) {
        tokio::fs::create_dir_all(&self.dir).await.unwrap();
        let entry = DiskEntry {
            value,
            stored_at_ms,
            ttl_ms: ttl.as_millis() as u64,
        };
        tokio::fs::write(self.entry_path(key), serde_json::to_string(&entry).unwrap())
            .await
            .unwrap();
    }

    /// Cache directory path.
    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

/// Map a cache key to a filesystem-safe file stem.
///
/// Keys contain `:` separators (`metainfo:crypto`); anything outside
/// `[A-Za-z0-9_-]` becomes `_` so keys can never traverse out of the cache
/// directory.
fn sanitize_key(key: &str) -> String {
    key.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_sanitize_key() {
        assert_eq!(sanitize_key("metainfo:crypto"), "metainfo_crypto");
        assert_eq!(sanitize_key("../../etc/passwd"), "______etc_passwd");
        assert_eq!(sanitize_key("scan_forex-2"), "scan_forex-2");
    }

    #[tokio::test]
    async fn test_set_get_round_trip() {
        let dir = tempfile::TempDir::new().unwrap();
        let cache = DiskCache::new(dir.path(), Duration::from_secs(60));

        cache.set("metainfo:crypto", json!({"fields": []}), None).await;
        assert_eq!(
            cache.get("metainfo:crypto").await,
            Some(json!({"fields": []}))
        );
        assert_eq!(cache.get("missing").await, None);
    }

    #[tokio::test]
    async fn test_expired_entry_removed_on_read() {
        let dir = tempfile::TempDir::new().unwrap();
        let cache = DiskCache::new(dir.path(), Duration::from_secs(60));

        let long_ago = chrono::Utc::now().timestamp_millis() - 10_000;
        cache
            .set_with_stored_at("stale", json!(1), Duration::from_secs(1), long_ago)
            .await;

        assert_eq!(cache.get("stale").await, None);
        // Entry file was lazily evicted
        assert!(!cache.entry_path("stale").exists());
    }

    #[tokio::test]
    async fn test_corrupted_entry_is_a_miss() {
        let dir = tempfile::TempDir::new().unwrap();
        let cache = DiskCache::new(dir.path(), Duration::from_secs(60));

        tokio::fs::create_dir_all(dir.path()).await.unwrap();
        tokio::fs::write(cache.entry_path("bad"), "not json")
            .await
            .unwrap();

        assert_eq!(cache.get("bad").await, None);
    }

    #[tokio::test]
    async fn test_clear_removes_all_entries() {
        let dir = tempfile::TempDir::new().unwrap();
        let cache = DiskCache::new(dir.path(), Duration::from_secs(60));

        cache.set("a", json!(1), None).await;
        cache.set("b", json!(2), None).await;
        cache.clear().await.unwrap();

        assert_eq!(cache.get("a").await, None);
        assert_eq!(cache.get("b").await, None);
    }

    #[tokio::test]
    async fn test_clear_on_missing_directory_is_ok() {
        let cache = DiskCache::new("/nonexistent/cache/dir", Duration::from_secs(60));
        assert!(cache.clear().await.is_ok());
    }
}

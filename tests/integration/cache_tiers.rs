//! Integration tests for the multi-level cache

use scanner_spec_generator::cache::MultiLevelCache;
use serde_json::json;
use std::time::Duration;

#[tokio::test]
async fn test_ttl_expiry_and_repopulation_across_tiers() {
    let dir = tempfile::TempDir::new().unwrap();
    let cache = MultiLevelCache::new(dir.path());

    cache
        .set("k", json!("v1"), Some(Duration::from_secs(1)))
        .await;
    assert_eq!(cache.get("k").await, Some(json!("v1")));

    // After the TTL elapses, the entry is absent in every tier
    tokio::time::sleep(Duration::from_millis(1300)).await;
    assert_eq!(cache.get("k").await, None);
    assert_eq!(cache.memory().get("k").await, None);
    assert_eq!(cache.disk().get("k").await, None);
    assert_eq!(cache.response().get("k").await, None);

    // A subsequent set repopulates all tiers
    cache
        .set("k", json!("v2"), Some(Duration::from_secs(60)))
        .await;
    assert_eq!(cache.memory().get("k").await, Some(json!("v2")));
    assert_eq!(cache.disk().get("k").await, Some(json!("v2")));
    assert_eq!(cache.response().get("k").await, Some(json!("v2")));
}

#[tokio::test]
async fn test_disk_tier_survives_memory_loss() {
    let dir = tempfile::TempDir::new().unwrap();

    {
        let cache = MultiLevelCache::new(dir.path());
        cache.set("persistent", json!({"fields": 3}), None).await;
    }

    // A fresh cache over the same directory simulates a new run: only the
    // disk tier carries over, and a read promotes back into memory.
    let cache = MultiLevelCache::new(dir.path());
    assert_eq!(cache.memory().get("persistent").await, None);
    assert_eq!(cache.get("persistent").await, Some(json!({"fields": 3})));
    assert_eq!(
        cache.memory().get("persistent").await,
        Some(json!({"fields": 3}))
    );
}

#[tokio::test]
async fn test_clear_leaves_all_tiers_empty() {
    let dir = tempfile::TempDir::new().unwrap();
    let cache = MultiLevelCache::new(dir.path());

    for i in 0..5 {
        cache.set(&format!("k{i}"), json!(i), None).await;
    }
    cache.clear().await.unwrap();

    for i in 0..5 {
        assert_eq!(cache.get(&format!("k{i}")).await, None);
    }
    assert!(cache.memory().is_empty().await);
    assert!(cache.response().is_empty().await);
}

//! End-to-end persistence tests against the file-backed store
//!
//! Exercises the full provider lifecycle: write, restart, hydrate.

use rekindle::{
    Cache, CacheConfig, CacheEntry, CacheProvider, PersistentCache, PlainHandler, StorageHandler,
    UpgradeContext,
};
use serde_json::json;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use tempfile::tempdir;

fn config_at(dir: &Path, version: u32) -> CacheConfig {
    CacheConfig::new("app", "responses")
        .with_directory(dir)
        .with_version(version)
}

fn init_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init();
}

#[tokio::test]
async fn test_set_survives_restart() {
    init_logging();
    let dir = tempdir().unwrap();
    let config = config_at(dir.path(), 1);

    {
        let cache = PersistentCache::open(&config).await.unwrap();
        cache.set("user:1", CacheEntry::value(json!({"name": "a"})));

        // Synchronous read-after-write
        assert_eq!(
            cache.get("user:1").unwrap().data,
            Some(json!({"name": "a"}))
        );

        cache.flush().await;
    }

    // A fresh provider over the same store hydrates the entry
    let cache = PersistentCache::open(&config).await.unwrap();
    assert_eq!(
        cache.get("user:1").unwrap().data,
        Some(json!({"name": "a"}))
    );
    assert_eq!(cache.keys(), vec!["user:1"]);
}

#[tokio::test]
async fn test_hydration_is_idempotent_across_restarts() {
    init_logging();
    let dir = tempdir().unwrap();
    let config = config_at(dir.path(), 1);

    {
        let cache = PersistentCache::open(&config).await.unwrap();
        cache.set("user:1", CacheEntry::value(json!(1)));
        cache.set("user:2", CacheEntry::value(json!(2)));
        cache.set("product:1", CacheEntry::value(json!(3)));
        cache.flush().await;
    }

    let first = PersistentCache::open(&config).await.unwrap();
    let second = PersistentCache::open(&config).await.unwrap();

    let mut keys1 = first.keys();
    let mut keys2 = second.keys();
    keys1.sort();
    keys2.sort();

    assert_eq!(keys1, vec!["product:1", "user:1", "user:2"]);
    assert_eq!(keys1, keys2);

    for key in &keys1 {
        assert_eq!(first.get(key).unwrap().data, second.get(key).unwrap().data);
    }
}

#[tokio::test]
async fn test_transient_state_never_resurrected() {
    init_logging();
    let dir = tempdir().unwrap();
    let config = config_at(dir.path(), 1);

    {
        let cache = PersistentCache::open(&config).await.unwrap();
        cache.set("user:2", CacheEntry::validating(None));
        cache.set("user:2", CacheEntry::value(json!({"name": "b"})));
        cache.set("user:3", CacheEntry::loading());
        cache.flush().await;
    }

    let cache = PersistentCache::open(&config).await.unwrap();

    // The settled value came back; the in-flight key did not
    assert_eq!(
        cache.get("user:2").unwrap().data,
        Some(json!({"name": "b"}))
    );
    assert!(cache.get("user:3").is_none());
}

#[tokio::test]
async fn test_version_bump_discards_persisted_state() {
    init_logging();
    let dir = tempdir().unwrap();

    {
        let cache = PersistentCache::open(&config_at(dir.path(), 1)).await.unwrap();
        cache.set("user:1", CacheEntry::value(json!("v1 data")));
        cache.flush().await;
    }

    let cache = PersistentCache::open(&config_at(dir.path(), 2)).await.unwrap();
    assert!(cache.keys().is_empty());

    // And the wipe is durable: reopening at the same version stays empty
    drop(cache);
    let cache = PersistentCache::open(&config_at(dir.path(), 2)).await.unwrap();
    assert!(cache.keys().is_empty());
}

#[tokio::test]
async fn test_delete_and_clear_survive_restart() {
    init_logging();
    let dir = tempdir().unwrap();
    let config = config_at(dir.path(), 1);

    {
        let cache = PersistentCache::open(&config).await.unwrap();
        cache.set("a", CacheEntry::value(json!(1)));
        cache.set("b", CacheEntry::value(json!(2)));
        cache.delete("a");
        cache.flush().await;
    }

    {
        let cache = PersistentCache::open(&config).await.unwrap();
        assert!(cache.get("a").is_none());
        assert_eq!(cache.get("b").unwrap().data, Some(json!(2)));

        cache.clear();
        cache.flush().await;
    }

    let cache = PersistentCache::open(&config).await.unwrap();
    assert!(cache.keys().is_empty());
}

/// Handler that counts upgrade-hook invocations
struct CountingHandler {
    inner: PlainHandler,
    upgrades: Arc<AtomicU32>,
}

impl StorageHandler for CountingHandler {
    fn revive(&self, key: &str, raw: &[u8]) -> rekindle::core::Result<Option<CacheEntry>> {
        self.inner.revive(key, raw)
    }

    fn replace(&self, key: &str, entry: &CacheEntry) -> rekindle::core::Result<Option<Vec<u8>>> {
        self.inner.replace(key, entry)
    }

    fn upgrade_object_store(&self, ctx: &UpgradeContext<'_>) -> rekindle::core::Result<()> {
        assert!(ctx.old_version < ctx.new_version);
        self.upgrades.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

#[tokio::test]
async fn test_upgrade_hook_runs_once_per_version_change() {
    init_logging();
    let dir = tempdir().unwrap();
    let upgrades = Arc::new(AtomicU32::new(0));

    let provider_at = |version: u32| {
        CacheProvider::new(config_at(dir.path(), version)).with_handler(Arc::new(CountingHandler {
            inner: PlainHandler::new(),
            upgrades: Arc::clone(&upgrades),
        }))
    };

    let fallback = rekindle::Mirror::new();

    // Fresh store: created at version 1 (upgrade from 0)
    provider_at(1).create(&MirrorCache(&fallback)).await.unwrap();
    assert_eq!(upgrades.load(Ordering::SeqCst), 1);

    // Same version: no upgrade
    provider_at(1).create(&MirrorCache(&fallback)).await.unwrap();
    assert_eq!(upgrades.load(Ordering::SeqCst), 1);

    // Version bump: upgrade runs again
    provider_at(2).create(&MirrorCache(&fallback)).await.unwrap();
    assert_eq!(upgrades.load(Ordering::SeqCst), 2);
}

/// Adapter exposing a bare mirror as a fallback cache
struct MirrorCache<'a>(&'a rekindle::Mirror);

impl Cache for MirrorCache<'_> {
    fn keys(&self) -> Vec<String> {
        self.0.keys()
    }

    fn get(&self, key: &str) -> Option<CacheEntry> {
        self.0.get(key)
    }

    fn set(&self, key: &str, entry: CacheEntry) {
        self.0.set(key, entry);
    }

    fn delete(&self, key: &str) {
        self.0.delete(key);
    }

    fn clear(&self) {
        self.0.clear();
    }
}

#[tokio::test]
async fn test_provider_factory_seeds_fallback() {
    init_logging();
    let dir = tempdir().unwrap();
    let config = config_at(dir.path(), 1);

    {
        let cache = PersistentCache::open(&config).await.unwrap();
        cache.set("a", CacheEntry::value(json!("hydrated")));
        cache.flush().await;
    }

    let fallback = rekindle::Mirror::new();
    fallback.set("a", CacheEntry::value(json!("fallback")));
    fallback.set("b", CacheEntry::value(json!("seeded")));

    let cache = CacheProvider::new(config.clone())
        .create(&MirrorCache(&fallback))
        .await
        .unwrap();

    assert_eq!(cache.get("a").unwrap().data, Some(json!("hydrated")));
    assert_eq!(cache.get("b").unwrap().data, Some(json!("seeded")));
    cache.flush().await;
    drop(cache);

    // The seeded key was never persisted
    let cache = PersistentCache::open(&config).await.unwrap();
    assert!(cache.get("b").is_none());
    assert_eq!(cache.get("a").unwrap().data, Some(json!("hydrated")));
}

#[tokio::test]
async fn test_stats_track_mirror_traffic() {
    init_logging();
    let dir = tempdir().unwrap();
    let cache = PersistentCache::open(&config_at(dir.path(), 1)).await.unwrap();

    cache.set("a", CacheEntry::value(json!(1)));
    cache.get("a");
    cache.get("missing");

    let stats = cache.stats();
    assert_eq!(stats.total_keys, 1);
    assert_eq!(stats.hits, 1);
    assert_eq!(stats.misses, 1);
    assert!(stats.hit_rate() > 0.49 && stats.hit_rate() < 0.51);
}

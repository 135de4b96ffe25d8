mod hydrate;
mod synchronizer;


pub use synchronizer::{ErrorSink, noop_error_sink};

use crate::config::CacheConfig;
use crate::core::entry::CacheEntry;
use crate::core::error::{CacheError, Result};
use crate::core::mirror::{CacheStats, Mirror};
use crate::handler::{PlainHandler, StorageHandler};
use crate::store::{DurableStore, FsStore};
use std::sync::Arc;
use synchronizer::Synchronizer;
use tracing::{debug, warn};

/// The synchronous cache contract consumed upstream.
///
/// Reads never block on I/O and never fail; writes mutate the in-memory
/// state before returning. Durability is a side effect, not part of the
/// contract.
pub trait Cache: Send + Sync {
    /// Snapshot of all cached keys
    fn keys(&self) -> Vec<String>;

    /// Get the entry for a key
    fn get(&self, key: &str) -> Option<CacheEntry>;

    /// Insert or overwrite the entry for a key
    fn set(&self, key: &str, entry: CacheEntry);

    /// Remove the entry for a key
    fn delete(&self, key: &str);

    /// Remove every entry
    fn clear(&self);
}

/// A cache whose contents survive a process restart.
///
/// Composes the in-memory mirror with best-effort propagation to a durable
/// store. The mirror is hydrated once during construction and is
/// authoritative from then on; the durable store may lag behind it or miss
/// entries whose writes failed.
pub struct PersistentCache {
    mirror: Mirror,
    handler: Arc<dyn StorageHandler>,
    sync: Synchronizer,
    on_error: ErrorSink,
}

impl PersistentCache {
    /// Open with the default handler and a discarding error sink
    pub async fn open(config: &CacheConfig) -> Result<Self> {
        Self::open_with(config, Arc::new(PlainHandler::new()), noop_error_sink()).await
    }

    /// Open the file-backed store described by `config` and hydrate from it.
    ///
    /// Fails if the store cannot be opened or the handler rejects a record
    /// outright; there is no degraded mode.
    pub async fn open_with(
        config: &CacheConfig,
        handler: Arc<dyn StorageHandler>,
        on_error: ErrorSink,
    ) -> Result<Self> {
        config.validate()?;

        let store = FsStore::open(config, handler.as_ref()).await?;
        Self::with_store(Arc::new(store), handler, on_error).await
    }

    /// Hydrate from an already opened durable store.
    ///
    /// The seam for alternative store backends; version handling is the
    /// store's own concern by this point.
    pub async fn with_store(
        store: Arc<dyn DurableStore>,
        handler: Arc<dyn StorageHandler>,
        on_error: ErrorSink,
    ) -> Result<Self> {
        let mirror = Mirror::new();
        hydrate::hydrate(store.as_ref(), handler.as_ref(), &mirror).await?;

        let sync = Synchronizer::start(store, on_error.clone());

        Ok(Self {
            mirror,
            handler,
            sync,
            on_error,
        })
    }

    /// Fill mirror keys hydration left empty from the consumer's fallback cache.
    ///
    /// Hydrated records win; seeded entries are not written to the durable
    /// store, the consumer supplies them again on the next start.
    pub fn seed_fallback(&self, fallback: &dyn Cache) {
        for key in fallback.keys() {
            if !self.mirror.contains(&key) {
                if let Some(entry) = fallback.get(&key) {
                    self.mirror.set(&key, entry);
                }
            }
        }
    }

    /// Wait until every durable operation enqueued so far has settled.
    ///
    /// Shutdown/test helper; the cache contract itself never awaits
    /// durability.
    pub async fn flush(&self) {
        self.sync.flush().await;
    }

    /// Get mirror statistics
    pub fn stats(&self) -> CacheStats {
        self.mirror.stats()
    }
}

impl Cache for PersistentCache {
    fn keys(&self) -> Vec<String> {
        self.mirror.keys()
    }

    fn get(&self, key: &str) -> Option<CacheEntry> {
        self.mirror.get(key)
    }

    fn set(&self, key: &str, entry: CacheEntry) {
        // Mirror first: read-after-write consistency is never sacrificed
        self.mirror.set(key, entry.clone());

        if !self.handler.should_persist(key) {
            debug!("Key {} excluded from persistence", key);
            return;
        }

        match self.handler.replace(key, &entry) {
            Ok(Some(payload)) => self.sync.put(key.to_string(), payload),
            Ok(None) => debug!("Entry for {} excluded from persistence", key),
            Err(e) => {
                warn!("Encoding entry for {} failed: {}", key, e);
                (self.on_error)(e);
            }
        }
    }

    fn delete(&self, key: &str) {
        let existed = self.mirror.delete(key);

        if existed && self.handler.should_persist(key) {
            self.sync.delete(key.to_string());
        }
    }

    fn clear(&self) {
        self.mirror.clear();
        self.sync.clear();
    }
}

/// Factory producing hydrated [`PersistentCache`] instances for a consumer.
///
/// Carries the configuration, handler and error sink; `create` accepts the
/// consumer's own fallback cache and returns the composed provider. Each
/// call constructs an independent instance.
pub struct CacheProvider {
    config: CacheConfig,
    handler: Arc<dyn StorageHandler>,
    on_error: ErrorSink,
}

impl CacheProvider {
    /// Create a factory with the default handler and a discarding error sink
    pub fn new(config: CacheConfig) -> Self {
        Self {
            config,
            handler: Arc::new(PlainHandler::new()),
            on_error: noop_error_sink(),
        }
    }

    /// Replace the storage handler
    pub fn with_handler(mut self, handler: Arc<dyn StorageHandler>) -> Self {
        self.handler = handler;
        self
    }

    /// Route asynchronous durable-write failures to `on_error`
    pub fn on_error(mut self, on_error: impl Fn(CacheError) + Send + Sync + 'static) -> Self {
        self.on_error = Arc::new(on_error);
        self
    }

    /// Build a hydrated cache, seeding missing keys from `fallback`
    pub async fn create(&self, fallback: &dyn Cache) -> Result<PersistentCache> {
        let cache = PersistentCache::open_with(
            &self.config,
            Arc::clone(&self.handler),
            Arc::clone(&self.on_error),
        )
        .await?;

        cache.seed_fallback(fallback);
        Ok(cache)
    }
}

use super::entry::CacheEntry;
use parking_lot::RwLock;
use radix_trie::{Trie, TrieCommon};
use serde::Serialize;
use std::sync::Arc;
use tracing::debug;

/// In-memory mirror backing all reads.
///
/// An ordered mapping from key to cached entry, fully resident in memory.
/// The single source of truth for every read; the durable store only ever
/// holds a lagging projection of it. All operations are synchronous and
/// never touch I/O.
#[derive(Clone)]
pub struct Mirror {
    data: Arc<RwLock<Trie<String, CacheEntry>>>,
    stats: Arc<RwLock<CacheStats>>,
}

impl Default for Mirror {
    fn default() -> Self {
        Self::new()
    }
}

impl Mirror {
    /// Create an empty mirror
    pub fn new() -> Self {
        Self {
            data: Arc::new(RwLock::new(Trie::new())),
            stats: Arc::new(RwLock::new(CacheStats::default())),
        }
    }

    /// Get an entry by key
    pub fn get(&self, key: &str) -> Option<CacheEntry> {
        let data = self.data.read();
        let entry = data.get(key).cloned();

        let mut stats = self.stats.write();
        stats.gets += 1;
        if entry.is_some() {
            stats.hits += 1;
        } else {
            stats.misses += 1;
        }

        entry
    }

    /// Insert or overwrite an entry, returning whether the key was new
    pub fn set(&self, key: &str, entry: CacheEntry) -> bool {
        debug!("MIRROR SET key={}", key);

        let mut data = self.data.write();
        let is_new = data.insert(key.to_string(), entry).is_none();

        let mut stats = self.stats.write();
        stats.sets += 1;
        if is_new {
            stats.total_keys += 1;
        }

        is_new
    }

    /// Remove an entry, returning whether the key existed
    pub fn delete(&self, key: &str) -> bool {
        debug!("MIRROR DELETE key={}", key);

        let mut data = self.data.write();
        let removed = data.remove(key);

        if removed.is_some() {
            let mut stats = self.stats.write();
            stats.dels += 1;
            stats.total_keys = stats.total_keys.saturating_sub(1);
            true
        } else {
            false
        }
    }

    /// Remove every entry
    pub fn clear(&self) {
        let mut data = self.data.write();
        *data = Trie::new();

        let mut stats = self.stats.write();
        stats.total_keys = 0;
    }

    /// Snapshot of all keys in the mirror
    pub fn keys(&self) -> Vec<String> {
        let data = self.data.read();
        data.keys().map(|k| k.to_string()).collect()
    }

    /// Check if a key exists without touching hit/miss counters
    pub fn contains(&self, key: &str) -> bool {
        self.data.read().get(key).is_some()
    }

    /// Number of entries
    pub fn len(&self) -> usize {
        self.data.read().len()
    }

    /// Whether the mirror holds no entries
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Get statistics
    pub fn stats(&self) -> CacheStats {
        self.stats.read().clone()
    }
}

/// Statistics for the mirror
#[derive(Debug, Default, Clone, Serialize)]
pub struct CacheStats {
    /// Total number of keys
    pub total_keys: usize,
    /// Number of GET operations
    pub gets: u64,
    /// Number of SET operations
    pub sets: u64,
    /// Number of DELETE operations
    pub dels: u64,
    /// Number of cache hits
    pub hits: u64,
    /// Number of cache misses
    pub misses: u64,
}

impl CacheStats {
    /// Calculate hit rate
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

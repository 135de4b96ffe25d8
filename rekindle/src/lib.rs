pub mod config;
pub mod core;
pub mod handler;
pub mod provider;
pub mod store;

// Re-export commonly used types
pub use config::CacheConfig;
pub use core::{CacheEntry, CacheError, CacheStats, INTERNAL_KEY_PREFIX, Mirror, is_internal_key};
pub use handler::{DurableRecord, PlainHandler, StorageHandler, UpgradeContext};
pub use provider::{Cache, CacheProvider, ErrorSink, PersistentCache, noop_error_sink};
pub use store::{DurableStore, FsStore, RecordCursor, StoreError};

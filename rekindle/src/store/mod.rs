pub mod fs;

pub use fs::FsStore;

use async_trait::async_trait;
use std::path::PathBuf;
use thiserror::Error;

/// Durable store error types
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Corrupted record at {0:?}")]
    CorruptedRecord(PathBuf),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Invalid manifest at {path:?}: {reason}")]
    InvalidManifest { path: PathBuf, reason: String },
}

impl From<bincode::Error> for StoreError {
    fn from(e: bincode::Error) -> Self {
        StoreError::Serialization(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, StoreError>;

/// The durable key/value backend behind the mirror.
///
/// Holds raw handler payloads under the mirror's key space. Every operation
/// is asynchronous and may fail; the cache layer treats all post-hydration
/// failures as best-effort. Used as `Arc<dyn DurableStore>`.
#[async_trait]
pub trait DurableStore: Send + Sync {
    /// Load a single record payload, `None` if the key is absent
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>>;

    /// Create or overwrite the record for a key
    async fn put(&self, key: &str, payload: Vec<u8>) -> Result<()>;

    /// Remove the record for a key; removing an absent key is not an error
    async fn delete(&self, key: &str) -> Result<()>;

    /// Remove every record
    async fn clear(&self) -> Result<()>;

    /// Open a forward cursor over the entire store
    async fn scan(&self) -> Result<Box<dyn RecordCursor>>;
}

/// Forward cursor over a store's records.
///
/// Each step may suspend until the next record is available. Exhausted
/// cursors keep returning `Ok(None)`.
#[async_trait]
pub trait RecordCursor: Send {
    /// Advance to the next record, yielding `(key, payload)`
    async fn advance(&mut self) -> Result<Option<(String, Vec<u8>)>>;
}

use crate::store::StoreError;
use thiserror::Error;

/// Main error type for cache operations
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Storage handler failed for key {key}: {reason}")]
    Handler { key: String, reason: String },

    #[error("Schema upgrade from version {from} to {to} failed: {reason}")]
    UpgradeFailed { from: u32, to: u32, reason: String },

    #[error("Durable store error: {0}")]
    Store(#[from] StoreError),
}

/// Result type alias for cache operations
pub type Result<T> = std::result::Result<T, CacheError>;

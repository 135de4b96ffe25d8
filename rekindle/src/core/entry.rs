use serde_json::Value;
use std::sync::Arc;

/// Keys starting with this prefix denote transient bookkeeping entries
/// (in-flight request markers, subscription counters) and are never persisted.
pub const INTERNAL_KEY_PREFIX: &str = "$";

/// Check whether a key denotes an internal bookkeeping entry
pub fn is_internal_key(key: &str) -> bool {
    key.starts_with(INTERNAL_KEY_PREFIX)
}

/// A cached entry as held by the mirror.
///
/// Covers both a plain result value and a state record for an in-flight
/// operation. Entries carrying a native error or an in-flight flag are held
/// in memory like any other but are excluded from persistence.
#[derive(Debug, Clone, Default)]
pub struct CacheEntry {
    /// The cached result, if any
    pub data: Option<Value>,
    /// Native error from a failed operation; opaque and non-serializable
    pub error: Option<Arc<anyhow::Error>>,
    /// A revalidation for this key is in flight
    pub is_validating: bool,
    /// The initial load for this key is in flight
    pub is_loading: bool,
}

impl CacheEntry {
    /// Create a plain value entry
    pub fn value(data: impl Into<Value>) -> Self {
        Self {
            data: Some(data.into()),
            ..Self::default()
        }
    }

    /// Create an entry for a key whose initial load is in flight
    pub fn loading() -> Self {
        Self {
            is_loading: true,
            ..Self::default()
        }
    }

    /// Create an entry that is being revalidated, keeping any previous data
    pub fn validating(data: Option<Value>) -> Self {
        Self {
            data,
            is_validating: true,
            ..Self::default()
        }
    }

    /// Create an entry for a failed operation
    pub fn failed(error: anyhow::Error) -> Self {
        Self {
            error: Some(Arc::new(error)),
            ..Self::default()
        }
    }

    /// Whether this entry describes an in-flight operation
    pub fn is_transient(&self) -> bool {
        self.is_validating || self.is_loading
    }
}

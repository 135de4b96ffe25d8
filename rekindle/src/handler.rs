use crate::core::entry::{CacheEntry, is_internal_key};
use crate::core::error::{CacheError, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::Path;
use std::time::{Duration, SystemTime};
use tracing::debug;

/// Context handed to a handler's schema-upgrade hook.
///
/// Runs once per destructive version upgrade, after the records are wiped
/// and before the new manifest is written.
#[derive(Debug)]
pub struct UpgradeContext<'a> {
    /// Directory the store keeps its files in
    pub directory: &'a Path,
    /// Manifest version before the upgrade, 0 for a freshly created store
    pub old_version: u32,
    /// Version the store is being opened at
    pub new_version: u32,
}

/// Encode/decode policy for persisted entries.
///
/// A strategy object deciding which entries are persisted at all, how they
/// are serialized, and optionally how the store's schema evolves. `Ok(None)`
/// is a control-flow sentinel on both paths, not a failure: from [`revive`]
/// it marks a record as stale (purge, don't load), from [`replace`] it marks
/// an entry as not persistable.
///
/// [`revive`]: StorageHandler::revive
/// [`replace`]: StorageHandler::replace
pub trait StorageHandler: Send + Sync {
    /// Decode a persisted payload back into an entry.
    ///
    /// `Ok(None)` means the record is stale and must be pruned from the
    /// store. An `Err` during hydration fails provider construction.
    fn revive(&self, key: &str, raw: &[u8]) -> Result<Option<CacheEntry>>;

    /// Encode an entry for persistence.
    ///
    /// `Ok(None)` means the entry must not be persisted (transient state,
    /// non-serializable payload, intentionally excluded).
    fn replace(&self, key: &str, entry: &CacheEntry) -> Result<Option<Vec<u8>>>;

    /// Key-shape gate applied before any durable propagation.
    ///
    /// Filters both writes and deletes, so it must not depend on the entry
    /// value. The default rejects internal bookkeeping keys.
    fn should_persist(&self, key: &str) -> bool {
        !is_internal_key(key)
    }

    /// Extend the store schema during a version upgrade
    fn upgrade_object_store(&self, _ctx: &UpgradeContext<'_>) -> Result<()> {
        Ok(())
    }
}

/// The default handler's on-disk projection of an entry.
///
/// Transient flags and native errors are meaningless after a restart and
/// are never written.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DurableRecord {
    pub data: Value,
    /// Unix seconds at the time the record was encoded
    pub stored_at: u64,
}

/// Default storage handler: plain JSON records, optional max-age staleness.
///
/// Persists only entries that carry data and no in-flight state; revives
/// records as plain value entries. A record older than `max_age` (when set)
/// revives as stale and gets pruned.
#[derive(Debug, Clone, Default)]
pub struct PlainHandler {
    max_age: Option<Duration>,
}

impl PlainHandler {
    /// Create a handler that never expires records
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a handler that treats records older than `max_age` as stale
    pub fn with_max_age(max_age: Duration) -> Self {
        Self {
            max_age: Some(max_age),
        }
    }
}

impl StorageHandler for PlainHandler {
    fn revive(&self, key: &str, raw: &[u8]) -> Result<Option<CacheEntry>> {
        let record: DurableRecord = match serde_json::from_slice(raw) {
            Ok(record) => record,
            Err(e) => {
                // Schema drift: the record is useless, let hydration prune it
                debug!("Undecodable record for {}, treating as stale: {}", key, e);
                return Ok(None);
            }
        };

        if let Some(max_age) = self.max_age {
            let age = unix_now().saturating_sub(record.stored_at);
            if age > max_age.as_secs() {
                debug!("Record for {} is {}s old, treating as stale", key, age);
                return Ok(None);
            }
        }

        Ok(Some(CacheEntry::value(record.data)))
    }

    fn replace(&self, key: &str, entry: &CacheEntry) -> Result<Option<Vec<u8>>> {
        if entry.is_transient() || entry.error.is_some() {
            return Ok(None);
        }

        let Some(data) = &entry.data else {
            return Ok(None);
        };

        let record = DurableRecord {
            data: data.clone(),
            stored_at: unix_now(),
        };

        let payload = serde_json::to_vec(&record).map_err(|e| CacheError::Handler {
            key: key.to_string(),
            reason: e.to_string(),
        })?;

        Ok(Some(payload))
    }
}

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(SystemTime::UNIX_EPOCH)
        .unwrap()
        .as_secs()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_replace_then_revive_round_trip() {
        let handler = PlainHandler::new();
        let entry = CacheEntry::value(json!({"name": "a"}));

        let payload = handler.replace("user:1", &entry).unwrap().unwrap();
        let revived = handler.revive("user:1", &payload).unwrap().unwrap();

        assert_eq!(revived.data, Some(json!({"name": "a"})));
        assert!(!revived.is_transient());
        assert!(revived.error.is_none());
    }

    #[test]
    fn test_transient_entries_not_persisted() {
        let handler = PlainHandler::new();

        assert!(
            handler
                .replace("user:1", &CacheEntry::loading())
                .unwrap()
                .is_none()
        );
        assert!(
            handler
                .replace("user:1", &CacheEntry::validating(Some(json!(1))))
                .unwrap()
                .is_none()
        );
    }

    #[test]
    fn test_error_entries_not_persisted() {
        let handler = PlainHandler::new();
        let entry = CacheEntry::failed(anyhow::anyhow!("boom"));

        assert!(handler.replace("user:1", &entry).unwrap().is_none());
    }

    #[test]
    fn test_dataless_entries_not_persisted() {
        let handler = PlainHandler::new();

        assert!(
            handler
                .replace("user:1", &CacheEntry::default())
                .unwrap()
                .is_none()
        );
    }

    #[test]
    fn test_internal_keys_rejected_by_key_gate() {
        let handler = PlainHandler::new();

        assert!(!handler.should_persist("$req$user:1"));
        assert!(handler.should_persist("user:1"));
    }

    #[test]
    fn test_old_record_revives_as_stale() {
        let handler = PlainHandler::with_max_age(Duration::from_secs(60));

        let record = DurableRecord {
            data: json!("old"),
            stored_at: unix_now() - 120,
        };
        let payload = serde_json::to_vec(&record).unwrap();

        assert!(handler.revive("user:1", &payload).unwrap().is_none());
    }

    #[test]
    fn test_fresh_record_revives_within_max_age() {
        let handler = PlainHandler::with_max_age(Duration::from_secs(60));

        let record = DurableRecord {
            data: json!("fresh"),
            stored_at: unix_now(),
        };
        let payload = serde_json::to_vec(&record).unwrap();

        let revived = handler.revive("user:1", &payload).unwrap().unwrap();
        assert_eq!(revived.data, Some(json!("fresh")));
    }

    #[test]
    fn test_undecodable_payload_revives_as_stale() {
        let handler = PlainHandler::new();

        assert!(handler.revive("user:1", b"not json").unwrap().is_none());
    }
}

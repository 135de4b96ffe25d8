use super::{DurableStore, RecordCursor, Result, StoreError};
use crate::config::CacheConfig;
use crate::core::error::{CacheError, Result as CacheResult};
use crate::handler::{StorageHandler, UpgradeContext};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

const RECORD_EXTENSION: &str = "rec";
const MANIFEST_FILE: &str = "meta.json";

/// Store manifest, tracking the schema version across restarts
#[derive(Debug, Serialize, Deserialize)]
struct Manifest {
    version: u32,
}

/// On-disk framing of a single handler payload
#[derive(Debug, Serialize, Deserialize)]
struct StoredRecord {
    key: String,
    payload: Vec<u8>,
}

/// File-backed durable store.
///
/// One checksummed record file per key under `<root>/<db_name>/<store_name>/`,
/// plus a `meta.json` manifest carrying the schema version. Opening at a
/// higher version than the manifest wipes the records and re-creates the
/// store from empty; an unchanged or lower version leaves the data intact.
pub struct FsStore {
    directory: PathBuf,
}

impl FsStore {
    /// Open (or create) the store for the given configuration.
    ///
    /// Runs the destructive version-upgrade step, including the handler's
    /// schema hook, before any record is readable.
    pub async fn open(config: &CacheConfig, handler: &dyn StorageHandler) -> CacheResult<Self> {
        let directory = config.store_path();
        tokio::fs::create_dir_all(&directory)
            .await
            .map_err(StoreError::Io)?;

        let manifest_path = directory.join(MANIFEST_FILE);
        let stored_version = Self::read_manifest(&manifest_path).await?;

        if stored_version < config.version {
            info!(
                "Upgrading store {:?} from version {} to {}",
                directory, stored_version, config.version
            );

            Self::wipe_records(&directory).await?;

            let ctx = UpgradeContext {
                directory: &directory,
                old_version: stored_version,
                new_version: config.version,
            };
            handler
                .upgrade_object_store(&ctx)
                .map_err(|e| CacheError::UpgradeFailed {
                    from: stored_version,
                    to: config.version,
                    reason: e.to_string(),
                })?;

            Self::write_manifest(&manifest_path, config.version).await?;
        } else if stored_version > config.version {
            // Keep both the data and the newer manifest
            warn!(
                "Store {:?} is at version {}, newer than requested {}; keeping existing data",
                directory, stored_version, config.version
            );
        }

        info!("Store opened at {:?}", directory);

        Ok(Self { directory })
    }

    /// Read the manifest version, 0 if the store has never been created
    async fn read_manifest(path: &Path) -> Result<u32> {
        let contents = match tokio::fs::read_to_string(path).await {
            Ok(c) => c,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(0),
            Err(e) => return Err(StoreError::Io(e)),
        };

        let manifest: Manifest =
            serde_json::from_str(&contents).map_err(|e| StoreError::InvalidManifest {
                path: path.to_path_buf(),
                reason: e.to_string(),
            })?;

        Ok(manifest.version)
    }

    async fn write_manifest(path: &Path, version: u32) -> Result<()> {
        let manifest = Manifest { version };
        let json = serde_json::to_string_pretty(&manifest)
            .map_err(|e| StoreError::Serialization(e.to_string()))?;

        tokio::fs::write(path, json).await?;
        Ok(())
    }

    /// Remove every record file, leaving the manifest alone
    async fn wipe_records(directory: &Path) -> Result<()> {
        for path in Self::record_paths(directory).await? {
            tokio::fs::remove_file(&path).await?;
        }
        Ok(())
    }

    /// List record files in stable order
    async fn record_paths(directory: &Path) -> Result<Vec<PathBuf>> {
        let mut paths = Vec::new();
        let mut dir = tokio::fs::read_dir(directory).await?;

        while let Some(entry) = dir.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|s| s.to_str()) == Some(RECORD_EXTENSION) {
                paths.push(path);
            }
        }

        paths.sort();
        Ok(paths)
    }

    fn record_path(&self, key: &str) -> PathBuf {
        let digest = hex::encode(Sha256::digest(key.as_bytes()));
        self.directory
            .join(format!("{}.{}", digest, RECORD_EXTENSION))
    }

    /// Read and verify a single record file.
    ///
    /// Record format: crc32 checksum (u32 LE) + bincode-serialized record.
    async fn read_record(path: &Path) -> Result<StoredRecord> {
        let bytes = tokio::fs::read(path).await?;

        if bytes.len() < 4 {
            return Err(StoreError::CorruptedRecord(path.to_path_buf()));
        }

        let (header, data) = bytes.split_at(4);
        let expected = u32::from_le_bytes([header[0], header[1], header[2], header[3]]);
        let actual = crc32fast::hash(data);

        if expected != actual {
            warn!(
                "Record checksum mismatch at {:?}: expected {}, got {}",
                path, expected, actual
            );
            return Err(StoreError::CorruptedRecord(path.to_path_buf()));
        }

        bincode::deserialize(data).map_err(|_| StoreError::CorruptedRecord(path.to_path_buf()))
    }

    async fn write_record(path: &Path, record: &StoredRecord) -> Result<()> {
        let data = bincode::serialize(record)?;
        let checksum = crc32fast::hash(&data);

        let mut bytes = Vec::with_capacity(4 + data.len());
        bytes.extend_from_slice(&checksum.to_le_bytes());
        bytes.extend_from_slice(&data);

        tokio::fs::write(path, bytes).await?;
        Ok(())
    }
}

#[async_trait]
impl DurableStore for FsStore {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let path = self.record_path(key);

        match Self::read_record(&path).await {
            Ok(record) => Ok(Some(record.payload)),
            Err(StoreError::Io(e)) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e),
        }
    }

    async fn put(&self, key: &str, payload: Vec<u8>) -> Result<()> {
        debug!("STORE PUT key={}, size={}", key, payload.len());

        let record = StoredRecord {
            key: key.to_string(),
            payload,
        };
        Self::write_record(&self.record_path(key), &record).await
    }

    async fn delete(&self, key: &str) -> Result<()> {
        debug!("STORE DELETE key={}", key);

        match tokio::fs::remove_file(self.record_path(key)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(StoreError::Io(e)),
        }
    }

    async fn clear(&self) -> Result<()> {
        debug!("STORE CLEAR at {:?}", self.directory);
        Self::wipe_records(&self.directory).await
    }

    async fn scan(&self) -> Result<Box<dyn RecordCursor>> {
        let paths = Self::record_paths(&self.directory).await?;
        debug!("STORE SCAN: {} record files", paths.len());

        Ok(Box::new(FsCursor {
            paths: paths.into_iter(),
        }))
    }
}

/// Cursor over a directory listing taken at scan time.
///
/// Corrupt record files are pruned and skipped rather than surfaced; a
/// record that cannot pass its checksum is useless for hydration.
struct FsCursor {
    paths: std::vec::IntoIter<PathBuf>,
}

#[async_trait]
impl RecordCursor for FsCursor {
    async fn advance(&mut self) -> Result<Option<(String, Vec<u8>)>> {
        for path in self.paths.by_ref() {
            match FsStore::read_record(&path).await {
                Ok(record) => return Ok(Some((record.key, record.payload))),
                Err(StoreError::Io(e)) if e.kind() == ErrorKind::NotFound => continue,
                Err(StoreError::CorruptedRecord(_)) => {
                    warn!("Pruning corrupted record file {:?}", path);
                    let _ = tokio::fs::remove_file(&path).await;
                }
                Err(e) => return Err(e),
            }
        }

        Ok(None)
    }
}

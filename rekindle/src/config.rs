use crate::core::error::{CacheError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

fn default_version() -> u32 {
    1
}

fn default_directory() -> PathBuf {
    PathBuf::from("./data/cache")
}

/// Cache provider configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Durable store namespace identifier
    pub db_name: String,
    /// Logical store name within the namespace
    pub store_name: String,
    /// Schema version; an increase triggers a destructive upgrade
    #[serde(default = "default_version")]
    pub version: u32,
    /// Filesystem root the namespaces live under
    #[serde(default = "default_directory")]
    pub directory: PathBuf,
}

impl CacheConfig {
    /// Create a configuration with the default version and directory
    pub fn new(db_name: impl Into<String>, store_name: impl Into<String>) -> Self {
        Self {
            db_name: db_name.into(),
            store_name: store_name.into(),
            version: default_version(),
            directory: default_directory(),
        }
    }

    /// Override the schema version
    pub fn with_version(mut self, version: u32) -> Self {
        self.version = version;
        self
    }

    /// Override the filesystem root
    pub fn with_directory(mut self, directory: impl Into<PathBuf>) -> Self {
        self.directory = directory.into();
        self
    }

    /// Load configuration from YAML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: CacheConfig = serde_yaml::from_str(&content)?;
        Ok(config)
    }

    /// Directory the store keeps its files in
    pub fn store_path(&self) -> PathBuf {
        self.directory.join(&self.db_name).join(&self.store_name)
    }

    /// Reject configurations that cannot name a store on disk
    pub fn validate(&self) -> Result<()> {
        if self.db_name.is_empty() {
            return Err(CacheError::InvalidConfig("db_name is empty".to_string()));
        }
        if self.store_name.is_empty() {
            return Err(CacheError::InvalidConfig("store_name is empty".to_string()));
        }
        if self.version == 0 {
            return Err(CacheError::InvalidConfig(
                "version must be a positive integer".to_string(),
            ));
        }

        for (field, value) in [("db_name", &self.db_name), ("store_name", &self.store_name)] {
            if value.contains(['/', '\\']) || value == ".." {
                return Err(CacheError::InvalidConfig(format!(
                    "{} must not contain path separators: {:?}",
                    field, value
                )));
            }
        }

        Ok(())
    }
}

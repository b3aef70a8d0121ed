//! Configuration management for verfs
//!
//! Supports loading configuration from:
//! - Default values
//! - Config file (verfs.toml)
//! - Environment variables (VERFS__*)
//!
//! ## Example config file (verfs.toml):
//! ```toml
//! [storage]
//! backend = "local"
//! root = "./data"
//!
//! [logging]
//! filter = "verfs=debug"
//! ```

use config_crate::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::error::StorageResult;
use crate::storage::{LocalStorage, MemoryStorage, StorageProvider};

/// Main configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VerfsConfig {
    /// Storage settings
    #[serde(default)]
    pub storage: StorageConfig,

    /// Logging settings
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Storage configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Which provider holds the version objects
    #[serde(default)]
    pub backend: StorageBackend,

    /// Object directory for the local backend
    #[serde(default = "default_root")]
    pub root: PathBuf,
}

/// Storage provider selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    #[default]
    Local,
    Memory,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Default `tracing` filter when RUST_LOG is unset
    #[serde(default = "default_filter")]
    pub filter: String,
}

fn default_root() -> PathBuf {
    PathBuf::from("./verfs-data")
}

fn default_filter() -> String {
    "info".to_string()
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackend::default(),
            root: default_root(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: default_filter(),
        }
    }
}

impl VerfsConfig {
    /// Load configuration, layering an explicit file over the defaults
    pub fn load_from(config_path: Option<&str>) -> Result<Self, ConfigError> {
        let mut builder = Config::builder();

        let config_locations = ["verfs.toml", ".verfs.toml", "config/verfs.toml"];
        for location in config_locations {
            builder = builder.add_source(File::with_name(location).required(false));
        }

        if let Some(config_dir) = directories::ProjectDirs::from("dev", "verfs", "verfs") {
            let xdg_config = config_dir.config_dir().join("verfs.toml");
            if xdg_config.exists() {
                builder = builder.add_source(File::from(xdg_config).required(false));
            }
        }

        if let Some(path) = config_path {
            builder = builder.add_source(File::with_name(path).required(true));
        }

        builder = builder.add_source(
            Environment::with_prefix("VERFS")
                .separator("__")
                .try_parsing(true),
        );

        builder.build()?.try_deserialize()
    }

    /// Render as TOML
    pub fn to_toml(&self) -> Result<String, toml::ser::Error> {
        toml::to_string_pretty(self)
    }

    /// Get the storage root (resolves relative paths)
    pub fn storage_root(&self) -> PathBuf {
        if self.storage.root.is_absolute() {
            self.storage.root.clone()
        } else {
            std::env::current_dir()
                .unwrap_or_default()
                .join(&self.storage.root)
        }
    }

    /// Build the configured storage provider
    pub fn build_storage(&self) -> StorageResult<Box<dyn StorageProvider>> {
        Ok(match self.storage.backend {
            StorageBackend::Local => Box::new(LocalStorage::new(self.storage_root())?),
            StorageBackend::Memory => Box::new(MemoryStorage::new()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_default_config() {
        let config = VerfsConfig::default();
        assert_eq!(config.storage.backend, StorageBackend::Local);
        assert_eq!(config.logging.filter, "info");
        assert!(config.storage_root().is_absolute());
    }

    #[test]
    fn test_serialize_config() {
        let config = VerfsConfig::default();
        let toml_str = config.to_toml().unwrap();
        assert!(toml_str.contains("[storage]"));
        assert!(toml_str.contains("backend = \"local\""));
        assert!(toml_str.contains("[logging]"));
    }

    #[test]
    fn test_load_explicit_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("custom.toml");
        std::fs::write(
            &path,
            "[storage]\nbackend = \"memory\"\nroot = \"/srv/verfs\"\n",
        )
        .unwrap();

        let config = VerfsConfig::load_from(path.to_str()).unwrap();
        assert_eq!(config.storage.backend, StorageBackend::Memory);
        assert_eq!(config.storage_root(), PathBuf::from("/srv/verfs"));
        assert_eq!(config.logging.filter, "info");
    }

    #[test]
    fn test_build_local_storage() {
        let dir = tempdir().unwrap();
        let mut config = VerfsConfig::default();
        config.storage.root = dir.path().join("objects");

        let storage = config.build_storage().unwrap();
        assert!(storage.list().unwrap().is_empty());
        assert!(dir.path().join("objects").is_dir());
    }
}

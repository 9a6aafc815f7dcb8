use std::path::{Path, PathBuf};

use cask_kv::{LogConfig, SyncMode};
use serde::{Deserialize, Serialize};

use crate::error::{Result, StoreError};

/// File name of the log engine inside the store directory.
pub const LOG_FILE_NAME: &str = "objects.log";

/// Which key-value engine backs the store.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EngineKind {
    /// Volatile `BTreeMap` engine. Contents are lost on close.
    Memory,
    /// Append-only log file under the store directory.
    Log,
}

/// Durability policy for the log engine.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SyncPolicy {
    /// `fsync` after every write.
    EveryWrite,
    /// Leave flushing to the OS.
    #[default]
    OsDefault,
}

/// Store configuration, typically read from a TOML file:
///
/// ```toml
/// path = "/var/lib/cask"
/// engine = "log"
/// sync = "every-write"
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StoreConfig {
    /// Directory holding the store's files.
    pub path: PathBuf,
    /// Backing engine.
    pub engine: EngineKind,
    /// Durability policy (log engine only).
    pub sync: SyncPolicy,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("cask"),
            engine: EngineKind::Log,
            sync: SyncPolicy::default(),
        }
    }
}

impl StoreConfig {
    /// Log-backed store rooted at `path`.
    pub fn at(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            ..Self::default()
        }
    }

    /// Volatile in-memory store.
    pub fn in_memory() -> Self {
        Self {
            engine: EngineKind::Memory,
            ..Self::default()
        }
    }

    /// Parse a configuration from TOML text. Missing fields take defaults.
    pub fn from_toml_str(text: &str) -> Result<Self> {
        toml::from_str(text).map_err(|e| StoreError::Config(e.to_string()))
    }

    /// Read a configuration file.
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| StoreError::Config(format!("cannot read {}: {e}", path.display())))?;
        Self::from_toml_str(&text)
    }

    /// Render as TOML.
    pub fn to_toml_string(&self) -> Result<String> {
        toml::to_string(self).map_err(|e| StoreError::Config(e.to_string()))
    }

    /// Location of the log engine file.
    pub fn log_path(&self) -> PathBuf {
        self.path.join(LOG_FILE_NAME)
    }

    /// Engine settings derived from this configuration.
    pub fn log_config(&self) -> LogConfig {
        LogConfig {
            sync_mode: match self.sync {
                SyncPolicy::EveryWrite => SyncMode::EveryWrite,
                SyncPolicy::OsDefault => SyncMode::OsDefault,
            },
        }
    }
}

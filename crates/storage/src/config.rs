use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;

use crate::error::StorageError;

pub const DEFAULT_DB_PATH: &str = "fieldstock.db";
pub const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5_000;

pub const ENV_DB_PATH: &str = "FIELDSTOCK_DB_PATH";
pub const ENV_BUSY_TIMEOUT_MS: &str = "FIELDSTOCK_BUSY_TIMEOUT_MS";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JournalMode {
    #[default]
    Wal,
    Delete,
}

impl JournalMode {
    pub fn pragma_value(self) -> &'static str {
        match self {
            Self::Wal => "WAL",
            Self::Delete => "DELETE",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncMode {
    Full,
    #[default]
    Normal,
}

impl SyncMode {
    pub fn pragma_value(self) -> &'static str {
        match self {
            Self::Full => "FULL",
            Self::Normal => "NORMAL",
        }
    }
}

/// Connection settings for the inventory database.
///
/// `busy_timeout_ms` bounds every call: a writer waiting on another
/// connection's lock gives up after this long instead of blocking.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct StoreConfig {
    #[serde(default = "default_path")]
    pub path: PathBuf,
    #[serde(default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u64,
    #[serde(default)]
    pub journal_mode: JournalMode,
    #[serde(default)]
    pub synchronous: SyncMode,
}

fn default_path() -> PathBuf {
    PathBuf::from(DEFAULT_DB_PATH)
}

fn default_busy_timeout_ms() -> u64 {
    DEFAULT_BUSY_TIMEOUT_MS
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: default_path(),
            busy_timeout_ms: DEFAULT_BUSY_TIMEOUT_MS,
            journal_mode: JournalMode::default(),
            synchronous: SyncMode::default(),
        }
    }
}

impl StoreConfig {
    pub fn at(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            ..Self::default()
        }
    }

    pub fn from_env() -> Result<Self, StorageError> {
        let mut config = Self::default();
        if let Ok(path) = std::env::var(ENV_DB_PATH) {
            config.path = PathBuf::from(path);
        }
        if let Ok(raw) = std::env::var(ENV_BUSY_TIMEOUT_MS) {
            config.busy_timeout_ms = raw.trim().parse().map_err(|_| {
                StorageError::Config(format!("{ENV_BUSY_TIMEOUT_MS} is not a number: {raw}"))
            })?;
        }
        Ok(config)
    }

    pub fn from_toml_str(s: &str) -> Result<Self, StorageError> {
        toml::from_str(s).map_err(|e| StorageError::Config(e.to_string()))
    }

    pub fn busy_timeout(&self) -> Duration {
        Duration::from_millis(self.busy_timeout_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_toml_uses_defaults() {
        let config = StoreConfig::from_toml_str("").unwrap();
        assert_eq!(config, StoreConfig::default());
        assert_eq!(config.busy_timeout(), Duration::from_secs(5));
    }

    #[test]
    fn toml_overrides_fields() {
        let config = StoreConfig::from_toml_str(
            r#"
            path = "/var/lib/fieldstock/inventory.db"
            busy_timeout_ms = 250
            journal_mode = "delete"
            synchronous = "full"
            "#,
        )
        .unwrap();
        assert_eq!(config.path, PathBuf::from("/var/lib/fieldstock/inventory.db"));
        assert_eq!(config.busy_timeout_ms, 250);
        assert_eq!(config.journal_mode, JournalMode::Delete);
        assert_eq!(config.synchronous, SyncMode::Full);
    }

    #[test]
    fn unknown_journal_mode_is_a_config_error() {
        let err = StoreConfig::from_toml_str(r#"journal_mode = "memory""#).unwrap_err();
        assert!(matches!(err, StorageError::Config(_)));
    }
}

//! Configuration for the backup engine, the state store and the scheduler.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::storage::StorageBackendConfig;

/// Default storage location recorded on jobs that do not name one
pub const DEFAULT_STORAGE_ROOT: &str = "/var/aegis/backups";

/// Default retention window in days
pub const DEFAULT_RETENTION_DAYS: u32 = 30;

pub const ENV_RETENTION_DAYS: &str = "AEGIS_DEFAULT_RETENTION_DAYS";
pub const ENV_STORAGE_PATH: &str = "AEGIS_BACKUP_STORAGE_PATH";
pub const ENV_STORAGE_URL: &str = "AEGIS_STORAGE_URL";

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Where archives and manifests are written
    #[serde(default)]
    pub storage: StorageBackendConfig,

    /// Where jobs, records, plans and executions are kept
    #[serde(default)]
    pub state: StateConfig,

    #[serde(default)]
    pub backup: BackupOptions,

    #[serde(default)]
    pub scheduler: SchedulerOptions,

    #[serde(default)]
    pub kubernetes: KubernetesOptions,
}

/// State store configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StateConfig {
    #[serde(default)]
    pub backend: StateBackend,

    /// Path to the SQLite database file
    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,
}

impl Default for StateConfig {
    fn default() -> Self {
        Self {
            backend: StateBackend::default(),
            db_path: default_db_path(),
        }
    }
}

fn default_db_path() -> PathBuf {
    PathBuf::from("./aegis.db")
}

/// State store backend type
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StateBackend {
    #[default]
    Sqlite,
    Memory,
}

/// Options handed to the backup manager at construction
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackupOptions {
    /// Retention applied to jobs created without one
    #[serde(default = "default_retention_days")]
    pub default_retention_days: u32,

    /// Storage location applied to jobs created without one
    #[serde(default = "default_storage_root")]
    pub storage_root: String,
}

impl Default for BackupOptions {
    fn default() -> Self {
        Self {
            default_retention_days: default_retention_days(),
            storage_root: default_storage_root(),
        }
    }
}

fn default_retention_days() -> u32 {
    DEFAULT_RETENTION_DAYS
}

fn default_storage_root() -> String {
    DEFAULT_STORAGE_ROOT.to_string()
}

/// Options for the long-running scheduler loop
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerOptions {
    /// Seconds between due-job scans (default: 60)
    #[serde(default = "default_tick_interval_secs")]
    pub tick_interval_secs: u64,

    /// Enforce retention for every job after each tick
    #[serde(default = "default_true")]
    pub enforce_retention: bool,
}

impl Default for SchedulerOptions {
    fn default() -> Self {
        Self {
            tick_interval_secs: default_tick_interval_secs(),
            enforce_retention: true,
        }
    }
}

fn default_tick_interval_secs() -> u64 {
    60
}

fn default_true() -> bool {
    true
}

/// Options for the live cluster client
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KubernetesOptions {
    /// Field manager name used for server-side apply
    #[serde(default = "default_field_manager")]
    pub field_manager: String,
}

impl Default for KubernetesOptions {
    fn default() -> Self {
        Self {
            field_manager: default_field_manager(),
        }
    }
}

fn default_field_manager() -> String {
    "aegis".to_string()
}

impl Config {
    /// Parse a YAML document
    pub fn from_yaml(yaml: &str) -> crate::Result<Self> {
        serde_yaml::from_str(yaml)
            .map_err(|e| crate::Error::Config(format!("Invalid configuration: {}", e)))
    }

    /// Read and parse a YAML file
    pub fn from_file(path: &Path) -> crate::Result<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            crate::Error::Config(format!("Failed to read {}: {}", path.display(), e))
        })?;
        Self::from_yaml(&contents)
    }

    /// Apply `AEGIS_*` environment overrides from the process environment
    pub fn apply_env_overrides(&mut self) -> crate::Result<()> {
        self.apply_overrides_from(|key| std::env::var(key).ok())
    }

    /// Apply `AEGIS_*` overrides using `lookup` as the environment
    pub fn apply_overrides_from<F>(&mut self, lookup: F) -> crate::Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(raw) = lookup(ENV_RETENTION_DAYS) {
            self.backup.default_retention_days = raw.trim().parse().map_err(|_| {
                crate::Error::Config(format!(
                    "{} must be a positive integer, got '{}'",
                    ENV_RETENTION_DAYS, raw
                ))
            })?;
        }

        if let Some(path) = lookup(ENV_STORAGE_PATH) {
            self.backup.storage_root = path;
        }

        if let Some(url) = lookup(ENV_STORAGE_URL) {
            self.storage = StorageBackendConfig::from_url(&url)?;
        }

        Ok(())
    }

    /// Validate the configuration
    pub fn validate(&self) -> crate::Result<()> {
        if self.backup.default_retention_days == 0 {
            return Err(crate::Error::Config(
                "backup.default_retention_days must be greater than zero".to_string(),
            ));
        }

        if self.backup.storage_root.trim().is_empty() {
            return Err(crate::Error::Config(
                "backup.storage_root must not be empty".to_string(),
            ));
        }

        if self.scheduler.tick_interval_secs == 0 {
            return Err(crate::Error::Config(
                "scheduler.tick_interval_secs must be greater than zero".to_string(),
            ));
        }

        if self.kubernetes.field_manager.trim().is_empty() {
            return Err(crate::Error::Config(
                "kubernetes.field_manager must not be empty".to_string(),
            ));
        }

        Ok(())
    }
}

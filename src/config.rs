//! Global configuration parsing and validation.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::{AppError, Result};

/// Heartbeat watchdog tuning.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case", default)]
pub struct HeartbeatConfig {
    /// Floor applied to every status poll interval.
    pub min_interval_ms: u64,
    /// Liveness timeout expressed as a multiple of the poll interval.
    pub timeout_multiplier: u32,
    /// Upper bound on the jitter allowance added to the poll interval.
    pub max_jitter_ms: u64,
}

impl Default for HeartbeatConfig {
    fn default() -> Self {
        Self {
            min_interval_ms: 5_000,
            timeout_multiplier: 4,
            max_jitter_ms: 500,
        }
    }
}

impl HeartbeatConfig {
    /// Minimum poll interval as a [`Duration`].
    #[must_use]
    pub fn min_interval(&self) -> Duration {
        Duration::from_millis(self.min_interval_ms)
    }

    /// Maximum jitter allowance as a [`Duration`].
    #[must_use]
    pub fn max_jitter(&self) -> Duration {
        Duration::from_millis(self.max_jitter_ms)
    }
}

/// Stop ledger sizing.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case", default)]
pub struct StopLedgerConfig {
    /// Number of stop records retained before the oldest is evicted.
    pub capacity: usize,
}

impl Default for StopLedgerConfig {
    fn default() -> Self {
        Self { capacity: 100 }
    }
}

/// Which state store backs execution records.
#[derive(Debug, Clone, Copy, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PersistenceBackend {
    /// Volatile in-process map.
    #[default]
    Memory,
    /// `SQLite` database file.
    Sqlite,
}

/// Execution state persistence settings.
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case", default)]
pub struct PersistenceConfig {
    /// Selected backend.
    pub backend: PersistenceBackend,
    /// Database file path, required for the `sqlite` backend.
    pub db_path: Option<PathBuf>,
}

fn default_http_host() -> String {
    "127.0.0.1".into()
}

fn default_http_port() -> u16 {
    8080
}

fn default_work_dir_root() -> PathBuf {
    std::env::temp_dir().join("preflight-kit")
}

/// Global configuration parsed from `config.toml`.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct GlobalConfig {
    /// Listen address for the HTTP dispatcher.
    #[serde(default = "default_http_host")]
    pub http_host: String,
    /// Listen port for the HTTP dispatcher; 0 picks an ephemeral port.
    #[serde(default = "default_http_port")]
    pub http_port: u16,
    /// Parent directory of per-execution working directories.
    #[serde(default = "default_work_dir_root")]
    pub work_dir_root: PathBuf,
    /// Heartbeat watchdog tuning.
    #[serde(default)]
    pub heartbeat: HeartbeatConfig,
    /// Stop ledger sizing.
    #[serde(default)]
    pub stop_ledger: StopLedgerConfig,
    /// Execution state persistence.
    #[serde(default)]
    pub persistence: PersistenceConfig,
}

impl Default for GlobalConfig {
    fn default() -> Self {
        Self {
            http_host: default_http_host(),
            http_port: default_http_port(),
            work_dir_root: default_work_dir_root(),
            heartbeat: HeartbeatConfig::default(),
            stop_ledger: StopLedgerConfig::default(),
            persistence: PersistenceConfig::default(),
        }
    }
}

impl GlobalConfig {
    /// Load and validate configuration from a TOML file path.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if the file cannot be read or contains
    /// invalid TOML, or if validation fails.
    pub fn load_from_path(path: impl AsRef<Path>) -> Result<Self> {
        let raw = fs::read_to_string(path)
            .map_err(|err| AppError::Config(format!("failed to read config: {err}")))?;
        Self::from_toml_str(&raw)
    }

    /// Parse configuration from a TOML string.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if parsing or validation fails.
    pub fn from_toml_str(raw: &str) -> Result<Self> {
        let config: Self = toml::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Working directory owned by a single execution.
    #[must_use]
    pub fn execution_work_dir(&self, execution_id: uuid::Uuid) -> PathBuf {
        self.work_dir_root.join(execution_id.to_string())
    }

    /// Check cross-field constraints.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` describing the first violated constraint.
    pub fn validate(&self) -> Result<()> {
        if self.heartbeat.min_interval_ms == 0 {
            return Err(AppError::Config(
                "heartbeat.min_interval_ms must be greater than zero".into(),
            ));
        }

        if self.heartbeat.timeout_multiplier == 0 {
            return Err(AppError::Config(
                "heartbeat.timeout_multiplier must be greater than zero".into(),
            ));
        }

        if self.stop_ledger.capacity == 0 {
            return Err(AppError::Config(
                "stop_ledger.capacity must be greater than zero".into(),
            ));
        }

        if self.persistence.backend == PersistenceBackend::Sqlite
            && self.persistence.db_path.is_none()
        {
            return Err(AppError::Config(
                "persistence.db_path is required for the sqlite backend".into(),
            ));
        }

        Ok(())
    }
}

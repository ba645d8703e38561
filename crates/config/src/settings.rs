// User settings

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use sheetpilot_engine::{ExecutorSettings, SortBehavior};
use sheetpilot_sync::{AutosaveConfig, BatchConfig, RetryPolicy};

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to access {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid settings in {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    // Sync
    #[serde(rename = "sync.apiBase")]
    pub api_base: String,

    #[serde(rename = "sync.batchTimeoutMs")]
    pub batch_timeout_ms: u64,

    #[serde(rename = "sync.maxBatchSize")]
    pub max_batch_size: usize,

    #[serde(rename = "sync.maxRetries")]
    pub max_retries: u32,

    #[serde(rename = "sync.retryBaseDelayMs")]
    pub retry_base_delay_ms: u64,

    #[serde(rename = "sync.retryMaxDelayMs")]
    pub retry_max_delay_ms: u64,

    // Autosave
    #[serde(rename = "autosave.enabled")]
    pub autosave_enabled: bool,

    #[serde(rename = "autosave.delayMs")]
    pub autosave_delay_ms: u64,

    // History
    #[serde(rename = "history.maxEntries")]
    pub max_history_entries: usize,

    #[serde(rename = "history.snapshotRetention")]
    pub snapshot_retention: usize,

    // Commands
    #[serde(rename = "commands.requireConfirmation")]
    pub require_confirmation: bool,

    #[serde(rename = "commands.sortBehavior")]
    pub sort_behavior: SortBehavior,

    #[serde(rename = "rollback.requireConfirmation")]
    pub rollback_require_confirmation: bool,

    #[serde(rename = "restore.timeoutMs")]
    pub restore_timeout_ms: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            // Sync
            api_base: "http://localhost:3000".to_string(),
            batch_timeout_ms: 500,
            max_batch_size: 50,
            max_retries: 3,
            retry_base_delay_ms: 1000,
            retry_max_delay_ms: 30_000,
            // Autosave
            autosave_enabled: true,
            autosave_delay_ms: 500,
            // History
            max_history_entries: 100,
            snapshot_retention: 50,
            // Commands
            require_confirmation: false,
            sort_behavior: SortBehavior::LegacyFormula,
            rollback_require_confirmation: false,
            restore_timeout_ms: 5000,
        }
    }
}

impl Settings {
    /// Get the settings file path
    pub fn config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("sheetpilot")
            .join("settings.json")
    }

    /// Load settings from disk, falling back to defaults on any error.
    pub fn load() -> Self {
        let path = Self::config_path();
        match Self::load_from(&path) {
            Ok(settings) => settings,
            Err(e) => {
                log::warn!("{e}; using default settings");
                Self::default()
            }
        }
    }

    /// Load from an explicit path. A missing file yields defaults.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let contents = fs::read_to_string(path).map_err(|source| ConfigError::Io { path: path.to_path_buf(), source })?;

        // Strip comments (lines starting with //)
        let cleaned: String = contents
            .lines()
            .filter(|line| !line.trim().starts_with("//"))
            .collect::<Vec<_>>()
            .join("\n");

        serde_json::from_str(&cleaned).map_err(|source| ConfigError::Parse { path: path.to_path_buf(), source })
    }

    pub fn save(&self) -> Result<(), ConfigError> {
        self.save_to(&Self::config_path())
    }

    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        let io = |source| ConfigError::Io { path: path.to_path_buf(), source };
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(io)?;
        }
        let json = serde_json::to_string_pretty(self)
            .map_err(|source| ConfigError::Parse { path: path.to_path_buf(), source })?;
        fs::write(path, json).map_err(io)
    }

    pub fn batch_config(&self) -> BatchConfig {
        BatchConfig {
            batch_timeout: Duration::from_millis(self.batch_timeout_ms),
            max_batch_size: self.max_batch_size,
            retry: RetryPolicy {
                base_delay: Duration::from_millis(self.retry_base_delay_ms),
                max_delay: Duration::from_millis(self.retry_max_delay_ms),
                max_retries: self.max_retries,
            },
        }
    }

    pub fn autosave_config(&self) -> AutosaveConfig {
        AutosaveConfig {
            enabled: self.autosave_enabled,
            delay: Duration::from_millis(self.autosave_delay_ms),
        }
    }

    /// Executor settings; marker colors keep their defaults.
    pub fn executor_settings(&self) -> ExecutorSettings {
        ExecutorSettings {
            require_confirmation: self.require_confirmation,
            rollback_require_confirmation: self.rollback_require_confirmation,
            sort_behavior: self.sort_behavior,
            max_entries: self.max_history_entries,
            snapshot_retention: self.snapshot_retention,
            restore_timeout: Duration::from_millis(self.restore_timeout_ms),
            ..ExecutorSettings::default()
        }
    }
}

//! Application settings and paths.
//!
//! Settings live in `settings.json` under the XDG config directory unless a
//! file is named explicitly. Missing fields fall back to their defaults.

use crate::error::{ConfigError, ConfigResult};
use crate::queue::DEFAULT_CHANNEL;
use crate::storage::PgConnectOptions;
use crate::worker::WorkerOptions;
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Application directory paths following the XDG Base Directory Specification.
#[derive(Debug, Clone)]
pub struct Paths {
    /// Configuration directory (~/.config/portwatch)
    pub config_dir: PathBuf,
}

impl Paths {
    /// Resolve the XDG directories, creating the config directory.
    pub fn new() -> ConfigResult<Self> {
        let project = ProjectDirs::from("com", "portwatch", "portwatch")
            .ok_or(ConfigError::DirectoryNotFound)?;

        let paths = Self {
            config_dir: project.config_dir().to_path_buf(),
        };
        fs::create_dir_all(&paths.config_dir)?;

        Ok(paths)
    }

    /// Get the path to the settings file.
    pub fn settings_file(&self) -> PathBuf {
        self.config_dir.join("settings.json")
    }
}

/// Application-wide settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppSettings {
    /// Postgres connection string.
    pub database_url: String,
    /// Redis connection string.
    pub redis_url: String,
    /// Name of the Redis list carrying jobs.
    pub queue_channel: String,
    /// Workers started by `serve`.
    pub workers: usize,
    /// Longest a worker blocks on one pop, in milliseconds.
    pub pop_timeout_ms: u64,
    /// nmap binary.
    pub nmap_path: PathBuf,
    /// Passed to `nmap --max-retries`.
    pub nmap_max_retries: u32,
    /// Upper bound on one nmap run, in seconds.
    pub scan_timeout_secs: u64,
    /// Mark jobs `Failed` when nmap itself fails.
    pub fail_on_scanner_error: bool,
    /// Seconds between metrics log lines.
    pub metrics_interval_secs: u64,
    /// Database connection attempts at startup.
    pub connect_attempts: u32,
    /// Delay between database connection attempts, in milliseconds.
    pub connect_backoff_ms: u64,
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            database_url: "postgres://localhost/portwatch".to_string(),
            redis_url: "redis://127.0.0.1:6379".to_string(),
            queue_channel: DEFAULT_CHANNEL.to_string(),
            workers: 5,
            pop_timeout_ms: 1000,
            nmap_path: PathBuf::from("nmap"),
            nmap_max_retries: 2,
            scan_timeout_secs: 300,
            fail_on_scanner_error: false,
            metrics_interval_secs: 60,
            connect_attempts: 10,
            connect_backoff_ms: 2000,
        }
    }
}

impl AppSettings {
    /// Load settings from the default location, or defaults if there is no file.
    pub fn load() -> ConfigResult<Self> {
        let file = Paths::new()?.settings_file();

        if !file.exists() {
            return Ok(Self::default());
        }

        Self::load_from(&file)
    }

    /// Load settings from a specific file.
    pub fn load_from(path: &Path) -> ConfigResult<Self> {
        let content = fs::read_to_string(path).map_err(|e| ConfigError::ReadFailed {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        serde_json::from_str(&content).map_err(|e| ConfigError::InvalidFormat(e.to_string()))
    }

    /// Reject settings the service cannot run with.
    pub fn validate(&self) -> ConfigResult<()> {
        if self.workers == 0 {
            return Err(ConfigError::InvalidValue {
                field: "workers",
                reason: "must be at least 1".to_string(),
            });
        }
        if self.queue_channel.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "queue_channel",
                reason: "must not be empty".to_string(),
            });
        }
        if self.pop_timeout_ms == 0 {
            return Err(ConfigError::InvalidValue {
                field: "pop_timeout_ms",
                reason: "must be greater than 0".to_string(),
            });
        }
        Ok(())
    }

    pub fn worker_options(&self) -> WorkerOptions {
        WorkerOptions {
            pop_timeout: Duration::from_millis(self.pop_timeout_ms),
            fail_on_scanner_error: self.fail_on_scanner_error,
        }
    }

    pub fn connect_options(&self) -> PgConnectOptions {
        PgConnectOptions {
            attempts: self.connect_attempts.max(1),
            backoff: Duration::from_millis(self.connect_backoff_ms),
            ..PgConnectOptions::default()
        }
    }

    pub fn scan_timeout(&self) -> Duration {
        Duration::from_secs(self.scan_timeout_secs)
    }

    pub fn metrics_interval(&self) -> Duration {
        Duration::from_secs(self.metrics_interval_secs.max(1))
    }
}

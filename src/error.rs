//! Error types for portwatch.
//!
//! Uses `thiserror` for ergonomic error definitions. Each layer owns its
//! error enum and a matching `Result` alias.

use std::path::PathBuf;
use thiserror::Error;

/// Errors raised by the job queue and its broker.
#[derive(Error, Debug)]
pub enum QueueError {
    #[error("broker error: {0}")]
    Broker(#[from] redis::RedisError),

    #[error("failed to encode job: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("broker unavailable: {0}")]
    Unavailable(String),
}

/// Errors raised by the status and result stores.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("migration failed: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("could not connect after {attempts} attempts: {reason}")]
    ConnectFailed { attempts: u32, reason: String },

    #[error("corrupt row: {0}")]
    CorruptRow(String),

    #[error("result for {host} at {scanned_at} already recorded in scan {scan_id}")]
    DuplicateResult {
        scan_id: String,
        host: String,
        scanned_at: String,
    },

    #[error("store unavailable: {0}")]
    Unavailable(String),
}

impl StoreError {
    /// A result whose `(scan_id, host, scanned_at)` key is already stored.
    pub(crate) fn duplicate_result(result: &crate::models::ScanResult) -> Self {
        Self::DuplicateResult {
            scan_id: result.scan_id.to_string(),
            host: result.host.to_string(),
            scanned_at: result.scanned_at.to_rfc3339(),
        }
    }
}

/// Errors that abort a `queue_scan` call.
#[derive(Error, Debug)]
pub enum DispatchError {
    #[error("no hosts given")]
    EmptyRequest,

    #[error("failed to record pending status for {host}: {source}")]
    Status {
        host: String,
        #[source]
        source: StoreError,
    },
}

/// Errors surfaced by the inbound scan service.
#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("invalid hostnames/IPs: {}", .0.join(", "))]
    InvalidHosts(Vec<String>),

    #[error("scan ID not found: {0}")]
    ScanNotFound(String),

    #[error(transparent)]
    Dispatch(#[from] DispatchError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Configuration errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("could not determine configuration directory")]
    DirectoryNotFound,

    #[error("failed to read {path}: {reason}")]
    ReadFailed { path: PathBuf, reason: String },

    #[error("invalid settings format: {0}")]
    InvalidFormat(String),

    #[error("invalid setting `{field}`: {reason}")]
    InvalidValue { field: &'static str, reason: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Top-level error for CLI commands.
#[derive(Error, Debug)]
pub enum CliError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Queue(#[from] QueueError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Service(#[from] ServiceError),

    #[error("invalid scan ID: {0}")]
    InvalidScanId(#[from] crate::types::ScanIdError),

    #[error("output error: {0}")]
    Output(#[from] std::io::Error),

    #[error("{0}")]
    Other(String),
}

pub type QueueResult<T> = Result<T, QueueError>;
pub type StoreResult<T> = Result<T, StoreError>;
pub type DispatchResult<T> = Result<T, DispatchError>;
pub type ServiceResult<T> = Result<T, ServiceError>;
pub type ConfigResult<T> = Result<T, ConfigError>;
pub type CliResult<T> = Result<T, CliError>;

//! CLI subcommand definitions and handlers.
//!
//! Implements a git-like subcommand architecture:
//! - `portwatch serve` - Run the worker pool
//! - `portwatch scan <host>...` - Queue a scan
//! - `portwatch status <scan-id>` - Per-host progress of a scan
//! - `portwatch history <host>` - Past results for a host
//! - `portwatch diff <host>` - Port changes between the last two scans

mod results;
mod scan;
mod serve;

pub use results::{DiffCommand, HistoryCommand, StatusCommand};
pub use scan::ScanCommand;
pub use serve::ServeCommand;

use crate::config::AppSettings;
use crate::error::CliResult;
use crate::queue::{JobQueue, RedisBroker};
use crate::service::ScanService;
use crate::storage::PgStore;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::debug;

/// portwatch - queue-backed host scanning with result history.
///
/// Scans are queued on Redis, run by a pool of nmap workers, and recorded in
/// Postgres so successive results for a host can be compared.
#[derive(Parser, Debug)]
#[command(name = "portwatch")]
#[command(author = "HueCodes <huecodes@proton.me>")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Queue host scans and track open port changes", long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,

    /// Enable verbose output
    #[arg(short, long, global = true, conflicts_with = "quiet")]
    pub verbose: bool,

    /// Suppress non-essential output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Path to custom configuration file
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Postgres connection string
    #[arg(long, global = true, env = "DATABASE_URL", value_name = "URL")]
    pub database_url: Option<String>,

    /// Redis connection string
    #[arg(long, global = true, env = "REDIS_URL", value_name = "URL")]
    pub redis_url: Option<String>,
}

/// Available subcommands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the worker pool until interrupted
    Serve(ServeCommand),

    /// Queue a scan of one or more hosts
    #[command(alias = "s")]
    Scan(ScanCommand),

    /// Show per-host progress of a scan
    Status(StatusCommand),

    /// Show recent results for a host
    #[command(alias = "h")]
    History(HistoryCommand),

    /// Show ports opened or closed since the previous scan
    Diff(DiffCommand),
}

impl Cli {
    /// Settings from the config file with command-line overrides applied.
    pub fn settings(&self) -> CliResult<AppSettings> {
        let mut settings = match &self.config {
            Some(path) => AppSettings::load_from(path)?,
            None => AppSettings::load()?,
        };

        if let Some(url) = &self.database_url {
            settings.database_url = url.clone();
        }
        if let Some(url) = &self.redis_url {
            settings.redis_url = url.clone();
        }

        if let Commands::Serve(serve) = &self.command {
            if let Some(n) = serve.workers {
                settings.workers = n;
            }
        }

        settings.validate()?;
        Ok(settings)
    }

    /// Execute the selected subcommand.
    pub async fn execute(&self) -> CliResult<()> {
        let settings = self.settings()?;
        debug!(command = ?self.command, "Running command");

        match &self.command {
            Commands::Serve(cmd) => cmd.execute(&settings, self.quiet).await,
            Commands::Scan(cmd) => cmd.execute(&settings, self.quiet).await,
            Commands::Status(cmd) => cmd.execute(&settings).await,
            Commands::History(cmd) => cmd.execute(&settings).await,
            Commands::Diff(cmd) => cmd.execute(&settings).await,
        }
    }
}

/// Connected stores and queue shared by every command.
pub(crate) struct Backends {
    pub store: Arc<PgStore>,
    pub queue: JobQueue,
}

impl Backends {
    pub async fn connect(settings: &AppSettings) -> CliResult<Self> {
        let store = PgStore::connect(&settings.database_url, &settings.connect_options()).await?;
        let broker = RedisBroker::connect(&settings.redis_url).await?;

        Ok(Self {
            store: Arc::new(store),
            queue: JobQueue::new(Arc::new(broker), settings.queue_channel.clone()),
        })
    }

    pub fn service(&self) -> ScanService {
        ScanService::new(self.queue.clone(), self.store.clone(), self.store.clone())
    }
}

/// Output format for results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum OutputFormat {
    /// Human-readable plain text
    #[default]
    Plain,
    /// JSON structured output
    Json,
    /// CSV format for data analysis
    Csv,
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Plain => write!(f, "plain"),
            Self::Json => write!(f, "json"),
            Self::Csv => write!(f, "csv"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;
    use std::fs;
    use tempfile::TempDir;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(args).unwrap()
    }

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_scan_takes_many_hosts() {
        let cli = parse(&["portwatch", "scan", "10.0.0.5", "example.com"]);
        match cli.command {
            Commands::Scan(cmd) => assert_eq!(cmd.hosts, ["10.0.0.5", "example.com"]),
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_scan_requires_a_host() {
        assert!(Cli::try_parse_from(["portwatch", "scan"]).is_err());
    }

    #[test]
    fn test_history_options() {
        let cli = parse(&["portwatch", "history", "h", "--output", "csv"]);
        match cli.command {
            Commands::History(cmd) => {
                assert_eq!(cmd.host, "h");
                assert_eq!(cmd.output, OutputFormat::Csv);
                assert!(cmd.scan_id.is_none());
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_overrides_apply_to_settings() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("settings.json");
        fs::write(&path, r#"{"workers": 2, "queue_channel": "jobs"}"#).unwrap();

        let cli = parse(&[
            "portwatch",
            "--config",
            path.to_str().unwrap(),
            "--redis-url",
            "redis://queue:6379",
            "serve",
            "--workers",
            "8",
        ]);
        let settings = cli.settings().unwrap();
        assert_eq!(settings.workers, 8);
        assert_eq!(settings.queue_channel, "jobs");
        assert_eq!(settings.redis_url, "redis://queue:6379");
    }

    #[test]
    fn test_invalid_settings_rejected() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("settings.json");
        fs::write(&path, r#"{"pop_timeout_ms": 0}"#).unwrap();

        let cli = parse(&["portwatch", "--config", path.to_str().unwrap(), "diff", "h"]);
        assert!(cli.settings().is_err());
    }
}

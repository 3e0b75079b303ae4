//! Serve subcommand implementation.
//!
//! Runs the worker pool and the metrics reporter until Ctrl-C, then stops
//! the pool and waits for in-flight jobs.

use super::Backends;
use crate::config::AppSettings;
use crate::error::{CliError, CliResult};
use crate::output;
use crate::scanner::NmapScanner;
use crate::telemetry::{spawn_reporter, Metrics};
use crate::worker::WorkerPool;
use clap::Parser;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Run scan workers until interrupted.
#[derive(Parser, Debug)]
pub struct ServeCommand {
    /// Number of parallel workers (overrides the settings file)
    #[arg(short = 'w', long, value_name = "N")]
    pub workers: Option<usize>,
}

impl ServeCommand {
    pub async fn execute(&self, settings: &AppSettings, quiet: bool) -> CliResult<()> {
        let backends = Backends::connect(settings).await?;
        let metrics = Arc::new(Metrics::new());
        let scanner = NmapScanner::new(
            settings.nmap_path.clone(),
            settings.nmap_max_retries,
            settings.scan_timeout(),
        );

        let pool = WorkerPool::new(
            backends.queue.clone(),
            Arc::new(scanner),
            backends.store.clone(),
            backends.store.clone(),
            metrics.clone(),
            settings.worker_options(),
        );
        let handle = pool.start(settings.workers);

        let reporter_cancel = CancellationToken::new();
        let reporter = spawn_reporter(
            metrics,
            backends.queue.clone(),
            settings.metrics_interval(),
            reporter_cancel.clone(),
        );

        if !quiet {
            output::print_info(&format!(
                "{} workers consuming '{}'. Press Ctrl-C to stop.",
                handle.len(),
                backends.queue.channel()
            ));
        }

        let signal = tokio::signal::ctrl_c().await;
        info!("Shutdown requested");

        handle.shutdown().await;
        reporter_cancel.cancel();
        if let Err(e) = reporter.await {
            warn!(error = %e, "Metrics reporter ended abnormally");
        }

        signal.map_err(|e| CliError::Other(format!("failed to listen for Ctrl-C: {}", e)))
    }
}

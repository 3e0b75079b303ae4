//! Query subcommands: `status`, `history` and `diff`.

use super::{Backends, OutputFormat};
use crate::config::AppSettings;
use crate::error::CliResult;
use crate::output;
use crate::types::{Host, ScanId};
use clap::Parser;
use std::io::{self, Write};

/// Show per-host progress of a scan.
#[derive(Parser, Debug)]
pub struct StatusCommand {
    /// Scan ID printed by `portwatch scan`
    #[arg(value_name = "SCAN_ID")]
    pub scan_id: String,

    /// Output format
    #[arg(short, long, value_enum, default_value = "plain")]
    pub output: OutputFormat,
}

impl StatusCommand {
    pub async fn execute(&self, settings: &AppSettings) -> CliResult<()> {
        let scan_id: ScanId = self.scan_id.parse()?;
        let statuses = Backends::connect(settings).await?.service().statuses(scan_id).await?;

        let mut out = io::stdout().lock();
        output::write_statuses(&mut out, scan_id, &statuses, self.output)?;
        out.flush()?;
        Ok(())
    }
}

/// Show results recorded for a host, newest first.
#[derive(Parser, Debug)]
pub struct HistoryCommand {
    /// Host to look up
    #[arg(value_name = "HOST")]
    pub host: String,

    /// Only results of this scan (no row limit)
    #[arg(long, value_name = "SCAN_ID")]
    pub scan_id: Option<String>,

    /// Output format
    #[arg(short, long, value_enum, default_value = "plain")]
    pub output: OutputFormat,
}

impl HistoryCommand {
    pub async fn execute(&self, settings: &AppSettings) -> CliResult<()> {
        let scan_id = self.scan_id.as_deref().map(str::parse::<ScanId>).transpose()?;
        let host = Host::new_unchecked(self.host.trim());

        let history = Backends::connect(settings)
            .await?
            .service()
            .fetch_history(&host, scan_id)
            .await?;

        let mut out = io::stdout().lock();
        output::write_history(&mut out, &host, &history, self.output)?;
        out.flush()?;
        Ok(())
    }
}

/// Show ports that opened or closed between the two latest scans of a host.
#[derive(Parser, Debug)]
pub struct DiffCommand {
    /// Host to compare
    #[arg(value_name = "HOST")]
    pub host: String,

    /// Output format
    #[arg(short, long, value_enum, default_value = "plain")]
    pub output: OutputFormat,
}

impl DiffCommand {
    pub async fn execute(&self, settings: &AppSettings) -> CliResult<()> {
        let host = Host::new_unchecked(self.host.trim());
        let diff = Backends::connect(settings).await?.service().compute_diff(&host).await?;

        let mut out = io::stdout().lock();
        output::write_diff(&mut out, &diff, self.output)?;
        out.flush()?;
        Ok(())
    }
}

//! Scan subcommand implementation.
//!
//! Handles `portwatch scan <host>...`: validates the hosts and queues one
//! job per host. The scan runs in whichever `serve` process picks it up.

use super::Backends;
use crate::config::AppSettings;
use crate::error::CliResult;
use crate::output;
use clap::Parser;
use tracing::info;

/// Queue a scan of one or more hosts.
#[derive(Parser, Debug)]
pub struct ScanCommand {
    /// Hosts to scan (IP addresses or hostnames)
    ///
    /// Examples:
    ///   10.0.0.5           IPv4 address
    ///   ::1                IPv6 address
    ///   example.com        Hostname
    #[arg(value_name = "HOST", required = true)]
    pub hosts: Vec<String>,
}

impl ScanCommand {
    /// Execute the scan command. Prints the scan id on stdout.
    pub async fn execute(&self, settings: &AppSettings, quiet: bool) -> CliResult<()> {
        let backends = Backends::connect(settings).await?;
        let queued = backends.service().queue_scan(self.hosts.clone()).await?;

        info!(scan_id = %queued.scan_id, hosts = queued.hosts.len(), "Scan queued");
        if quiet {
            println!("{}", queued.scan_id);
        } else {
            output::print_success(&format!(
                "Queued {} host(s) as scan {}",
                queued.hosts.len(),
                queued.scan_id
            ));
        }
        Ok(())
    }
}

//! Plain text output formatting.
//!
//! Produces human-readable output with colors and formatting.

use crate::diff::PortDiff;
use crate::models::{HostStatus, JobState, ScanResult};
use crate::types::{Host, Port, ScanId};
use console::{style, Style};
use std::io::{self, Write};

const RULE: &str = "───────────────────────────────────────────────────────────────";

fn state_style(state: JobState) -> Style {
    match state {
        JobState::Pending => Style::new().dim(),
        JobState::InProgress => Style::new().yellow(),
        JobState::Done => Style::new().green().bold(),
        JobState::Failed => Style::new().red().bold(),
    }
}

pub fn write_statuses<W: Write>(out: &mut W, scan_id: ScanId, statuses: &[HostStatus]) -> io::Result<()> {
    writeln!(out)?;
    writeln!(out, "  {} {}", style("Scan ID:").bold(), scan_id)?;
    writeln!(out, "  {}", style(RULE).dim())?;
    writeln!(out, "  {:<40}  {}", style("HOST").bold(), style("STATUS").bold())?;
    writeln!(out, "  {}", style(RULE).dim())?;

    for s in statuses {
        writeln!(out, "  {:<40}  {}", s.host.as_str(), state_style(s.status).apply_to(s.status))?;
    }

    let done = statuses.iter().filter(|s| s.status.is_terminal()).count();
    writeln!(out, "  {}", style(RULE).dim())?;
    writeln!(out, "  {}/{} finished", done, statuses.len())?;
    writeln!(out)
}

pub fn write_history<W: Write>(out: &mut W, host: &Host, history: &[ScanResult]) -> io::Result<()> {
    writeln!(out)?;
    writeln!(out, "  {} {}", style("Host:").bold(), style(host).white().bold())?;

    if history.is_empty() {
        writeln!(out, "  {}", style("No scan results recorded.").dim())?;
        return writeln!(out);
    }

    writeln!(out, "  {}", style(RULE).dim())?;
    writeln!(
        out,
        "  {:<25}  {:<10}  {}",
        style("SCANNED AT").bold(),
        style("SCAN").bold(),
        style("OPEN PORTS").bold()
    )?;
    writeln!(out, "  {}", style(RULE).dim())?;

    for r in history {
        let ports = if r.open_ports.is_empty() {
            style("none".to_string()).dim()
        } else {
            style(join_ports(r.open_ports.iter())).green()
        };
        writeln!(
            out,
            "  {:<25}  {:<10}  {}",
            r.scanned_at.format("%Y-%m-%d %H:%M:%S UTC"),
            style(r.scan_id.short()).dim(),
            ports
        )?;
    }

    writeln!(out, "  {}", style(RULE).dim())?;
    writeln!(out)
}

pub fn write_diff<W: Write>(out: &mut W, diff: &PortDiff) -> io::Result<()> {
    writeln!(out)?;
    writeln!(out, "  {} {}", style("Host:").bold(), style(&diff.host).white().bold())?;

    if diff.is_empty() {
        writeln!(out, "  {}", style("No changes between the last two scans.").dim())?;
        return writeln!(out);
    }

    for port in &diff.newly_opened {
        writeln!(out, "  {} {:>5}/tcp  opened", style("+").green().bold(), port)?;
    }
    for port in &diff.newly_closed {
        writeln!(out, "  {} {:>5}/tcp  closed", style("-").red().bold(), port)?;
    }
    writeln!(out)
}

fn join_ports(ports: impl Iterator<Item = Port>) -> String {
    ports.map(|p| p.to_string()).collect::<Vec<_>>().join(", ")
}

/// Print an error message.
pub fn print_error(msg: &str) {
    eprintln!("{} {}", style("Error:").red().bold(), msg);
}

/// Print a warning message.
pub fn print_warning(msg: &str) {
    eprintln!("{} {}", style("Warning:").yellow().bold(), msg);
}

/// Print a success message.
pub fn print_success(msg: &str) {
    println!("{} {}", style("✓").green().bold(), msg);
}

/// Print an info message.
pub fn print_info(msg: &str) {
    println!("{} {}", style("ℹ").blue().bold(), msg);
}

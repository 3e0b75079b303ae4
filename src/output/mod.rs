//! Output formatting module.
//!
//! Renders scan statuses, result history and port diffs as plain text,
//! JSON, or CSV.

mod csv_format;
mod json_format;
mod plain;

pub use plain::{print_error, print_info, print_success, print_warning};

use crate::cli::OutputFormat;
use crate::diff::PortDiff;
use crate::models::{HostStatus, ScanResult};
use crate::types::{Host, ScanId};
use std::io::{self, Write};

/// Write the per-host states of a scan.
pub fn write_statuses<W: Write>(
    out: &mut W,
    scan_id: ScanId,
    statuses: &[HostStatus],
    format: OutputFormat,
) -> io::Result<()> {
    match format {
        OutputFormat::Plain => plain::write_statuses(out, scan_id, statuses),
        OutputFormat::Json => json_format::write_json(out, statuses),
        OutputFormat::Csv => csv_format::write_statuses(out, statuses),
    }
}

/// Write a host's result history.
pub fn write_history<W: Write>(
    out: &mut W,
    host: &Host,
    history: &[ScanResult],
    format: OutputFormat,
) -> io::Result<()> {
    match format {
        OutputFormat::Plain => plain::write_history(out, host, history),
        OutputFormat::Json => json_format::write_json(out, history),
        OutputFormat::Csv => csv_format::write_history(out, history),
    }
}

/// Write a port diff.
pub fn write_diff<W: Write>(out: &mut W, diff: &PortDiff, format: OutputFormat) -> io::Result<()> {
    match format {
        OutputFormat::Plain => plain::write_diff(out, diff),
        OutputFormat::Json => json_format::write_json(out, diff),
        OutputFormat::Csv => csv_format::write_diff(out, diff),
    }
}

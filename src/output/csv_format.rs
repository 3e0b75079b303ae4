//! CSV output formatting.

use crate::diff::PortDiff;
use crate::models::{HostStatus, ScanResult};
use std::io::{self, Write};

pub fn write_statuses<W: Write>(out: &mut W, statuses: &[HostStatus]) -> io::Result<()> {
    let mut wtr = csv::Writer::from_writer(out);
    wtr.write_record(["host", "status"])?;
    for s in statuses {
        wtr.write_record([s.host.as_str(), s.status.as_str()])?;
    }
    wtr.flush()
}

/// One row per result; `open_ports` keeps the persisted `{a,b}` form.
pub fn write_history<W: Write>(out: &mut W, history: &[ScanResult]) -> io::Result<()> {
    let mut wtr = csv::Writer::from_writer(out);
    wtr.write_record(["scan_id", "host", "scanned_at", "open_ports"])?;
    for r in history {
        wtr.write_record([
            &r.scan_id.to_string(),
            r.host.as_str(),
            &r.scanned_at.to_rfc3339(),
            &r.open_ports.to_string(),
        ])?;
    }
    wtr.flush()
}

pub fn write_diff<W: Write>(out: &mut W, diff: &PortDiff) -> io::Result<()> {
    let mut wtr = csv::Writer::from_writer(out);
    wtr.write_record(["host", "port", "change"])?;
    let opened = diff.newly_opened.iter().map(|p| (p, "opened"));
    let closed = diff.newly_closed.iter().map(|p| (p, "closed"));
    for (port, change) in opened.chain(closed) {
        wtr.write_record([diff.host.as_str(), &port.to_string(), change])?;
    }
    wtr.flush()
}

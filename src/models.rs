//! Records that flow through the job pipeline.
//!
//! `ScanJob` is the queue wire form, `StatusRecord` the per-(scan, host)
//! lifecycle row, and `ScanResult` one appended history entry.

use crate::types::{Host, OpenPorts, ScanId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// One host within one scan request, as placed on the queue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanJob {
    pub scan_id: ScanId,
    pub host: Host,
}

impl ScanJob {
    pub fn new(scan_id: ScanId, host: Host) -> Self {
        Self { scan_id, host }
    }
}

/// Lifecycle state of a scan job.
///
/// States only move forward: `Pending` → `InProgress` → `Done` | `Failed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobState {
    /// Recorded by the dispatcher, waiting on the queue.
    Pending,
    /// Picked up by a worker.
    InProgress,
    /// Result persisted.
    Done,
    /// Result could not be persisted.
    Failed,
}

impl JobState {
    /// Position in the forward order. Terminal states share the last stage.
    pub const fn stage(self) -> i16 {
        match self {
            Self::Pending => 0,
            Self::InProgress => 1,
            Self::Done | Self::Failed => 2,
        }
    }

    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Done | Self::Failed)
    }

    /// Whether a row currently in `self` may move to `next`.
    pub const fn can_advance_to(self, next: JobState) -> bool {
        next.stage() > self.stage()
    }

    /// The persisted spelling.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::InProgress => "in_progress",
            Self::Done => "done",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for JobState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "in_progress" => Ok(Self::InProgress),
            "done" => Ok(Self::Done),
            "failed" => Ok(Self::Failed),
            _ => Err(format!("unknown job state: {}", s)),
        }
    }
}

/// Full status row for one host within one scan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusRecord {
    pub scan_id: ScanId,
    pub host: Host,
    pub state: JobState,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
}

/// The `(host, status)` pair reported for a scan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostStatus {
    pub host: Host,
    pub status: JobState,
}

/// One historical scan outcome for a host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanResult {
    pub scan_id: ScanId,
    pub host: Host,
    pub scanned_at: DateTime<Utc>,
    pub open_ports: OpenPorts,
}

impl ScanResult {
    /// A result stamped with the current time.
    pub fn now(scan_id: ScanId, host: Host, open_ports: OpenPorts) -> Self {
        Self {
            scan_id,
            host,
            scanned_at: Utc::now(),
            open_ports,
        }
    }
}

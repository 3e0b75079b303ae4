//! Scan status and result persistence.
//!
//! Two capabilities, kept separate so callers only depend on what they use:
//! - [`StatusStore`]: one row per `(scan_id, host)`, forward-only transitions
//! - [`ResultStore`]: append-only scan history per host
//!
//! [`PgStore`] backs both with Postgres; [`MemoryStore`] keeps the same
//! semantics in process memory.

mod memory;
mod postgres;

pub use memory::MemoryStore;
pub use postgres::{PgConnectOptions, PgStore};

use crate::error::StoreResult;
use crate::models::{HostStatus, JobState, ScanResult, StatusRecord};
use crate::types::{Host, ScanId};
use async_trait::async_trait;

/// Number of results returned by an unfiltered history query.
pub const RECENT_HISTORY_LIMIT: usize = 10;

/// Per-(scan, host) lifecycle state.
#[async_trait]
pub trait StatusStore: Send + Sync {
    /// Upsert the state for `(scan_id, host)`.
    ///
    /// The write is applied only when no row exists yet or `state` is further
    /// along than the stored one; otherwise the row is left untouched.
    /// `started_at` is stamped on the first move into `InProgress` and
    /// `completed_at` on the first move into `Done` or `Failed`.
    ///
    /// Returns `true` if the row was inserted or changed.
    async fn set_status(&self, scan_id: ScanId, host: &Host, state: JobState) -> StoreResult<bool>;

    /// All `(host, status)` pairs recorded for a scan. Empty for unknown ids.
    async fn statuses(&self, scan_id: ScanId) -> StoreResult<Vec<HostStatus>>;

    /// The full row for one host of a scan.
    async fn status(&self, scan_id: ScanId, host: &Host) -> StoreResult<Option<StatusRecord>>;
}

/// Append-only scan history.
#[async_trait]
pub trait ResultStore: Send + Sync {
    /// Append a result. Never updates or deletes.
    async fn store_result(&self, result: &ScanResult) -> StoreResult<()>;

    /// History for a host, newest first.
    ///
    /// Without a scan id at most [`RECENT_HISTORY_LIMIT`] rows come back; with
    /// one, every row of that scan for the host is returned.
    async fn history(&self, host: &Host, scan_id: Option<ScanId>) -> StoreResult<Vec<ScanResult>>;

    /// The `limit` most recent results for a host, newest first.
    async fn latest(&self, host: &Host, limit: usize) -> StoreResult<Vec<ScanResult>>;
}

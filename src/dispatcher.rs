//! Job dispatch: turns a list of hosts into one scan and per-host jobs.

use crate::error::{DispatchError, DispatchResult};
use crate::models::{JobState, ScanJob};
use crate::queue::JobQueue;
use crate::storage::StatusStore;
use crate::types::{Host, IdGenerator, ScanId};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Creates scans and enqueues their jobs.
pub struct Dispatcher {
    ids: Arc<dyn IdGenerator>,
    statuses: Arc<dyn StatusStore>,
    queue: JobQueue,
}

impl Dispatcher {
    pub fn new(ids: Arc<dyn IdGenerator>, statuses: Arc<dyn StatusStore>, queue: JobQueue) -> Self {
        Self {
            ids,
            statuses,
            queue,
        }
    }

    /// Create a scan for `hosts` and enqueue one job per distinct host.
    ///
    /// Hosts are handled in order. Each gets a `Pending` status row before
    /// its job is pushed. A failed status write aborts the call: later hosts
    /// are skipped and earlier jobs stay enqueued. A failed push is logged
    /// and the host is left `Pending`.
    pub async fn queue_scan(&self, hosts: &[Host]) -> DispatchResult<ScanId> {
        if hosts.is_empty() {
            return Err(DispatchError::EmptyRequest);
        }

        let scan_id = self.ids.generate();
        let mut seen = HashSet::with_capacity(hosts.len());

        for host in hosts {
            if !seen.insert(host) {
                debug!(scan_id = %scan_id, host = %host, "Skipping duplicate host");
                continue;
            }

            self.statuses
                .set_status(scan_id, host, JobState::Pending)
                .await
                .map_err(|source| DispatchError::Status {
                    host: host.to_string(),
                    source,
                })?;

            let job = ScanJob::new(scan_id, host.clone());
            if let Err(e) = self.queue.push(&job).await {
                warn!(
                    scan_id = %scan_id,
                    host = %host,
                    error = %e,
                    "Failed to enqueue job; host stays pending"
                );
            }
        }

        info!(scan_id = %scan_id, hosts = seen.len(), "Scan scheduled");
        Ok(scan_id)
    }
}

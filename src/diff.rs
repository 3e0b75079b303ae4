//! Port diff between a host's two most recent scans.

use crate::error::StoreResult;
use crate::storage::ResultStore;
use crate::types::{Host, Port};
use serde::Serialize;
use std::sync::Arc;
use tracing::debug;

/// Ports that changed state between the previous and the latest scan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PortDiff {
    pub host: Host,
    pub newly_opened: Vec<Port>,
    pub newly_closed: Vec<Port>,
}

impl PortDiff {
    pub fn empty(host: Host) -> Self {
        Self {
            host,
            newly_opened: Vec::new(),
            newly_closed: Vec::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.newly_opened.is_empty() && self.newly_closed.is_empty()
    }
}

/// Reads history on demand; independent of the worker pipeline.
pub struct DiffEngine {
    results: Arc<dyn ResultStore>,
}

impl DiffEngine {
    pub fn new(results: Arc<dyn ResultStore>) -> Self {
        Self { results }
    }

    /// Compare the two most recent results for `host`.
    ///
    /// Fewer than two results yields an empty diff. Duplicate ports within a
    /// result are collapsed, and both sides come back sorted ascending.
    pub async fn compute_diff(&self, host: &Host) -> StoreResult<PortDiff> {
        let recent = self.results.latest(host, 2).await?;

        let [latest, previous] = recent.as_slice() else {
            debug!(host = %host, results = recent.len(), "Not enough history to diff");
            return Ok(PortDiff::empty(host.clone()));
        };

        let now = latest.open_ports.unique();
        let before = previous.open_ports.unique();

        Ok(PortDiff {
            host: host.clone(),
            newly_opened: now.difference(&before).copied().collect(),
            newly_closed: before.difference(&now).copied().collect(),
        })
    }
}

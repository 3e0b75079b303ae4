//! In-memory status and result storage.
//!
//! Mirrors the Postgres semantics exactly, so the pipeline can run without a
//! database (tests, local experiments, embedding).

use super::{ResultStore, StatusStore, RECENT_HISTORY_LIMIT};
use crate::error::{StoreError, StoreResult};
use crate::models::{HostStatus, JobState, ScanResult, StatusRecord};
use crate::types::{Host, ScanId};
use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use tokio::sync::Mutex;

#[derive(Default)]
struct Tables {
    statuses: HashMap<(ScanId, Host), StatusRecord>,
    /// Insertion order, so status listings are stable.
    status_order: Vec<(ScanId, Host)>,
    results: Vec<ScanResult>,
}

/// Process-local store.
#[derive(Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored results across all hosts.
    pub async fn result_count(&self) -> usize {
        self.tables.lock().await.results.len()
    }
}

/// Newest first; equal timestamps keep the later insert first.
fn newest_first<'a>(results: impl Iterator<Item = &'a ScanResult>) -> Vec<ScanResult> {
    let mut rows: Vec<ScanResult> = results.cloned().collect();
    rows.reverse();
    rows.sort_by(|a, b| b.scanned_at.cmp(&a.scanned_at));
    rows
}

#[async_trait]
impl StatusStore for MemoryStore {
    async fn set_status(&self, scan_id: ScanId, host: &Host, state: JobState) -> StoreResult<bool> {
        let now = Utc::now();
        let mut tables = self.tables.lock().await;
        let key = (scan_id, host.clone());

        match tables.statuses.get_mut(&key) {
            Some(row) => {
                if !row.state.can_advance_to(state) {
                    return Ok(false);
                }
                row.state = state;
                if state == JobState::InProgress && row.started_at.is_none() {
                    row.started_at = Some(now);
                }
                if state.is_terminal() && row.completed_at.is_none() {
                    row.completed_at = Some(now);
                }
            }
            None => {
                let row = StatusRecord {
                    scan_id,
                    host: host.clone(),
                    state,
                    started_at: (state == JobState::InProgress).then_some(now),
                    completed_at: state.is_terminal().then_some(now),
                };
                tables.statuses.insert(key.clone(), row);
                tables.status_order.push(key);
            }
        }

        Ok(true)
    }

    async fn statuses(&self, scan_id: ScanId) -> StoreResult<Vec<HostStatus>> {
        let tables = self.tables.lock().await;
        Ok(tables
            .status_order
            .iter()
            .filter(|(id, _)| *id == scan_id)
            .filter_map(|key| tables.statuses.get(key))
            .map(|row| HostStatus {
                host: row.host.clone(),
                status: row.state,
            })
            .collect())
    }

    async fn status(&self, scan_id: ScanId, host: &Host) -> StoreResult<Option<StatusRecord>> {
        let tables = self.tables.lock().await;
        Ok(tables.statuses.get(&(scan_id, host.clone())).cloned())
    }
}

#[async_trait]
impl ResultStore for MemoryStore {
    async fn store_result(&self, result: &ScanResult) -> StoreResult<()> {
        let mut tables = self.tables.lock().await;
        let taken = tables.results.iter().any(|r| {
            r.scan_id == result.scan_id && r.host == result.host && r.scanned_at == result.scanned_at
        });
        if taken {
            return Err(StoreError::duplicate_result(result));
        }

        tables.results.push(result.clone());
        Ok(())
    }

    async fn history(&self, host: &Host, scan_id: Option<ScanId>) -> StoreResult<Vec<ScanResult>> {
        let tables = self.tables.lock().await;
        let for_host = tables.results.iter().filter(|r| &r.host == host);

        Ok(match scan_id {
            Some(id) => newest_first(for_host.filter(|r| r.scan_id == id)),
            None => {
                let mut rows = newest_first(for_host);
                rows.truncate(RECENT_HISTORY_LIMIT);
                rows
            }
        })
    }

    async fn latest(&self, host: &Host, limit: usize) -> StoreResult<Vec<ScanResult>> {
        let tables = self.tables.lock().await;
        let mut rows = newest_first(tables.results.iter().filter(|r| &r.host == host));
        rows.truncate(limit);
        Ok(rows)
    }
}

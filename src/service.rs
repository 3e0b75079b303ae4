//! Inbound operations: the surface the CLI (or any other front end) calls.
//!
//! [`ScanService`] validates raw host strings, then delegates to the
//! dispatcher, the status and result stores, and the diff engine.

use crate::diff::{DiffEngine, PortDiff};
use crate::dispatcher::Dispatcher;
use crate::error::{DispatchError, ServiceError, ServiceResult};
use crate::models::{HostStatus, ScanResult};
use crate::queue::JobQueue;
use crate::storage::{ResultStore, StatusStore};
use crate::types::{DefaultHostValidator, Host, HostnameValidator, IdGenerator, ScanId, UuidGenerator};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, warn};

/// A scheduled scan and the distinct hosts it covers, in request order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueuedScan {
    pub scan_id: ScanId,
    pub hosts: Vec<Host>,
}

pub struct ScanService {
    validator: Arc<dyn HostnameValidator>,
    dispatcher: Dispatcher,
    statuses: Arc<dyn StatusStore>,
    results: Arc<dyn ResultStore>,
    diff: DiffEngine,
}

impl ScanService {
    /// Wire a service with UUID scan ids and the default host validator.
    pub fn new(queue: JobQueue, statuses: Arc<dyn StatusStore>, results: Arc<dyn ResultStore>) -> Self {
        Self::with_capabilities(
            Arc::new(UuidGenerator),
            Arc::new(DefaultHostValidator),
            queue,
            statuses,
            results,
        )
    }

    pub fn with_capabilities(
        ids: Arc<dyn IdGenerator>,
        validator: Arc<dyn HostnameValidator>,
        queue: JobQueue,
        statuses: Arc<dyn StatusStore>,
        results: Arc<dyn ResultStore>,
    ) -> Self {
        Self {
            validator,
            dispatcher: Dispatcher::new(ids, Arc::clone(&statuses), queue),
            statuses,
            diff: DiffEngine::new(Arc::clone(&results)),
            results,
        }
    }

    /// Validate every host, then schedule one scan over all of them.
    ///
    /// All invalid entries are reported together; nothing is scheduled if
    /// any host is rejected. Repeated hosts are scheduled once.
    pub async fn queue_scan(&self, hosts: Vec<String>) -> ServiceResult<QueuedScan> {
        if hosts.is_empty() {
            return Err(DispatchError::EmptyRequest.into());
        }

        let mut valid = Vec::with_capacity(hosts.len());
        let mut invalid = Vec::new();
        for raw in hosts {
            match Host::parse_with(&raw, self.validator.as_ref()) {
                Ok(host) => valid.push(host),
                Err(_) => invalid.push(raw),
            }
        }

        if !invalid.is_empty() {
            warn!(invalid = ?invalid, "Rejected scan request");
            return Err(ServiceError::InvalidHosts(invalid));
        }

        let mut seen = HashSet::with_capacity(valid.len());
        valid.retain(|host| seen.insert(host.clone()));

        let scan_id = self.dispatcher.queue_scan(&valid).await?;
        Ok(QueuedScan { scan_id, hosts: valid })
    }

    /// Per-host states of a scan. An unknown id is an error.
    pub async fn statuses(&self, scan_id: ScanId) -> ServiceResult<Vec<HostStatus>> {
        let statuses = self.statuses.statuses(scan_id).await?;
        if statuses.is_empty() {
            return Err(ServiceError::ScanNotFound(scan_id.to_string()));
        }
        Ok(statuses)
    }

    /// Result history for a host, newest first.
    pub async fn fetch_history(&self, host: &Host, scan_id: Option<ScanId>) -> ServiceResult<Vec<ScanResult>> {
        let history = self.results.history(host, scan_id).await?;
        debug!(host = %host, rows = history.len(), "Fetched history");
        Ok(history)
    }

    pub async fn compute_diff(&self, host: &Host) -> ServiceResult<PortDiff> {
        Ok(self.diff.compute_diff(host).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::JobState;
    use crate::queue::MemoryBroker;
    use crate::storage::MemoryStore;
    use crate::testing::FixedIds;
    use crate::types::{OpenPorts, Port};
    use std::time::Duration;

    struct Fixture {
        service: ScanService,
        store: Arc<MemoryStore>,
        queue: JobQueue,
    }

    fn fixture(id: ScanId) -> Fixture {
        let store = Arc::new(MemoryStore::new());
        let queue = JobQueue::new(Arc::new(MemoryBroker::new()), "jobs");
        let service = ScanService::with_capabilities(
            Arc::new(FixedIds(id)),
            Arc::new(DefaultHostValidator),
            queue.clone(),
            store.clone(),
            store.clone(),
        );
        Fixture { service, store, queue }
    }

    #[tokio::test]
    async fn test_queue_scan_schedules_valid_hosts() {
        let id = ScanId::from_bytes([3; 16]);
        let fx = fixture(id);

        let queued = fx
            .service
            .queue_scan(vec!["10.0.0.5".into(), " example.com ".into()])
            .await
            .unwrap();
        assert_eq!(queued.scan_id, id);
        assert_eq!(queued.hosts.len(), 2);

        let statuses = fx.service.statuses(id).await.unwrap();
        let hosts: Vec<&str> = statuses.iter().map(|s| s.host.as_str()).collect();
        assert_eq!(hosts, ["10.0.0.5", "example.com"]);
        assert!(statuses.iter().all(|s| s.status == JobState::Pending));
        assert_eq!(fx.queue.len().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_repeated_hosts_counted_once() {
        let id = ScanId::new();
        let fx = fixture(id);

        let queued = fx
            .service
            .queue_scan(vec![
                "a.example".into(),
                "a.example".into(),
                " a.example".into(),
                "b.example".into(),
            ])
            .await
            .unwrap();

        let hosts: Vec<&str> = queued.hosts.iter().map(Host::as_str).collect();
        assert_eq!(hosts, ["a.example", "b.example"]);
        assert_eq!(fx.queue.len().await.unwrap(), 2);
        assert_eq!(fx.service.statuses(id).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_invalid_hosts_reported_together() {
        let fx = fixture(ScanId::new());

        let err = fx
            .service
            .queue_scan(vec!["ok.example".into(), "bad host".into(), "-nope".into()])
            .await
            .unwrap_err();

        match err {
            ServiceError::InvalidHosts(bad) => assert_eq!(bad, ["bad host", "-nope"]),
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(fx.queue.len().await.unwrap(), 0);
        assert_eq!(fx.store.result_count().await, 0);
    }

    #[tokio::test]
    async fn test_empty_request_rejected() {
        let fx = fixture(ScanId::new());
        let err = fx.service.queue_scan(Vec::new()).await.unwrap_err();
        assert!(matches!(err, ServiceError::Dispatch(DispatchError::EmptyRequest)));
    }

    #[tokio::test]
    async fn test_unknown_scan_is_not_found() {
        let fx = fixture(ScanId::new());
        let err = fx.service.statuses(ScanId::new()).await.unwrap_err();
        assert!(matches!(err, ServiceError::ScanNotFound(_)));
    }

    #[tokio::test]
    async fn test_history_and_diff() {
        let id = ScanId::new();
        let fx = fixture(id);
        let host = Host::new_unchecked("10.0.0.5");

        for open in [[22u16, 80], [80, 443]] {
            let ports: OpenPorts = open.iter().map(|&p| Port::new(p).unwrap()).collect();
            fx.store
                .store_result(&ScanResult::now(id, host.clone(), ports))
                .await
                .unwrap();
            tokio::time::sleep(Duration::from_millis(2)).await;
        }

        let history = fx.service.fetch_history(&host, None).await.unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].open_ports.to_string(), "{80,443}");

        assert_eq!(fx.service.fetch_history(&host, Some(id)).await.unwrap().len(), 2);
        assert!(fx
            .service
            .fetch_history(&host, Some(ScanId::new()))
            .await
            .unwrap()
            .is_empty());

        let diff = fx.service.compute_diff(&host).await.unwrap();
        assert_eq!(diff.newly_opened, vec![Port::new(443).unwrap()]);
        assert_eq!(diff.newly_closed, vec![Port::new(22).unwrap()]);
    }
}

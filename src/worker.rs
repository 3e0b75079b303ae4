//! Worker pool draining the job queue.
//!
//! Each worker is a sequential loop: pop a job, mark it `InProgress`, run
//! the scanner, append the result, and finalize the status as `Done` or
//! `Failed`. Parallelism comes only from running several workers; they share
//! nothing but the queue, the stores and the metrics sink.
//!
//! No failure inside the loop stops a worker. Only the pool's
//! `CancellationToken` does, and it is observed between pops, so a job that
//! has been popped always runs to completion.

use crate::models::{JobState, ScanJob, ScanResult};
use crate::queue::JobQueue;
use crate::scanner::Scanner;
use crate::storage::{ResultStore, StatusStore};
use crate::telemetry::MetricsSink;
use futures::future::join_all;
use futures::FutureExt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Tunables shared by every worker in a pool.
#[derive(Debug, Clone)]
pub struct WorkerOptions {
    /// Longest a single pop waits before the worker re-checks cancellation.
    pub pop_timeout: Duration,
    /// Mark a job `Failed` (and store nothing) when the scanner itself fails,
    /// instead of storing an empty result.
    pub fail_on_scanner_error: bool,
}

impl Default for WorkerOptions {
    fn default() -> Self {
        Self {
            pop_timeout: Duration::from_secs(1),
            fail_on_scanner_error: false,
        }
    }
}

/// How one job ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobOutcome {
    /// Result stored, status `Done`.
    Done,
    /// Status `Failed`.
    Failed,
    /// Another delivery of the same job already claimed it.
    Skipped,
}

/// One queue consumer.
#[derive(Clone)]
pub struct Worker {
    id: usize,
    queue: JobQueue,
    scanner: Arc<dyn Scanner>,
    statuses: Arc<dyn StatusStore>,
    results: Arc<dyn ResultStore>,
    metrics: Arc<dyn MetricsSink>,
    options: WorkerOptions,
}

impl Worker {
    pub fn new(
        id: usize,
        queue: JobQueue,
        scanner: Arc<dyn Scanner>,
        statuses: Arc<dyn StatusStore>,
        results: Arc<dyn ResultStore>,
        metrics: Arc<dyn MetricsSink>,
        options: WorkerOptions,
    ) -> Self {
        Self {
            id,
            queue,
            scanner,
            statuses,
            results,
            metrics,
            options,
        }
    }

    /// Drain the queue until `cancel` fires.
    pub async fn run(self, cancel: CancellationToken) {
        info!(worker = self.id, "Worker started");

        while !cancel.is_cancelled() {
            let job = match self.queue.pop(self.options.pop_timeout).await {
                Ok(Some(job)) => job,
                Ok(None) => continue,
                Err(e) => {
                    warn!(worker = self.id, error = %e, "Failed to pop job");
                    tokio::select! {
                        _ = cancel.cancelled() => break,
                        _ = tokio::time::sleep(self.options.pop_timeout) => continue,
                    }
                }
            };

            self.metrics.worker_busy();
            let outcome = AssertUnwindSafe(self.process(&job)).catch_unwind().await;
            self.metrics.worker_idle();

            if outcome.is_err() {
                error!(worker = self.id, scan_id = %job.scan_id, host = %job.host, "Job panicked");
                self.finalize(&job, JobState::Failed).await;
            }
        }

        info!(worker = self.id, "Worker stopped");
    }

    /// Run one job through scan, persistence and status finalization.
    pub async fn process(&self, job: &ScanJob) -> JobOutcome {
        let ScanJob { scan_id, host } = job;

        match self.statuses.set_status(*scan_id, host, JobState::InProgress).await {
            Ok(true) => {}
            Ok(false) => {
                warn!(worker = self.id, scan_id = %scan_id, host = %host, "Job already claimed, skipping duplicate");
                return JobOutcome::Skipped;
            }
            Err(e) => {
                warn!(worker = self.id, scan_id = %scan_id, host = %host, error = %e, "Could not mark job in progress");
            }
        }

        let start = Instant::now();
        let outcome = self.scanner.scan(host).await;

        let state = if outcome.is_failure() {
            self.metrics.scanner_failed();
            warn!(worker = self.id, scan_id = %scan_id, host = %host, outcome = %outcome, "Scanner failed");

            if self.options.fail_on_scanner_error {
                JobState::Failed
            } else {
                self.persist(ScanResult::now(*scan_id, host.clone(), outcome.into_ports()))
                    .await
            }
        } else {
            self.persist(ScanResult::now(*scan_id, host.clone(), outcome.into_ports()))
                .await
        };

        self.metrics.scan_recorded(start.elapsed());
        self.finalize(job, state).await;

        match state {
            JobState::Done => JobOutcome::Done,
            _ => JobOutcome::Failed,
        }
    }

    async fn persist(&self, result: ScanResult) -> JobState {
        match self.results.store_result(&result).await {
            Ok(()) => {
                debug!(worker = self.id, scan_id = %result.scan_id, host = %result.host, open = %result.open_ports, "Scan result stored");
                JobState::Done
            }
            Err(e) => {
                error!(worker = self.id, scan_id = %result.scan_id, host = %result.host, error = %e, "DB error storing scan result");
                self.metrics.persistence_failed();
                JobState::Failed
            }
        }
    }

    async fn finalize(&self, job: &ScanJob, state: JobState) {
        if let Err(e) = self.statuses.set_status(job.scan_id, &job.host, state).await {
            error!(worker = self.id, scan_id = %job.scan_id, host = %job.host, state = %state, error = %e, "Could not finalize job status");
        }
    }
}

/// Builds workers that share one set of dependencies.
#[derive(Clone)]
pub struct WorkerPool {
    queue: JobQueue,
    scanner: Arc<dyn Scanner>,
    statuses: Arc<dyn StatusStore>,
    results: Arc<dyn ResultStore>,
    metrics: Arc<dyn MetricsSink>,
    options: WorkerOptions,
}

impl WorkerPool {
    pub fn new(
        queue: JobQueue,
        scanner: Arc<dyn Scanner>,
        statuses: Arc<dyn StatusStore>,
        results: Arc<dyn ResultStore>,
        metrics: Arc<dyn MetricsSink>,
        options: WorkerOptions,
    ) -> Self {
        Self {
            queue,
            scanner,
            statuses,
            results,
            metrics,
            options,
        }
    }

    fn worker(&self, id: usize) -> Worker {
        Worker::new(
            id,
            self.queue.clone(),
            Arc::clone(&self.scanner),
            Arc::clone(&self.statuses),
            Arc::clone(&self.results),
            Arc::clone(&self.metrics),
            self.options.clone(),
        )
    }

    /// Spawn `n` workers on the tokio runtime.
    pub fn start(&self, n: usize) -> WorkerPoolHandle {
        let cancel = CancellationToken::new();
        self.metrics.workers_started(n);

        let handles = (0..n)
            .map(|id| tokio::spawn(self.worker(id).run(cancel.child_token())))
            .collect();

        info!(workers = n, channel = %self.queue.channel(), "Worker pool started");
        WorkerPoolHandle {
            cancel,
            handles,
            metrics: Arc::clone(&self.metrics),
        }
    }
}

/// Running pool: cancel and join.
pub struct WorkerPoolHandle {
    cancel: CancellationToken,
    handles: Vec<JoinHandle<()>>,
    metrics: Arc<dyn MetricsSink>,
}

impl WorkerPoolHandle {
    /// Number of workers started.
    pub fn len(&self) -> usize {
        self.handles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }

    /// Token that stops every worker when cancelled.
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Stop all workers and wait for them to finish their current job.
    pub async fn shutdown(self) {
        info!(workers = self.handles.len(), "Stopping worker pool");
        self.cancel.cancel();

        let workers = self.handles.len();
        for joined in join_all(self.handles).await {
            if let Err(e) = joined {
                error!(error = %e, "Worker task ended abnormally");
            }
        }

        self.metrics.workers_stopped(workers);
        info!("Worker pool stopped");
    }
}

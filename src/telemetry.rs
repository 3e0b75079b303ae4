//! Scan pipeline metrics.
//!
//! Workers report through the [`MetricsSink`] trait handed to them at
//! construction. [`Metrics`] is an atomic, lock-free implementation whose
//! [`snapshot`](Metrics::snapshot) is logged periodically by
//! [`spawn_reporter`].

use crate::queue::JobQueue;
use serde::Serialize;
use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Upper bounds (seconds) of the scan duration histogram buckets.
pub const DURATION_BUCKETS: [f64; 8] = [1.0, 5.0, 10.0, 30.0, 60.0, 120.0, 300.0, 600.0];

/// Receiver of worker observations.
pub trait MetricsSink: Send + Sync {
    /// A job went through scan and persistence (successfully or not).
    fn scan_recorded(&self, duration: Duration);
    /// Persisting a result failed.
    fn persistence_failed(&self);
    /// The scanner reported an execution failure.
    fn scanner_failed(&self);
    /// A worker started processing a job.
    fn worker_busy(&self);
    /// A worker finished processing a job.
    fn worker_idle(&self);
    /// Latest sampled queue depth.
    fn queue_length(&self, len: usize);
    /// `n` workers joined the pool, idle.
    fn workers_started(&self, n: usize);
    /// `n` workers left the pool.
    fn workers_stopped(&self, n: usize);
}

/// Point-in-time copy of [`Metrics`].
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct MetricsSnapshot {
    pub scans_total: u64,
    pub scan_failures_total: u64,
    pub scanner_errors_total: u64,
    pub duration_count: u64,
    pub duration_sum_secs: f64,
    /// Cumulative counts per entry of [`DURATION_BUCKETS`].
    pub duration_buckets: Vec<u64>,
    pub workers_active: i64,
    pub workers_idle: i64,
    pub queue_length: u64,
}

/// Atomic counters, gauges and a fixed-bucket histogram.
#[derive(Debug, Default)]
pub struct Metrics {
    scans_total: AtomicU64,
    scan_failures_total: AtomicU64,
    scanner_errors_total: AtomicU64,
    duration_count: AtomicU64,
    duration_sum_micros: AtomicU64,
    duration_buckets: [AtomicU64; DURATION_BUCKETS.len()],
    workers_active: AtomicI64,
    workers_idle: AtomicI64,
    queue_length: AtomicU64,
}

impl Metrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        let mut cumulative = 0;
        let duration_buckets = self
            .duration_buckets
            .iter()
            .map(|b| {
                cumulative += b.load(Ordering::Relaxed);
                cumulative
            })
            .collect();

        MetricsSnapshot {
            scans_total: self.scans_total.load(Ordering::Relaxed),
            scan_failures_total: self.scan_failures_total.load(Ordering::Relaxed),
            scanner_errors_total: self.scanner_errors_total.load(Ordering::Relaxed),
            duration_count: self.duration_count.load(Ordering::Relaxed),
            duration_sum_secs: self.duration_sum_micros.load(Ordering::Relaxed) as f64 / 1e6,
            duration_buckets,
            workers_active: self.workers_active.load(Ordering::Relaxed),
            workers_idle: self.workers_idle.load(Ordering::Relaxed),
            queue_length: self.queue_length.load(Ordering::Relaxed),
        }
    }
}

impl MetricsSink for Metrics {
    fn scan_recorded(&self, duration: Duration) {
        self.scans_total.fetch_add(1, Ordering::Relaxed);
        self.duration_count.fetch_add(1, Ordering::Relaxed);
        self.duration_sum_micros
            .fetch_add(duration.as_micros() as u64, Ordering::Relaxed);

        let secs = duration.as_secs_f64();
        if let Some(idx) = DURATION_BUCKETS.iter().position(|&upper| secs <= upper) {
            self.duration_buckets[idx].fetch_add(1, Ordering::Relaxed);
        }
    }

    fn persistence_failed(&self) {
        self.scan_failures_total.fetch_add(1, Ordering::Relaxed);
    }

    fn scanner_failed(&self) {
        self.scanner_errors_total.fetch_add(1, Ordering::Relaxed);
    }

    fn worker_busy(&self) {
        self.workers_idle.fetch_sub(1, Ordering::Relaxed);
        self.workers_active.fetch_add(1, Ordering::Relaxed);
    }

    fn worker_idle(&self) {
        self.workers_active.fetch_sub(1, Ordering::Relaxed);
        self.workers_idle.fetch_add(1, Ordering::Relaxed);
    }

    fn queue_length(&self, len: usize) {
        self.queue_length.store(len as u64, Ordering::Relaxed);
    }

    fn workers_started(&self, n: usize) {
        self.workers_idle.fetch_add(n as i64, Ordering::Relaxed);
    }

    fn workers_stopped(&self, n: usize) {
        self.workers_idle.fetch_sub(n as i64, Ordering::Relaxed);
    }
}

/// Periodically sample the queue depth and log a metrics snapshot until
/// `cancel` fires.
pub fn spawn_reporter(
    metrics: Arc<Metrics>,
    queue: JobQueue,
    interval: Duration,
    cancel: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {}
            }

            match queue.len().await {
                Ok(len) => metrics.queue_length(len),
                Err(e) => warn!(error = %e, "Could not sample queue length"),
            }

            let s = metrics.snapshot();
            info!(
                scans_total = s.scans_total,
                scan_failures_total = s.scan_failures_total,
                scanner_errors_total = s.scanner_errors_total,
                duration_sum_secs = s.duration_sum_secs,
                workers_active = s.workers_active,
                workers_idle = s.workers_idle,
                queue_length = s.queue_length,
                "metrics"
            );
        }
    })
}

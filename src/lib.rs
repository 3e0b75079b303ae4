//! # portwatch - Queue-Backed Host Scanning
//!
//! portwatch accepts lists of hosts, scans them in the background, tracks
//! per-host progress, keeps a history of results, and reports which ports
//! opened or closed between successive scans of a host.
//!
//! ## Pipeline
//!
//! - [`dispatcher`] creates a scan, records every host as `Pending`, and
//!   pushes one job per host onto the [`queue`]
//! - [`worker`] runs N consumers that pop jobs, call the [`scanner`], append
//!   a result to [`storage`], and finalize the host's status
//! - [`diff`] compares the two latest results for a host on demand
//!
//! [`service::ScanService`] bundles the query and scheduling operations used
//! by the command line.
//!
//! ## Example Usage
//!
//! ```rust,ignore
//! use portwatch::queue::{JobQueue, MemoryBroker};
//! use portwatch::service::ScanService;
//! use portwatch::storage::MemoryStore;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() {
//!     let store = Arc::new(MemoryStore::new());
//!     let queue = JobQueue::new(Arc::new(MemoryBroker::new()), "scan_jobs");
//!     let service = ScanService::new(queue, store.clone(), store);
//!
//!     let queued = service.queue_scan(vec!["10.0.0.5".into()]).await.unwrap();
//!     println!("queued {} as {}", queued.hosts.len(), queued.scan_id);
//! }
//! ```

pub mod cli;
pub mod config;
pub mod diff;
pub mod dispatcher;
pub mod error;
pub mod models;
pub mod output;
pub mod queue;
pub mod scanner;
pub mod service;
pub mod storage;
pub mod telemetry;
pub mod types;
pub mod worker;

#[cfg(test)]
mod testing;

// Re-export commonly used types
pub use error::{CliError, DispatchError, QueueError, ServiceError, StoreError};
pub use models::{JobState, ScanJob, ScanResult};
pub use types::{Host, OpenPorts, Port, ScanId};

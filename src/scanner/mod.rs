//! Scanner abstraction.
//!
//! The worker pool does not scan hosts itself; it delegates to a
//! [`Scanner`]. The production implementation shells out to nmap
//! ([`NmapScanner`]); tests substitute canned outcomes.

mod nmap;

pub use nmap::{parse_open_ports, NmapScanner};

use crate::types::{Host, OpenPorts};
use async_trait::async_trait;
use std::fmt;

/// What a single host scan produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScanOutcome {
    /// The scan ran; these ports were open (possibly none).
    Completed(OpenPorts),
    /// The scan could not be run or its output could not be read.
    Failed(String),
}

impl ScanOutcome {
    pub fn is_failure(&self) -> bool {
        matches!(self, Self::Failed(_))
    }

    /// The open ports, treating a failed scan as finding nothing.
    pub fn into_ports(self) -> OpenPorts {
        match self {
            Self::Completed(ports) => ports,
            Self::Failed(_) => OpenPorts::new(),
        }
    }
}

impl fmt::Display for ScanOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Completed(ports) => write!(f, "{} open", ports),
            Self::Failed(reason) => write!(f, "failed: {}", reason),
        }
    }
}

/// Scans one host for open TCP ports.
///
/// Implementations never return errors upward; failures are reported as
/// [`ScanOutcome::Failed`].
///
/// # Example
///
/// ```ignore
/// use portwatch::scanner::{Scanner, ScanOutcome};
///
/// async fn open_count<S: Scanner>(scanner: &S, host: &Host) -> usize {
///     scanner.scan(host).await.into_ports().len()
/// }
/// ```
#[async_trait]
pub trait Scanner: Send + Sync {
    async fn scan(&self, host: &Host) -> ScanOutcome;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Port;

    #[test]
    fn test_failed_outcome_collapses_to_empty() {
        let outcome = ScanOutcome::Failed("exit status 1".into());
        assert!(outcome.is_failure());
        assert!(outcome.into_ports().is_empty());
    }

    #[test]
    fn test_outcome_display() {
        let ports: OpenPorts = vec![Port::new(22).unwrap()].into();
        assert_eq!(ScanOutcome::Completed(ports).to_string(), "{22} open");
        assert_eq!(
            ScanOutcome::Failed("timeout".into()).to_string(),
            "failed: timeout"
        );
    }
}

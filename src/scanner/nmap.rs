//! nmap-backed scanner.
//!
//! Runs a no-ping TCP connect scan (`nmap -Pn -sT --max-retries N <host>`)
//! and reads open ports out of the text report:
//!
//! ```text
//! PORT    STATE SERVICE
//! 22/tcp  open  ssh
//! 80/tcp  open  http
//! ```

use super::{ScanOutcome, Scanner};
use crate::types::{Host, OpenPorts, Port};
use async_trait::async_trait;
use regex::Regex;
use std::path::PathBuf;
use std::process::Stdio;
use std::sync::OnceLock;
use std::time::Duration;
use tokio::process::Command;
use tokio::time::timeout;
use tracing::{debug, info, warn};

static OPEN_PORT_RE: OnceLock<Regex> = OnceLock::new();

fn open_port_regex() -> &'static Regex {
    OPEN_PORT_RE.get_or_init(|| {
        Regex::new(r"^\s*(\d+)/tcp\s+open(\s|$)").expect("open port pattern is a valid regex")
    })
}

/// Extract open TCP ports from an nmap text report, in report order.
pub fn parse_open_ports(output: &str) -> OpenPorts {
    output
        .lines()
        .filter_map(|line| open_port_regex().captures(line))
        .filter_map(|caps| caps.get(1)?.as_str().parse::<Port>().ok())
        .collect()
}

/// Scanner that shells out to nmap.
#[derive(Debug, Clone)]
pub struct NmapScanner {
    program: PathBuf,
    max_retries: u32,
    timeout: Duration,
}

impl NmapScanner {
    /// Create a scanner.
    ///
    /// # Arguments
    /// * `program` - Path or name of the nmap binary
    /// * `max_retries` - Value passed to `--max-retries`
    /// * `timeout` - Upper bound on one nmap run
    pub fn new(program: impl Into<PathBuf>, max_retries: u32, timeout: Duration) -> Self {
        Self {
            program: program.into(),
            max_retries,
            timeout,
        }
    }

    fn command(&self, host: &Host) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.arg("-Pn")
            .arg("-sT")
            .arg("--max-retries")
            .arg(self.max_retries.to_string())
            .arg(host.as_str())
            .stdin(Stdio::null())
            .kill_on_drop(true);
        cmd
    }
}

impl Default for NmapScanner {
    fn default() -> Self {
        Self::new("nmap", 2, Duration::from_secs(300))
    }
}

#[async_trait]
impl Scanner for NmapScanner {
    async fn scan(&self, host: &Host) -> ScanOutcome {
        debug!(host = %host, program = %self.program.display(), "Running nmap");

        let output = match timeout(self.timeout, self.command(host).output()).await {
            Ok(Ok(output)) => output,
            Ok(Err(e)) => {
                warn!(host = %host, error = %e, "nmap could not be started");
                return ScanOutcome::Failed(e.to_string());
            }
            Err(_) => {
                warn!(host = %host, timeout = ?self.timeout, "nmap timed out");
                return ScanOutcome::Failed(format!("timed out after {:?}", self.timeout));
            }
        };

        let stdout = String::from_utf8_lossy(&output.stdout);
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            warn!(host = %host, status = %output.status, stdout = %stdout, stderr = %stderr, "nmap error");
            return ScanOutcome::Failed(format!("nmap exited with {}", output.status));
        }

        let ports = parse_open_ports(&stdout);
        info!(host = %host, open = %ports, "nmap finished");
        ScanOutcome::Completed(ports)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const REPORT: &str = "\
Starting Nmap 7.94 ( https://nmap.org ) at 2025-01-01 00:00 UTC
Nmap scan report for scanme.nmap.org (45.33.32.156)
Host is up (0.17s latency).
Not shown: 995 closed tcp ports (conn-refused)
PORT      STATE    SERVICE
22/tcp    open     ssh
25/tcp    filtered smtp
80/tcp    open     http
9929/tcp  open     nping-echo
31337/tcp closed   Elite
53/udp    open     domain

Nmap done: 1 IP address (1 host up) scanned in 12.34 seconds
";

    #[test]
    fn test_parse_open_ports() {
        let ports = parse_open_ports(REPORT);
        assert_eq!(ports.to_string(), "{22,80,9929}");
    }

    #[test]
    fn test_parse_empty_report() {
        assert!(parse_open_ports("").is_empty());
        assert!(parse_open_ports("All 1000 scanned ports are closed").is_empty());
    }

    #[test]
    fn test_parse_ignores_open_filtered() {
        assert!(parse_open_ports("8080/tcp open|filtered http-proxy").is_empty());
    }

    #[test]
    fn test_command_arguments() {
        let scanner = NmapScanner::new("/usr/bin/nmap", 3, Duration::from_secs(1));
        let cmd = scanner.command(&Host::new_unchecked("10.0.0.5"));
        let args: Vec<_> = cmd
            .as_std()
            .get_args()
            .map(|a| a.to_string_lossy().into_owned())
            .collect();
        assert_eq!(args, ["-Pn", "-sT", "--max-retries", "3", "10.0.0.5"]);
    }

    #[tokio::test]
    async fn test_missing_binary_is_a_failure() {
        let scanner = NmapScanner::new(
            "/nonexistent/portwatch-nmap",
            2,
            Duration::from_secs(1),
        );
        let outcome = scanner.scan(&Host::new_unchecked("127.0.0.1")).await;
        assert!(outcome.is_failure());
        assert!(outcome.into_ports().is_empty());
    }
}

//! Scan host type with IP and hostname validation.
//!
//! A host is accepted if it is either:
//! - An IPv4 or IPv6 address ("10.0.0.5", "::1")
//! - An RFC 1123 hostname ("example.com", "db-01")

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::IpAddr;
use std::sync::OnceLock;

static HOSTNAME_RE: OnceLock<Regex> = OnceLock::new();

fn hostname_regex() -> &'static Regex {
    HOSTNAME_RE.get_or_init(|| {
        Regex::new(
            r"^(([a-zA-Z0-9]|[a-zA-Z0-9][a-zA-Z0-9\-]*[a-zA-Z0-9])\.)*([A-Za-z0-9]|[A-Za-z0-9][A-Za-z0-9\-]*[A-Za-z0-9])$",
        )
        .expect("hostname pattern is a valid regex")
    })
}

/// A host named by a scan request.
///
/// Hosts are kept as the caller wrote them; they are the key of both the
/// status and result tables, so no normalisation happens here.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Host(String);

impl Host {
    /// Validate and wrap a host string.
    pub fn parse(s: &str) -> Result<Self, HostError> {
        Self::parse_with(s, &DefaultHostValidator)
    }

    /// Validate with a caller-supplied validator.
    pub fn parse_with(s: &str, validator: &dyn HostnameValidator) -> Result<Self, HostError> {
        let s = s.trim();
        if s.is_empty() {
            return Err(HostError::Empty);
        }
        if !validator.is_valid(s) {
            return Err(HostError::InvalidFormat(s.to_string()));
        }
        Ok(Self(s.to_string()))
    }

    /// Wrap a host that was validated before it was persisted or enqueued.
    pub fn new_unchecked(host: impl Into<String>) -> Self {
        Self(host.into())
    }

    /// The host as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Host {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for Host {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Error type for host validation.
#[derive(Debug, Clone, thiserror::Error)]
pub enum HostError {
    #[error("empty host")]
    Empty,
    #[error("invalid host format: {0}")]
    InvalidFormat(String),
}

/// Decides whether a string names a scannable host.
pub trait HostnameValidator: Send + Sync {
    fn is_valid(&self, host: &str) -> bool;
}

/// Accepts IP literals and RFC 1123 hostnames.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultHostValidator;

impl HostnameValidator for DefaultHostValidator {
    fn is_valid(&self, host: &str) -> bool {
        host.parse::<IpAddr>().is_ok() || hostname_regex().is_match(host)
    }
}

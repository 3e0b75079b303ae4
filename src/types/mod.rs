//! Core type definitions using newtype patterns for type safety.
//!
//! These types keep raw strings and integers from flowing through the job
//! pipeline unchecked: a `Host` has been validated, a `Port` is never zero,
//! and a `ScanId` is always a well-formed UUID.

mod host;
mod port;
mod scan_id;

pub use host::{DefaultHostValidator, Host, HostError, HostnameValidator};
pub use port::{OpenPorts, Port, PortError};
pub use scan_id::{IdGenerator, ScanId, ScanIdError, UuidGenerator};

//! Configuration for portwatch.
//!
//! Provides XDG-compliant settings storage plus validation of the values
//! the service runs with.

mod settings;

pub use settings::{AppSettings, Paths};

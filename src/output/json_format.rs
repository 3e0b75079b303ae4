//! JSON output formatting.

use serde::Serialize;
use std::io::{self, Write};

/// Write any serializable value as pretty JSON followed by a newline.
pub fn write_json<W: Write, T: Serialize + ?Sized>(out: &mut W, value: &T) -> io::Result<()> {
    serde_json::to_writer_pretty(&mut *out, value)?;
    writeln!(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{HostStatus, JobState};
    use crate::types::Host;

    #[test]
    fn test_statuses_as_json() {
        let statuses = vec![HostStatus {
            host: Host::new_unchecked("10.0.0.5"),
            status: JobState::InProgress,
        }];

        let mut buf = Vec::new();
        write_json(&mut buf, &statuses).unwrap();

        let value: serde_json::Value = serde_json::from_slice(&buf).unwrap();
        assert_eq!(value[0]["host"], "10.0.0.5");
        assert_eq!(value[0]["status"], "in_progress");
    }
}

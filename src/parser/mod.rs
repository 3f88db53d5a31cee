//! Syslog-style line parsing into structured records.

mod syslog;

pub use syslog::{parse_line, parse_lines};

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// One parsed log line. Only `process` and `message` feed the model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogRecord {
    /// Literal timestamp text, e.g. `Sep 02 21:41:00`
    pub timestamp: String,
    pub hostname: String,
    pub process: String,
    /// `None` when the digit run does not fit a `u64`; the line still parses
    pub pid: Option<u64>,
    /// Trailing payload, trimmed
    pub message: String,
}

impl LogRecord {
    /// Typed timestamp for the given year. Syslog omits the year, so the caller supplies it.
    /// Returns `None` for dates that do not exist (e.g. `Feb 30`) or unexpected shapes.
    pub fn timestamp_in_year(&self, year: i32) -> Option<NaiveDateTime> {
        let normalized = self.timestamp.split_whitespace().collect::<Vec<_>>().join(" ");
        NaiveDateTime::parse_from_str(&format!("{} {}", year, normalized), "%Y %b %d %H:%M:%S").ok()
    }
}

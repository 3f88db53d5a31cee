//! `<timestamp> <host> <process>[<pid>]: <message>` grammar.

use super::LogRecord;
use regex::Regex;
use std::sync::OnceLock;

static SYSLOG_PATTERN: OnceLock<Regex> = OnceLock::new();

fn pattern() -> &'static Regex {
    SYSLOG_PATTERN.get_or_init(|| {
        Regex::new(r"^(\w+\s+\d+\s+\d{2}:\d{2}:\d{2})\s+([\w-]+)\s+(\w+)\[(\d+)\]:\s+(.*)")
            .expect("syslog pattern compiles")
    })
}

/// Parse one line. Lines that do not match the grammar yield `None`; callers skip them.
pub fn parse_line(line: &str) -> Option<LogRecord> {
    let caps = pattern().captures(line)?;
    Some(LogRecord {
        timestamp: caps[1].to_string(),
        hostname: caps[2].to_string(),
        process: caps[3].to_string(),
        pid: caps[4].parse::<u64>().ok(),
        message: caps[5].trim().to_string(),
    })
}

/// Parse every line, dropping the ones that fail. Returns the records and the number skipped.
pub fn parse_lines<'a, I>(lines: I) -> (Vec<LogRecord>, usize)
where
    I: IntoIterator<Item = &'a str>,
{
    let mut records = Vec::new();
    let mut skipped = 0usize;
    for line in lines {
        match parse_line(line) {
            Some(r) => records.push(r),
            None => skipped += 1,
        }
    }
    (records, skipped)
}

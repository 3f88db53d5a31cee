//! Line streams (stdin, a tailed file): one ndjson verdict per complete line.

use super::Detector;
use crate::logging::{StructuredLogger, VerdictLine};
use std::borrow::Cow;
use std::io::{self, BufRead, Write};
use tracing::warn;

/// Counters for one stream
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StreamSummary {
    pub lines: usize,
    /// Lines that parsed and went through the model
    pub scored: usize,
    pub anomalous: usize,
    /// Lines whose scoring call failed (e.g. embedder down); no verdict written
    pub failed: usize,
    /// Lines with invalid UTF-8, scored after replacement
    pub lossy: usize,
}

/// Strip the line terminator and decode. Invalid UTF-8 becomes U+FFFD.
pub fn decode_line(raw: &[u8]) -> Cow<'_, str> {
    let raw = raw.strip_suffix(b"\n").unwrap_or(raw);
    let raw = raw.strip_suffix(b"\r").unwrap_or(raw);
    String::from_utf8_lossy(raw)
}

impl Detector {
    /// Score one raw line and write its verdict. A failed scoring call is logged and counted;
    /// only write errors are returned.
    pub fn score_raw_line(
        &self,
        raw: &[u8],
        out: &mut impl Write,
        summary: &mut StreamSummary,
    ) -> io::Result<()> {
        summary.lines += 1;
        let line = decode_line(raw);
        if let Cow::Owned(_) = line {
            summary.lossy += 1;
            warn!(line_no = summary.lines, "invalid UTF-8 replaced before scoring");
        }

        match self.score(&line) {
            Ok(event) => {
                if event.is_parsed() {
                    summary.scored += 1;
                }
                if event.is_anomalous() {
                    summary.anomalous += 1;
                }
                StructuredLogger::emit_json(&VerdictLine::from(&event), out)?;
                out.flush()
            }
            Err(e) => {
                summary.failed += 1;
                warn!(line_no = summary.lines, error = %e, "line not scored");
                Ok(())
            }
        }
    }

    /// Score every line of `reader` until EOF. A final line without a newline is scored too.
    pub fn score_stream<R: BufRead, W: Write>(
        &self,
        mut reader: R,
        out: &mut W,
    ) -> io::Result<StreamSummary> {
        let mut summary = StreamSummary::default();
        let mut buf = Vec::new();
        loop {
            buf.clear();
            if reader.read_until(b'\n', &mut buf)? == 0 {
                break;
            }
            self.score_raw_line(&buf, out, &mut summary)?;
        }
        Ok(summary)
    }
}

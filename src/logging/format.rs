//! Diagnostics go through `tracing` to stderr; verdicts are ndjson on stdout for ingestion.

use crate::detector::ScoredEvent;
use serde::Serialize;
use std::io::Write;
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

/// Flat ndjson shape of a [`ScoredEvent`]
#[derive(Serialize)]
pub struct VerdictLine<'a> {
    pub ts: i64,
    pub event_id: &'a str,
    pub label: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub score: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub host: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub process: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<&'a str>,
    pub bundle_id: String,
}

impl<'a> From<&'a ScoredEvent> for VerdictLine<'a> {
    fn from(e: &'a ScoredEvent) -> Self {
        let record = e.record.as_ref();
        Self {
            ts: e.ts,
            event_id: &e.id,
            label: e.label.as_str(),
            score: e.score,
            host: record.map(|r| r.hostname.as_str()),
            process: record.map(|r| r.process.as_str()),
            message: record.map(|r| r.message.as_str()),
            bundle_id: e.bundle_id.to_string(),
        }
    }
}

pub struct StructuredLogger;

impl StructuredLogger {
    /// Install global subscriber on stderr; level from RUST_LOG or `default_level`.
    pub fn init(json: bool, default_level: &str) {
        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
        if json {
            let fmt = tracing_subscriber::fmt::layer()
                .json()
                .with_span_events(FmtSpan::NONE)
                .with_writer(std::io::stderr);
            tracing_subscriber::registry()
                .with(filter)
                .with(fmt)
                .init();
        } else {
            tracing_subscriber::registry()
                .with(filter)
                .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
                .init();
        }
    }

    /// Emit a single ndjson line without going through tracing
    pub fn emit_json(event: &impl Serialize, w: &mut impl Write) -> std::io::Result<()> {
        let line = serde_json::to_string(event)?;
        writeln!(w, "{}", line)
    }
}

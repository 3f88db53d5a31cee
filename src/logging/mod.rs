//! Structured logging setup and verdict output.

mod format;

pub use format::{StructuredLogger, VerdictLine};

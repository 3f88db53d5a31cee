//! Line-at-a-time anomaly scoring against a fitted bundle.

mod engine;
mod stream;
mod verdict;

pub use engine::Detector;
pub use stream::{decode_line, StreamSummary};
pub use verdict::{Label, ScoredEvent};

//! Log Sentinel: anomaly detection for syslog-style lines.
//!
//! Modular structure:
//! - [`parser`]: Syslog grammar → [`LogRecord`]
//! - [`features`]: Structural, embedding and process-indicator features
//! - [`schema`]: Frozen column schema and frame reconciliation
//! - [`model`]: Scaler, isolation forest and the fitted bundle
//! - [`storage`]: Atomic artifact store
//! - [`training`]: Corpus → bundle
//! - [`detector`]: Line → verdict
//! - [`logging`]: Structured logging

pub mod config;
pub mod detector;
pub mod error;
pub mod features;
pub mod logging;
pub mod model;
pub mod parser;
pub mod schema;
pub mod storage;
pub mod training;

pub use config::SentinelConfig;
pub use detector::{Detector, Label, ScoredEvent};
pub use error::{EmbeddingError, Result, SentinelError};
pub use features::{Embedder, FeatureExtractor, FeatureFrame, HashingEmbedder};
pub use logging::StructuredLogger;
pub use model::ModelBundle;
pub use parser::LogRecord;
pub use schema::ColumnSchema;
pub use storage::ArtifactStore;
pub use training::Trainer;

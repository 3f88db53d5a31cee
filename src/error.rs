//! Error types for training, artifact loading and scoring.

use thiserror::Error;

/// Failures reported by an embedding backend.
#[derive(Error, Debug)]
pub enum EmbeddingError {
    /// Backend could not be reached or initialised
    #[error("embedding backend unavailable: {0}")]
    Unavailable(String),

    /// Backend returned a matrix of the wrong shape
    #[error("embedding shape mismatch: expected {expected_rows}x{expected_dim}, got {rows}x{dim}")]
    Shape {
        expected_rows: usize,
        expected_dim: usize,
        rows: usize,
        dim: usize,
    },
}

#[derive(Error, Debug)]
pub enum SentinelError {
    /// No line of the training corpus matched the log grammar
    #[error("training corpus contains no parsable lines")]
    EmptyCorpus,

    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    /// Model, scaler or column schema could not be found
    #[error("artifact missing: {0}")]
    ArtifactMissing(String),

    /// Artifacts were found but disagree with each other
    #[error("artifacts inconsistent: {0}")]
    ArtifactInconsistent(String),

    /// A vector reached the scaler or model with the wrong width.
    /// The schema reconciler should make this unreachable.
    #[error("schema mismatch: expected {expected} columns, got {got}")]
    SchemaMismatch { expected: usize, got: usize },

    #[error(transparent)]
    Embedding(#[from] EmbeddingError),

    #[error("artifact store error: {0}")]
    Storage(#[from] rusqlite::Error),

    #[error("artifact codec error: {0}")]
    Codec(#[from] serde_json::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, SentinelError>;

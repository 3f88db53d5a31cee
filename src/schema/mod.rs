//! Frozen column schema captured at training time.

mod reconcile;

pub use reconcile::reconcile;

use crate::error::{Result, SentinelError};
use crate::features::FeatureFrame;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashSet;

/// Ordered column names a fitted model expects. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<String>", into = "Vec<String>")]
pub struct ColumnSchema {
    columns: Vec<String>,
}

impl ColumnSchema {
    pub fn new(columns: Vec<String>) -> Result<Self> {
        if columns.is_empty() {
            return Err(SentinelError::InvalidParameter(
                "column schema cannot be empty".to_string(),
            ));
        }
        let mut seen = HashSet::with_capacity(columns.len());
        if let Some(dup) = columns.iter().find(|c| !seen.insert(c.as_str())) {
            return Err(SentinelError::InvalidParameter(format!(
                "duplicate column {:?} in schema",
                dup
            )));
        }
        Ok(Self { columns })
    }

    /// Capture the columns of a training frame
    pub fn from_frame(frame: &FeatureFrame) -> Result<Self> {
        Self::new(frame.columns().to_vec())
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    pub fn position(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    /// Number of embedding columns (named by their dimension index)
    pub fn embedding_dims(&self) -> usize {
        self.columns
            .iter()
            .filter(|c| c.parse::<usize>().is_ok())
            .count()
    }

    /// SHA-256 over the ordered names; equal fingerprints mean equal schemas.
    pub fn fingerprint(&self) -> String {
        let mut h = Sha256::new();
        for name in &self.columns {
            h.update(name.as_bytes());
            h.update([0u8]);
        }
        format!("{:x}", h.finalize())
    }

    /// Force `frame` into this schema's columns. See [`reconcile`].
    pub fn reconcile(&self, frame: &FeatureFrame) -> FeatureFrame {
        reconcile(frame, self)
    }
}

impl TryFrom<Vec<String>> for ColumnSchema {
    type Error = SentinelError;

    fn try_from(columns: Vec<String>) -> Result<Self> {
        Self::new(columns)
    }
}

impl From<ColumnSchema> for Vec<String> {
    fn from(schema: ColumnSchema) -> Self {
        schema.columns
    }
}

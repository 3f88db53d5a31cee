//! Feature extraction from parsed log records.
//!
//! Three column groups, always concatenated in this order:
//! - structural: `msg_length`, `special_chars`
//! - semantic: one column per embedding dimension, named by its index
//! - categorical: one indicator per process seen in the batch, named `proc_<process>`

mod embedding;
mod pipeline;
mod structural;

pub use embedding::{Embedder, EmbeddingSpec, HashingEmbedder, HASHING_EMBEDDER};
pub use pipeline::FeatureExtractor;
pub use structural::{StructuralStats, MSG_LENGTH, SPECIAL_CHARS};

use crate::error::{Result, SentinelError};
use ndarray::{Array2, ArrayView1};

/// Prefix for categorical process columns
pub const PROCESS_PREFIX: &str = "proc_";

/// Named columns over one or more rows. Column order is significant.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureFrame {
    columns: Vec<String>,
    values: Array2<f64>,
}

impl FeatureFrame {
    pub fn new(columns: Vec<String>, values: Array2<f64>) -> Result<Self> {
        if columns.len() != values.ncols() {
            return Err(SentinelError::SchemaMismatch {
                expected: columns.len(),
                got: values.ncols(),
            });
        }
        Ok(Self { columns, values })
    }

    /// Caller guarantees `columns.len() == values.ncols()`
    pub(crate) fn aligned(columns: Vec<String>, values: Array2<f64>) -> Self {
        debug_assert_eq!(columns.len(), values.ncols());
        Self { columns, values }
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn values(&self) -> &Array2<f64> {
        &self.values
    }

    pub fn into_values(self) -> Array2<f64> {
        self.values
    }

    pub fn n_rows(&self) -> usize {
        self.values.nrows()
    }

    pub fn n_cols(&self) -> usize {
        self.columns.len()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    /// Row `i` as a named vector. Panics if `i` is out of bounds.
    pub fn vector(&self, i: usize) -> FeatureVector<'_> {
        FeatureVector {
            columns: &self.columns,
            values: self.values.row(i),
        }
    }
}

/// One row of a [`FeatureFrame`], fields in frame column order.
#[derive(Debug, Clone)]
pub struct FeatureVector<'a> {
    columns: &'a [String],
    values: ArrayView1<'a, f64>,
}

impl<'a> FeatureVector<'a> {
    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    pub fn get(&self, name: &str) -> Option<f64> {
        self.columns
            .iter()
            .position(|c| c == name)
            .map(|i| self.values[i])
    }

    pub fn iter(&self) -> impl Iterator<Item = (&'a str, f64)> + '_ {
        self.columns
            .iter()
            .map(String::as_str)
            .zip(self.values.iter().copied())
    }
}

/// Column name for a process indicator
pub fn process_column(process: &str) -> String {
    format!("{}{}", PROCESS_PREFIX, process)
}

//! Feature extraction pipeline: records → structural + embedding + process indicators → frame.

use super::{process_column, Embedder, FeatureFrame, StructuralStats, MSG_LENGTH, SPECIAL_CHARS};
use crate::error::{EmbeddingError, Result, SentinelError};
use crate::parser::LogRecord;
use ndarray::{s, Array2};
use std::collections::BTreeSet;
use std::sync::Arc;

/// Turns a batch of records into a [`FeatureFrame`]. The categorical vocabulary is whatever the
/// batch contains, so the output is not aligned to any model until reconciled.
#[derive(Clone)]
pub struct FeatureExtractor {
    embedder: Arc<dyn Embedder>,
}

impl FeatureExtractor {
    pub fn new(embedder: Arc<dyn Embedder>) -> Self {
        Self { embedder }
    }

    pub fn embedder(&self) -> &Arc<dyn Embedder> {
        &self.embedder
    }

    /// Extract one row per record. The embedder is called once for the whole batch.
    pub fn extract(&self, records: &[LogRecord]) -> Result<FeatureFrame> {
        if records.is_empty() {
            return Err(SentinelError::InvalidParameter(
                "feature extraction needs at least one record".to_string(),
            ));
        }

        let messages: Vec<&str> = records.iter().map(|r| r.message.as_str()).collect();
        let embeddings = self.embedder.embed(&messages)?;
        let dim = self.embedder.dim();
        if embeddings.dim() != (records.len(), dim) {
            return Err(EmbeddingError::Shape {
                expected_rows: records.len(),
                expected_dim: dim,
                rows: embeddings.nrows(),
                dim: embeddings.ncols(),
            }
            .into());
        }

        let processes: BTreeSet<&str> = records.iter().map(|r| r.process.as_str()).collect();
        let processes: Vec<&str> = processes.into_iter().collect();

        let mut columns = Vec::with_capacity(2 + dim + processes.len());
        columns.push(MSG_LENGTH.to_string());
        columns.push(SPECIAL_CHARS.to_string());
        columns.extend((0..dim).map(|i| i.to_string()));
        columns.extend(processes.iter().map(|p| process_column(p)));

        let mut values = Array2::<f64>::zeros((records.len(), columns.len()));
        for (i, record) in records.iter().enumerate() {
            let [len, special] = StructuralStats::from_message(&record.message).to_vector();
            values[[i, 0]] = len;
            values[[i, 1]] = special;
            // binary_search: `processes` came out of a BTreeSet, so it is sorted
            if let Ok(p) = processes.binary_search(&record.process.as_str()) {
                values[[i, 2 + dim + p]] = 1.0;
            }
        }
        values
            .slice_mut(s![.., 2..2 + dim])
            .assign(&embeddings);

        FeatureFrame::new(columns, values)
    }
}

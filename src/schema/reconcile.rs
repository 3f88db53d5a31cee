//! Alignment of freshly extracted frames to a frozen [`ColumnSchema`].

use super::ColumnSchema;
use crate::features::FeatureFrame;
use ndarray::Array2;
use std::collections::HashMap;

/// Returns a frame with exactly `schema`'s columns, in `schema`'s order, for every row of `frame`.
/// Schema columns missing from `frame` are zero-filled; columns unknown to `schema` are dropped.
/// Callers handle the no-record case before getting here.
pub fn reconcile(frame: &FeatureFrame, schema: &ColumnSchema) -> FeatureFrame {
    if frame.columns() == schema.columns() {
        return frame.clone();
    }

    let index: HashMap<&str, usize> = frame
        .columns()
        .iter()
        .enumerate()
        .map(|(i, c)| (c.as_str(), i))
        .collect();

    let src = frame.values();
    let mut out = Array2::<f64>::zeros((frame.n_rows(), schema.len()));
    let mut matched = 0usize;
    for (j, name) in schema.columns().iter().enumerate() {
        if let Some(&i) = index.get(name.as_str()) {
            out.column_mut(j).assign(&src.column(i));
            matched += 1;
        }
    }

    tracing::trace!(
        dropped = frame.n_cols() - matched,
        zero_filled = schema.len() - matched,
        rows = frame.n_rows(),
        "frame reconciled"
    );

    FeatureFrame::aligned(schema.columns().to_vec(), out)
}

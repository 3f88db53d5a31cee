//! Per-column standardisation with parameters frozen at fit time.

use crate::error::{Result, SentinelError};
use ndarray::{Array1, Array2, ArrayView2, Axis};
use serde::{Deserialize, Serialize};

/// Below this a column is treated as constant and left unscaled
const MIN_SCALE: f64 = 10.0 * f64::EPSILON;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScalerState {
    means: Array1<f64>,
    scales: Array1<f64>,
}

impl ScalerState {
    /// Fit column means and population standard deviations. Constant columns get scale 1.
    pub fn fit(data: ArrayView2<'_, f64>) -> Result<Self> {
        if data.nrows() == 0 || data.ncols() == 0 {
            return Err(SentinelError::InvalidParameter(format!(
                "cannot fit scaler on a {}x{} matrix",
                data.nrows(),
                data.ncols()
            )));
        }
        let means = data
            .mean_axis(Axis(0))
            .ok_or_else(|| SentinelError::InvalidParameter("empty matrix".to_string()))?;
        let scales = data
            .std_axis(Axis(0), 0.0)
            .mapv(|s| if s.is_finite() && s >= MIN_SCALE { s } else { 1.0 });
        Ok(Self { means, scales })
    }

    pub fn n_features(&self) -> usize {
        self.means.len()
    }

    pub fn means(&self) -> &Array1<f64> {
        &self.means
    }

    pub fn scales(&self) -> &Array1<f64> {
        &self.scales
    }

    /// `(x - mean) / scale` per column. The input must already be aligned to the fitted columns.
    pub fn transform(&self, data: ArrayView2<'_, f64>) -> Result<Array2<f64>> {
        if data.ncols() != self.n_features() {
            tracing::error!(
                expected = self.n_features(),
                got = data.ncols(),
                "unaligned matrix reached the scaler"
            );
            return Err(SentinelError::SchemaMismatch {
                expected: self.n_features(),
                got: data.ncols(),
            });
        }
        let mut out = data.to_owned();
        for mut row in out.rows_mut() {
            row -= &self.means;
            row /= &self.scales;
        }
        Ok(out)
    }
}

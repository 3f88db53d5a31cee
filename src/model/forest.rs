//! Isolation forest: an ensemble of random partitioning trees.
//!
//! Points that random axis-aligned splits separate quickly (short average path) are anomalous.
//! Scores follow the usual convention `-2^(-E[h(x)] / c(psi))`, so they lie in `[-1, 0]` and
//! higher means more normal. The decision threshold is the `contamination` quantile of the
//! training scores.

use crate::config::TrainingConfig;
use crate::error::{Result, SentinelError};
use ndarray::{ArrayView1, ArrayView2};
use rand::rngs::StdRng;
use rand::seq::index::sample;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

const EULER_GAMMA: f64 = 0.577_215_664_901_532_9;

/// Fit-time parameters
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ForestParams {
    pub n_estimators: usize,
    pub contamination: f64,
    pub max_samples: usize,
    pub seed: u64,
}

impl Default for ForestParams {
    fn default() -> Self {
        Self::from(&TrainingConfig::default())
    }
}

impl From<&TrainingConfig> for ForestParams {
    fn from(c: &TrainingConfig) -> Self {
        Self {
            n_estimators: c.n_estimators,
            contamination: c.contamination,
            max_samples: c.max_samples,
            seed: c.seed,
        }
    }
}

impl ForestParams {
    pub fn validate(&self) -> Result<()> {
        if self.n_estimators == 0 {
            return Err(SentinelError::InvalidParameter(
                "n_estimators must be at least 1".to_string(),
            ));
        }
        if !(self.contamination > 0.0 && self.contamination <= 0.5) {
            return Err(SentinelError::InvalidParameter(format!(
                "contamination must be in (0, 0.5], got {}",
                self.contamination
            )));
        }
        if self.max_samples < 2 {
            return Err(SentinelError::InvalidParameter(
                "max_samples must be at least 2".to_string(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "node", rename_all = "snake_case")]
enum Node {
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
    },
    Leaf {
        size: usize,
    },
}

/// One tree, nodes stored flat with the root at index 0
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct IsolationTree {
    nodes: Vec<Node>,
}

impl IsolationTree {
    fn build(data: ArrayView2<'_, f64>, rows: &mut [usize], max_depth: usize, rng: &mut StdRng) -> Self {
        let mut tree = IsolationTree { nodes: Vec::new() };
        tree.grow(data, rows, 0, max_depth, rng);
        tree
    }

    fn grow(
        &mut self,
        data: ArrayView2<'_, f64>,
        rows: &mut [usize],
        depth: usize,
        max_depth: usize,
        rng: &mut StdRng,
    ) -> usize {
        let id = self.nodes.len();
        self.nodes.push(Node::Leaf { size: rows.len() });
        if depth >= max_depth || rows.len() <= 1 {
            return id;
        }

        // Only features that still vary inside this node can split it
        let mut candidates: Vec<(usize, f64, f64)> = Vec::new();
        for f in 0..data.ncols() {
            let mut lo = f64::INFINITY;
            let mut hi = f64::NEG_INFINITY;
            for &r in rows.iter() {
                let v = data[[r, f]];
                lo = lo.min(v);
                hi = hi.max(v);
            }
            if hi > lo {
                candidates.push((f, lo, hi));
            }
        }
        if candidates.is_empty() {
            return id;
        }

        let (feature, lo, hi) = candidates[rng.gen_range(0..candidates.len())];
        let mut threshold = rng.gen_range(lo..hi);
        if threshold >= hi {
            threshold = lo;
        }

        // Partition in place: rows with value <= threshold go left
        let mut split = 0;
        for i in 0..rows.len() {
            if data[[rows[i], feature]] <= threshold {
                rows.swap(i, split);
                split += 1;
            }
        }
        let (left_rows, right_rows) = rows.split_at_mut(split);
        let left = self.grow(data, left_rows, depth + 1, max_depth, rng);
        let right = self.grow(data, right_rows, depth + 1, max_depth, rng);
        self.nodes[id] = Node::Split {
            feature,
            threshold,
            left,
            right,
        };
        id
    }

    fn path_length(&self, x: ArrayView1<'_, f64>) -> f64 {
        let mut id = 0;
        let mut depth = 0usize;
        loop {
            match &self.nodes[id] {
                Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    id = if x[*feature] <= *threshold { *left } else { *right };
                    depth += 1;
                }
                Node::Leaf { size } => return depth as f64 + average_path_length(*size),
            }
        }
    }
}

/// Expected path length of an unsuccessful BST search over `n` points
fn average_path_length(n: usize) -> f64 {
    match n {
        0 | 1 => 0.0,
        2 => 1.0,
        _ => {
            let n = n as f64;
            2.0 * ((n - 1.0).ln() + EULER_GAMMA) - 2.0 * (n - 1.0) / n
        }
    }
}

/// Linear-interpolated quantile, `q` in [0, 1]
fn quantile(values: &[f64], q: f64) -> f64 {
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));
    let pos = q * (sorted.len() - 1) as f64;
    let lo = pos.floor() as usize;
    let hi = pos.ceil() as usize;
    sorted[lo] + (sorted[hi] - sorted[lo]) * (pos - lo as f64)
}

/// Fitted ensemble. Immutable; safe to share across threads.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IsolationForest {
    params: ForestParams,
    n_features: usize,
    subsample_size: usize,
    threshold: f64,
    trees: Vec<IsolationTree>,
}

impl IsolationForest {
    /// Fit on a scaled matrix. Returns the forest and the score of every training row.
    pub fn fit(params: ForestParams, data: ArrayView2<'_, f64>) -> Result<(Self, Vec<f64>)> {
        params.validate()?;
        let n = data.nrows();
        if n == 0 || data.ncols() == 0 {
            return Err(SentinelError::InvalidParameter(format!(
                "cannot fit isolation forest on a {}x{} matrix",
                n,
                data.ncols()
            )));
        }

        let subsample_size = params.max_samples.min(n);
        let max_depth = (subsample_size.max(2) as f64).log2().ceil() as usize;

        // Seeds are drawn sequentially so parallel construction matches a sequential build
        let mut master = StdRng::seed_from_u64(params.seed);
        let seeds: Vec<u64> = (0..params.n_estimators).map(|_| master.gen()).collect();

        let trees: Vec<IsolationTree> = seeds
            .into_par_iter()
            .map(|seed| {
                let mut rng = StdRng::seed_from_u64(seed);
                let mut rows = sample(&mut rng, n, subsample_size).into_vec();
                IsolationTree::build(data, &mut rows, max_depth, &mut rng)
            })
            .collect();

        let mut forest = Self {
            params,
            n_features: data.ncols(),
            subsample_size,
            threshold: 0.0,
            trees,
        };
        let scores = forest.score_rows(data)?;
        forest.threshold = quantile(&scores, params.contamination);

        tracing::debug!(
            trees = forest.trees.len(),
            subsample_size,
            max_depth,
            threshold = forest.threshold,
            "isolation forest fitted"
        );
        Ok((forest, scores))
    }

    pub fn params(&self) -> &ForestParams {
        &self.params
    }

    pub fn n_features(&self) -> usize {
        self.n_features
    }

    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }

    /// Scores below this are anomalous
    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    pub fn is_anomalous(&self, score: f64) -> bool {
        score < self.threshold
    }

    /// Score one aligned, scaled row. Higher is more normal.
    pub fn score(&self, x: ArrayView1<'_, f64>) -> Result<f64> {
        if x.len() != self.n_features {
            tracing::error!(
                expected = self.n_features,
                got = x.len(),
                "unaligned vector reached the model"
            );
            return Err(SentinelError::SchemaMismatch {
                expected: self.n_features,
                got: x.len(),
            });
        }
        let mean_path = self.trees.iter().map(|t| t.path_length(x)).sum::<f64>()
            / self.trees.len() as f64;
        let c = average_path_length(self.subsample_size);
        if c == 0.0 {
            return Ok(-1.0);
        }
        Ok(-(2f64).powf(-mean_path / c))
    }

    pub fn score_rows(&self, data: ArrayView2<'_, f64>) -> Result<Vec<f64>> {
        (0..data.nrows())
            .into_par_iter()
            .map(|i| self.score(data.row(i)))
            .collect()
    }
}

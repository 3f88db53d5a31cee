//! Linear training run:
//! LOAD_CORPUS → PARSE → EXTRACT_FEATURES → FIT_SCALER → APPLY_SCALER → FIT_MODEL → EMIT_ARTIFACTS.

use crate::config::TrainingConfig;
use crate::detector::Label;
use crate::error::{Result, SentinelError};
use crate::features::{Embedder, FeatureExtractor};
use crate::model::{ForestParams, IsolationForest, ModelBundle, ScalerState};
use crate::parser::parse_lines;
use crate::schema::ColumnSchema;
use crate::storage::ArtifactStore;
use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use std::time::Instant;
use tracing::info;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TrainingStage {
    LoadCorpus,
    Parse,
    ExtractFeatures,
    FitScaler,
    ApplyScaler,
    FitModel,
    EmitArtifacts,
}

impl fmt::Display for TrainingStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TrainingStage::LoadCorpus => "LOAD_CORPUS",
            TrainingStage::Parse => "PARSE",
            TrainingStage::ExtractFeatures => "EXTRACT_FEATURES",
            TrainingStage::FitScaler => "FIT_SCALER",
            TrainingStage::ApplyScaler => "APPLY_SCALER",
            TrainingStage::FitModel => "FIT_MODEL",
            TrainingStage::EmitArtifacts => "EMIT_ARTIFACTS",
        };
        f.write_str(s)
    }
}

/// Summary of a training run
#[derive(Debug, Clone, Serialize)]
pub struct TrainingReport {
    pub lines_read: usize,
    pub records: usize,
    pub skipped: usize,
    pub n_columns: usize,
    pub threshold: f64,
    pub flagged: usize,
}

/// A fitted bundle plus the per-record training scores, in corpus order (unparsable lines removed)
#[derive(Debug, Clone)]
pub struct TrainingOutcome {
    pub bundle: ModelBundle,
    pub report: TrainingReport,
    pub scores: Vec<f64>,
}

impl TrainingOutcome {
    pub fn labels(&self) -> Vec<Label> {
        let threshold = self.bundle.forest().threshold();
        self.scores
            .iter()
            .map(|s| Label::from_score(*s, threshold))
            .collect()
    }
}

pub struct Trainer {
    config: TrainingConfig,
    extractor: FeatureExtractor,
}

impl Trainer {
    pub fn new(config: TrainingConfig, embedder: Arc<dyn Embedder>) -> Self {
        Self {
            config,
            extractor: FeatureExtractor::new(embedder),
        }
    }

    pub fn config(&self) -> &TrainingConfig {
        &self.config
    }

    /// Full run over the configured corpus, persisting the result to `store`
    pub fn run(&self, store: &ArtifactStore) -> Result<TrainingOutcome> {
        let started = Instant::now();
        let stage = TrainingStage::LoadCorpus;
        let corpus = std::fs::read_to_string(&self.config.corpus_path)?;
        info!(%stage, path = %self.config.corpus_path.display(), bytes = corpus.len(), "corpus loaded");

        let outcome = self.fit_lines(corpus.lines())?;

        let stage = TrainingStage::EmitArtifacts;
        store.save(&outcome.bundle)?;
        info!(
            %stage,
            bundle_id = %outcome.bundle.id(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "training complete"
        );
        Ok(outcome)
    }

    /// PARSE through FIT_MODEL over in-memory lines. Nothing is persisted.
    pub fn fit_lines<'a, I>(&self, lines: I) -> Result<TrainingOutcome>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let params = ForestParams::from(&self.config);
        params.validate()?;

        let stage = TrainingStage::Parse;
        let mut lines_read = 0usize;
        let (records, skipped) = parse_lines(lines.into_iter().inspect(|_| lines_read += 1));
        info!(%stage, lines_read, records = records.len(), skipped, "corpus parsed");
        if records.is_empty() {
            return Err(SentinelError::EmptyCorpus);
        }

        let stage = TrainingStage::ExtractFeatures;
        let frame = self.extractor.extract(&records)?;
        let schema = ColumnSchema::from_frame(&frame)?;
        info!(%stage, rows = frame.n_rows(), columns = schema.len(), "features extracted");

        let stage = TrainingStage::FitScaler;
        let scaler = ScalerState::fit(frame.values().view())?;
        info!(%stage, columns = scaler.n_features(), "scaler fitted");

        let stage = TrainingStage::ApplyScaler;
        let scaled = scaler.transform(frame.values().view())?;
        info!(%stage, "features scaled");

        let stage = TrainingStage::FitModel;
        let (forest, scores) = IsolationForest::fit(params, scaled.view())?;
        let flagged = scores.iter().filter(|s| forest.is_anomalous(**s)).count();
        info!(
            %stage,
            trees = forest.n_trees(),
            threshold = forest.threshold(),
            flagged,
            "model fitted"
        );

        let report = TrainingReport {
            lines_read,
            records: records.len(),
            skipped,
            n_columns: schema.len(),
            threshold: forest.threshold(),
            flagged,
        };
        let bundle = ModelBundle::new(schema, scaler, forest, self.extractor.embedder().spec())?;
        Ok(TrainingOutcome {
            bundle,
            report,
            scores,
        })
    }
}

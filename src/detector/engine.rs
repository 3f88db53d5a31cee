//! Inference path: parse → extract → reconcile → scale → score.

use super::{Label, ScoredEvent};
use crate::error::{Result, SentinelError};
use crate::features::{Embedder, FeatureExtractor, HashingEmbedder};
use crate::model::ModelBundle;
use crate::parser::{parse_line, LogRecord};
use crate::storage::ArtifactStore;
use std::sync::Arc;
use tracing::{debug, warn};

/// Scores lines against one loaded bundle. Holds no mutable state, so one `Detector` can serve
/// concurrent callers.
#[derive(Clone)]
pub struct Detector {
    bundle: Arc<ModelBundle>,
    extractor: FeatureExtractor,
}

impl std::fmt::Debug for Detector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Detector")
            .field("bundle_id", &self.bundle.id())
            .field("columns", &self.bundle.schema().len())
            .field("embedding", self.bundle.embedding())
            .finish()
    }
}

impl Detector {
    /// Pair a bundle with the embedder it was trained with
    pub fn new(bundle: Arc<ModelBundle>, embedder: Arc<dyn Embedder>) -> Result<Self> {
        let expected = bundle.embedding();
        let actual = embedder.spec();
        if actual != *expected {
            return Err(SentinelError::ArtifactInconsistent(format!(
                "bundle was trained with embedder {:?} ({} dims), got {:?} ({} dims)",
                expected.name, expected.dim, actual.name, actual.dim
            )));
        }
        Ok(Self {
            bundle,
            extractor: FeatureExtractor::new(embedder),
        })
    }

    /// Rebuild the built-in embedder recorded in the bundle
    pub fn with_builtin_embedder(bundle: Arc<ModelBundle>) -> Result<Self> {
        let embedder = HashingEmbedder::from_spec(bundle.embedding()).map_err(|e| {
            SentinelError::ArtifactInconsistent(format!("cannot rebuild embedder: {}", e))
        })?;
        Self::new(bundle, Arc::new(embedder))
    }

    /// Load the current bundle; any missing or inconsistent artifact is an error
    pub fn from_store(store: &ArtifactStore) -> Result<Self> {
        Self::with_builtin_embedder(Arc::new(store.load_current()?))
    }

    pub fn bundle(&self) -> &Arc<ModelBundle> {
        &self.bundle
    }

    /// Score one raw line. Unparsable lines yield the normal, unscored sentinel.
    pub fn score(&self, line: &str) -> Result<ScoredEvent> {
        match parse_line(line) {
            Some(record) => self.score_record(record),
            None => {
                debug!(line, "unparsable line treated as normal");
                Ok(ScoredEvent::unparsed(self.bundle.id()))
            }
        }
    }

    pub fn score_record(&self, record: LogRecord) -> Result<ScoredEvent> {
        let scores = self.score_records(std::slice::from_ref(&record))?;
        Ok(self.verdict(record, scores[0]))
    }

    /// Score many lines with one embedding call; output order matches input order
    pub fn score_batch<'a, I>(&self, lines: I) -> Result<Vec<ScoredEvent>>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let parsed: Vec<Option<LogRecord>> = lines.into_iter().map(parse_line).collect();
        let records: Vec<LogRecord> = parsed.iter().flatten().cloned().collect();
        let scores = if records.is_empty() {
            Vec::new()
        } else {
            self.score_records(&records)?
        };
        let mut scores = scores.into_iter();

        Ok(parsed
            .into_iter()
            .map(|p| match (p, scores.next()) {
                (Some(record), Some(score)) => self.verdict(record, score),
                _ => ScoredEvent::unparsed(self.bundle.id()),
            })
            .collect())
    }

    fn score_records(&self, records: &[LogRecord]) -> Result<Vec<f64>> {
        let frame = self.extractor.extract(records)?;
        let aligned = self.bundle.schema().reconcile(&frame);
        let scaled = self.bundle.scaler().transform(aligned.values().view())?;
        self.bundle.forest().score_rows(scaled.view())
    }

    fn verdict(&self, record: LogRecord, score: f64) -> ScoredEvent {
        let forest = self.bundle.forest();
        let event = ScoredEvent::scored(record, score, forest.threshold(), self.bundle.id());
        if event.label == Label::Anomalous {
            if let Some(r) = &event.record {
                warn!(
                    event_id = %event.id,
                    host = %r.hostname,
                    process = %r.process,
                    score,
                    threshold = forest.threshold(),
                    "anomalous log line"
                );
            }
        }
        event
    }
}

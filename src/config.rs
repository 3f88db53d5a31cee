//! Sentinel configuration. Every section falls back to defaults when absent.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SentinelConfig {
    /// Corpus and isolation forest parameters
    pub training: TrainingConfig,
    /// Built-in embedder parameters
    pub embedding: EmbeddingConfig,
    /// Where fitted bundles live
    pub artifacts: ArtifactsConfig,
    /// Logging
    pub log: LogConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainingConfig {
    /// Line-oriented corpus of normal traffic
    pub corpus_path: PathBuf,
    /// Ensemble size
    pub n_estimators: usize,
    /// Expected fraction of anomalous rows in the corpus, in (0, 0.5]
    pub contamination: f64,
    /// Rows drawn per tree (capped at corpus size)
    pub max_samples: usize,
    /// Seed for subsampling and split selection
    pub seed: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingConfig {
    /// Number of embedding columns
    pub dim: usize,
    /// Character n-gram width hashed alongside whole words (0 disables)
    pub char_ngram: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ArtifactsConfig {
    /// SQLite file holding model, scaler and column schema
    pub store_path: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    pub level: String,
    pub json: bool,
}

impl Default for SentinelConfig {
    fn default() -> Self {
        Self {
            training: TrainingConfig::default(),
            embedding: EmbeddingConfig::default(),
            artifacts: ArtifactsConfig::default(),
            log: LogConfig::default(),
        }
    }
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            corpus_path: PathBuf::from("data/normal_traffic.log"),
            n_estimators: 100,
            contamination: 0.01,
            max_samples: 256,
            seed: 42,
        }
    }
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            dim: 128,
            char_ngram: 3,
        }
    }
}

impl Default for ArtifactsConfig {
    fn default() -> Self {
        let base = dirs::data_local_dir()
            .map(|d| d.join("log-sentinel"))
            .unwrap_or_else(|| PathBuf::from(".log-sentinel"));
        Self {
            store_path: base.join("artifacts.db"),
        }
    }
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

impl SentinelConfig {
    /// Load from JSON file if present; otherwise return default
    pub fn load(path: &std::path::Path) -> Self {
        if path.exists() {
            if let Ok(data) = std::fs::read_to_string(path) {
                if let Ok(c) = serde_json::from_str::<SentinelConfig>(&data) {
                    return c;
                }
            }
        }
        Self::default()
    }
}

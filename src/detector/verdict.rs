//! Verdicts produced for each scored line.

use crate::parser::LogRecord;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Label {
    Normal,
    Anomalous,
}

impl Label {
    /// Anomalous iff `score` falls below the fitted threshold
    pub fn from_score(score: f64, threshold: f64) -> Self {
        if score < threshold {
            Label::Anomalous
        } else {
            Label::Normal
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Label::Normal => "normal",
            Label::Anomalous => "anomalous",
        }
    }
}

/// Result for a single line. Lines that fail to parse carry no record and no score and are
/// always [`Label::Normal`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredEvent {
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub record: Option<LogRecord>,
    pub label: Label,
    /// Higher is more normal
    #[serde(skip_serializing_if = "Option::is_none")]
    pub score: Option<f64>,
    pub bundle_id: Uuid,
    pub ts: i64,
}

impl ScoredEvent {
    pub fn scored(record: LogRecord, score: f64, threshold: f64, bundle_id: Uuid) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            record: Some(record),
            label: Label::from_score(score, threshold),
            score: Some(score),
            bundle_id,
            ts: Utc::now().timestamp_millis(),
        }
    }

    /// Sentinel for unparsable lines: never an alert
    pub fn unparsed(bundle_id: Uuid) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            record: None,
            label: Label::Normal,
            score: None,
            bundle_id,
            ts: Utc::now().timestamp_millis(),
        }
    }

    pub fn is_anomalous(&self) -> bool {
        self.label == Label::Anomalous
    }

    pub fn is_parsed(&self) -> bool {
        self.record.is_some()
    }
}

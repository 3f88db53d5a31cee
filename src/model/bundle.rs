//! The fitted artifacts as one unit: column schema, scaler, forest and embedder identity.

use super::{IsolationForest, ScalerState};
use crate::error::{Result, SentinelError};
use crate::features::EmbeddingSpec;
use crate::schema::ColumnSchema;
use chrono::{DateTime, SubsecRound, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Everything scoring needs, built together by the trainer and loaded together by the store.
/// Construction validates that the parts agree, so a `ModelBundle` value is always consistent.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelBundle {
    id: Uuid,
    created_at: DateTime<Utc>,
    schema: ColumnSchema,
    scaler: ScalerState,
    forest: IsolationForest,
    embedding: EmbeddingSpec,
}

/// Header describing a stored bundle
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BundleHeader {
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
    pub n_columns: usize,
    pub schema_fingerprint: String,
}

impl ModelBundle {
    pub fn new(
        schema: ColumnSchema,
        scaler: ScalerState,
        forest: IsolationForest,
        embedding: EmbeddingSpec,
    ) -> Result<Self> {
        // millisecond precision, as stored
        let created_at = Utc::now().trunc_subsecs(3);
        Self::from_parts(Uuid::new_v4(), created_at, schema, scaler, forest, embedding)
    }

    /// Reassemble a stored bundle, failing if the parts disagree
    pub fn from_parts(
        id: Uuid,
        created_at: DateTime<Utc>,
        schema: ColumnSchema,
        scaler: ScalerState,
        forest: IsolationForest,
        embedding: EmbeddingSpec,
    ) -> Result<Self> {
        if forest.n_trees() == 0 {
            return Err(SentinelError::ArtifactInconsistent(
                "model has no trees".to_string(),
            ));
        }
        if scaler.n_features() != schema.len() {
            return Err(SentinelError::ArtifactInconsistent(format!(
                "scaler has {} columns, schema has {}",
                scaler.n_features(),
                schema.len()
            )));
        }
        if forest.n_features() != schema.len() {
            return Err(SentinelError::ArtifactInconsistent(format!(
                "model expects {} columns, schema has {}",
                forest.n_features(),
                schema.len()
            )));
        }
        if schema.embedding_dims() != embedding.dim {
            return Err(SentinelError::ArtifactInconsistent(format!(
                "embedder {:?} produces {} dims, schema has {} embedding columns",
                embedding.name,
                embedding.dim,
                schema.embedding_dims()
            )));
        }
        Ok(Self {
            id,
            created_at,
            schema,
            scaler,
            forest,
            embedding,
        })
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn schema(&self) -> &ColumnSchema {
        &self.schema
    }

    pub fn scaler(&self) -> &ScalerState {
        &self.scaler
    }

    pub fn forest(&self) -> &IsolationForest {
        &self.forest
    }

    pub fn embedding(&self) -> &EmbeddingSpec {
        &self.embedding
    }

    pub fn header(&self) -> BundleHeader {
        BundleHeader {
            id: self.id,
            created_at: self.created_at,
            n_columns: self.schema.len(),
            schema_fingerprint: self.schema.fingerprint(),
        }
    }
}

//! Persistence of fitted artifact bundles.

mod artifacts;

pub use artifacts::{ArtifactStore, MODEL_ARTIFACT, SCALER_ARTIFACT, SCHEMA_ARTIFACT};

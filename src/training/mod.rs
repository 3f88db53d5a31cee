//! Batch training over a static corpus.

mod trainer;

pub use trainer::{Trainer, TrainingOutcome, TrainingReport, TrainingStage};

//! Fitted scoring artifacts: scaler, isolation forest and the bundle tying them to a schema.

mod bundle;
mod forest;
mod scaler;

pub use bundle::{BundleHeader, ModelBundle};
pub use forest::{ForestParams, IsolationForest};
pub use scaler::ScalerState;

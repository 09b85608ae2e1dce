pub mod activations;
mod builder;
pub mod layers;
pub mod loss;
mod metrics;
mod model;
mod objective;
mod sequential;
mod statistics;

pub use builder::{Activation, LayerSpec, ModelBuilder, ModelSpec};
pub use metrics::{Metric, MetricKind};
pub use model::{ExecutionMode, Model};
pub use objective::{EvalInputs, ObjectiveFunction, ObjectiveTerm};
pub use sequential::{Sequential, StepOutcome};
pub use statistics::Statistics;

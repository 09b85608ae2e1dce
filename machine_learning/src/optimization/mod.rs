mod gradient_descent;
mod optimizer;

use serde::{Deserialize, Serialize};

pub use gradient_descent::GradientDescent;
pub use optimizer::Optimizer;

/// The optimizer attached to trainable weights.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OptimizerSpec {
    GradientDescent { learning_rate: f64 },
}

impl OptimizerSpec {
    /// Instanciates the optimizer described by this spec.
    pub fn build(&self) -> Box<dyn Optimizer> {
        match *self {
            OptimizerSpec::GradientDescent { learning_rate } => {
                Box::new(GradientDescent::new(learning_rate))
            }
        }
    }
}

impl Default for OptimizerSpec {
    fn default() -> Self {
        Self::GradientDescent { learning_rate: 0.01 }
    }
}

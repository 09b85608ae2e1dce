use ndarray::{ArrayView2, ArrayViewMut2};

use super::Optimizer;
use crate::{MlErr, Result};

/// Gradient descent optimization algorithm.
#[derive(Debug, Clone, Copy)]
pub struct GradientDescent {
    learning_rate: f64,
}

impl GradientDescent {
    /// Returns a new `GradientDescent`.
    ///
    /// # Arguments
    /// * `learning_rate` - The *length* of the steps taken on `update_params`.
    pub fn new(learning_rate: f64) -> Self {
        Self { learning_rate }
    }
}

impl Optimizer for GradientDescent {
    /// Makes a step in the opposite direction of the gradient, with a length of
    /// `learning_rate`.
    fn update_params(&mut self, grad: ArrayView2<f64>, mut params: ArrayViewMut2<f64>) -> Result<()> {
        if grad.dim() != params.dim() {
            return Err(MlErr::ShapeMismatch {
                what: "gradient and weights",
                got: grad.dim(),
                expected: params.dim(),
            });
        }

        let lr = self.learning_rate;
        params.zip_mut_with(&grad, |w, g| *w -= lr * g);
        Ok(())
    }
}

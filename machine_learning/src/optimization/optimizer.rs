use ndarray::{ArrayView2, ArrayViewMut2};

use crate::Result;

/// Defines the strategy for updating weights based on their gradient.
pub trait Optimizer: Send {
    /// Updates a block of weights using the matching block of the gradient.
    ///
    /// # Arguments
    /// * `grad` - The gradient of the weights.
    /// * `params` - The weights to update.
    ///
    /// # Returns
    /// An error if there's a mismatch in the shapes of `grad` and `params`.
    fn update_params(&mut self, grad: ArrayView2<f64>, params: ArrayViewMut2<f64>) -> Result<()>;
}

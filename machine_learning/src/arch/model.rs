use std::sync::Arc;

use comms::Communicator;
use serde::{Deserialize, Serialize};

use crate::{Result, Weights, arch::layers::LayerRole};

/// The phase a model is executing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionMode {
    Training,
    Validation,
    Testing,
}

/// What drivers such as the gradient checker need from a model.
///
/// Every method that involves the layers or the objective is a collective call.
pub trait Model {
    /// Returns the group the model is distributed over.
    fn comm(&self) -> &Arc<dyn Communicator>;

    fn execution_mode(&self) -> ExecutionMode;

    fn num_layers(&self) -> usize;

    /// Returns the role of layer `layer`, `0 <= layer < num_layers()`.
    fn layer_role(&self, layer: usize) -> LayerRole;

    /// Runs the forward pass of a single layer, it's predecessors must be up to date.
    fn forward_prop_layer(&mut self, layer: usize) -> Result<()>;

    /// Runs the backward pass of a single layer, layers must be visited in reverse order
    /// after `differentiate_objective`.
    fn back_prop_layer(&mut self, layer: usize) -> Result<()>;

    /// Evaluates the objective function over the current activations, adding the value
    /// to the statistics of the current mode.
    fn evaluate_objective(&mut self) -> Result<f64>;

    /// Computes the objective's gradient with respect to the output and the weight
    /// regularization gradients.
    fn differentiate_objective(&mut self) -> Result<()>;

    /// Resets the objective function and metric statistics of `mode`.
    fn reset_statistics(&mut self, mode: ExecutionMode);

    fn num_weights(&self) -> usize;

    fn weights(&self, index: usize) -> Option<&Weights>;

    fn weights_mut(&mut self, index: usize) -> Option<&mut Weights>;

    /// Zeroes the gradient of every optimized weights.
    fn clear_gradients(&mut self) {
        for i in 0..self.num_weights() {
            if let Some(opt) = self.weights_mut(i).and_then(|w| w.optimizer_mut()) {
                opt.clear_gradient();
            }
        }
    }

    /// Moves the data readers of the current mode back to the start of the epoch.
    fn rewind_readers(&mut self);
}

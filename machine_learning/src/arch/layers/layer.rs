use data_reader::DataReader;
use ndarray::{Array2, ArrayView2};

use crate::{ExecutionMode, Result, Weights};

/// The part a layer plays in a pass.
///
/// `Input` layers load a mini-batch from their data readers, they're driven once per
/// mini-batch. `Compute` layers transform the previous layer's activations and are the
/// only ones re-run when a pass is repeated over the same mini-batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LayerRole {
    Input,
    Compute,
}

/// A node of a layer graph.
///
/// Forward and back prop over layers are lock-step collective computations, every
/// participant must drive the same layers in the same order.
pub trait Layer: Send {
    fn name(&self) -> &str;

    fn role(&self) -> LayerRole;

    /// Computes this layer's activations.
    ///
    /// # Arguments
    /// * `prev` - The previous layer's activations, empty for the first layer.
    /// * `mode` - The execution mode of the pass.
    fn forward_prop(&mut self, prev: ArrayView2<f64>, mode: ExecutionMode) -> Result<()>;

    /// Accumulates the gradient of this layer's weights.
    ///
    /// # Arguments
    /// * `d_out` - The objective's gradient with respect to this layer's activations.
    ///
    /// # Returns
    /// The objective's gradient with respect to the previous layer's activations.
    fn back_prop(&mut self, d_out: ArrayView2<f64>) -> Result<Array2<f64>>;

    /// The local rows of the activations computed by the last `forward_prop`.
    fn activations(&self) -> ArrayView2<'_, f64>;

    fn weights(&self) -> &[Weights] {
        &[]
    }

    fn weights_mut(&mut self) -> &mut [Weights] {
        &mut []
    }

    /// The local rows of the expected outputs of the current mini-batch.
    fn targets(&self) -> Option<ArrayView2<'_, f64>> {
        None
    }

    /// The global size of the current mini-batch.
    fn mini_batch_size(&self) -> Option<usize> {
        None
    }

    /// The reader feeding this layer in `mode`.
    fn data_reader_mut(&mut self, _mode: ExecutionMode) -> Option<&mut DataReader> {
        None
    }
}

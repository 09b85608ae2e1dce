use std::sync::Arc;

use comms::Communicator;
use ndarray::{Array2, ArrayView2, Axis};

use super::{Layer, LayerRole};
use crate::{
    ExecutionMode, MlErr, Result, Weights, arch::activations::ActFn, dist::all_reduce_array,
};

/// A fully connected layer, `a = act(x * w + b)`.
///
/// The kernel and the bias are distributed, they're gathered on every forward pass and
/// their gradients are summed across the group before being handed to their owners.
pub struct Dense {
    name: String,
    dim: (usize, usize),
    act_fn: Option<ActFn>,
    comm: Arc<dyn Communicator>,
    // The kernel, followed by the bias if any.
    weights: Vec<Weights>,

    // Forward metadata
    x: Array2<f64>,
    z: Array2<f64>,
    a: Array2<f64>,
    w: Array2<f64>,
}

impl Dense {
    /// Creates a new `Dense` layer.
    ///
    /// # Arguments
    /// * `name` - The layer's name.
    /// * `act_fn` - The activation function, the identity if `None`.
    /// * `comm` - The group this layer belongs to.
    /// * `kernel` - A `inputs x outputs` weights matrix.
    /// * `bias` - An optional `1 x outputs` weights matrix.
    ///
    /// # Returns
    /// An error if the bias doesn't match the kernel.
    pub fn new(
        name: impl Into<String>,
        act_fn: Option<ActFn>,
        comm: Arc<dyn Communicator>,
        kernel: Weights,
        bias: Option<Weights>,
    ) -> Result<Self> {
        let dim = kernel.values().shape();
        let mut weights = vec![kernel];

        if let Some(bias) = bias {
            if bias.values().shape() != (1, dim.1) {
                return Err(MlErr::ShapeMismatch {
                    what: "dense bias",
                    got: bias.values().shape(),
                    expected: (1, dim.1),
                });
            }

            weights.push(bias);
        }

        let zeros = Array2::zeros((0, 0));

        Ok(Self {
            name: name.into(),
            dim,
            act_fn,
            comm,
            weights,
            x: zeros.clone(),
            z: zeros.clone(),
            a: zeros.clone(),
            w: zeros,
        })
    }

    /// Returns the `(inputs, outputs)` shape of the layer.
    pub fn dim(&self) -> (usize, usize) {
        self.dim
    }
}

impl Layer for Dense {
    fn name(&self) -> &str {
        &self.name
    }

    fn role(&self) -> LayerRole {
        LayerRole::Compute
    }

    fn forward_prop(&mut self, x: ArrayView2<f64>, _mode: ExecutionMode) -> Result<()> {
        if x.ncols() != self.dim.0 {
            return Err(MlErr::ShapeMismatch {
                what: "dense input",
                got: x.dim(),
                expected: (x.nrows(), self.dim.0),
            });
        }

        let comm = &*self.comm;
        self.w = self.weights[0].values().gather(comm);
        self.z = x.dot(&self.w);

        if let Some(bias) = self.weights.get(1) {
            let b = bias.values().gather(comm);
            self.z += &b.row(0);
        }

        self.x = x.to_owned();

        if let Some(act_fn) = &self.act_fn {
            self.a = self.z.mapv(|z| act_fn.f(z));
        }

        Ok(())
    }

    fn back_prop(&mut self, d_out: ArrayView2<f64>) -> Result<Array2<f64>> {
        if d_out.dim() != self.z.dim() {
            return Err(MlErr::ShapeMismatch {
                what: "dense delta",
                got: d_out.dim(),
                expected: self.z.dim(),
            });
        }

        let mut d = d_out.to_owned();
        if let Some(act_fn) = &self.act_fn {
            d.zip_mut_with(&self.z, |d, &z| *d *= act_fn.df(z));
        }

        let comm = &*self.comm;
        let mut dw = self.x.t().dot(&d);
        all_reduce_array(comm, &mut dw);

        if let Some(opt) = self.weights[0].optimizer_mut() {
            opt.add_to_gradient(dw.view());
        }

        if let Some(bias) = self.weights.get_mut(1) {
            let mut db = d.sum_axis(Axis(0)).insert_axis(Axis(0));
            all_reduce_array(comm, &mut db);

            if let Some(opt) = bias.optimizer_mut() {
                opt.add_to_gradient(db.view());
            }
        }

        Ok(d.dot(&self.w.t()))
    }

    fn activations(&self) -> ArrayView2<'_, f64> {
        match self.act_fn {
            Some(_) => self.a.view(),
            None => self.z.view(),
        }
    }

    fn weights(&self) -> &[Weights] {
        &self.weights
    }

    fn weights_mut(&mut self) -> &mut [Weights] {
        &mut self.weights
    }
}

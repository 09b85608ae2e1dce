mod init;

use std::fmt;

use ndarray::ArrayView2;

pub use init::{ConstWeightGen, RandWeightGen, WeightGen, WeightInit};

use crate::{DistMatrix, Result, optimization::Optimizer};

/// A named, distributed matrix of trainable scalars.
pub struct Weights {
    name: String,
    values: DistMatrix,
    optimizer: Option<WeightsOptimizer>,
}

impl Weights {
    /// Creates new `Weights` without an optimizer, these are never updated nor checked.
    ///
    /// # Arguments
    /// * `name` - A name unique within the model.
    /// * `values` - The initial values.
    pub fn new(name: impl Into<String>, values: DistMatrix) -> Self {
        Self {
            name: name.into(),
            values,
            optimizer: None,
        }
    }

    /// Attaches an optimizer, along with a zeroed gradient distributed like the values.
    pub fn with_optimizer(mut self, rule: Box<dyn Optimizer>) -> Self {
        self.optimizer = Some(WeightsOptimizer {
            rule,
            gradient: self.values.zeros_like(),
        });
        self
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    pub fn values(&self) -> &DistMatrix {
        &self.values
    }

    #[inline]
    pub fn values_mut(&mut self) -> &mut DistMatrix {
        &mut self.values
    }

    #[inline]
    pub fn optimizer(&self) -> Option<&WeightsOptimizer> {
        self.optimizer.as_ref()
    }

    #[inline]
    pub fn optimizer_mut(&mut self) -> Option<&mut WeightsOptimizer> {
        self.optimizer.as_mut()
    }

    /// Sets entry `(row, col)`, see `DistMatrix::set`.
    pub fn set_value(&mut self, row: usize, col: usize, value: f64) -> Result<()> {
        self.values.set(row, col, value)
    }

    /// Adds `factor * values` to the gradient, a no-op for weights without optimizer.
    pub fn add_values_to_gradient(&mut self, factor: f64) {
        if let Some(opt) = &mut self.optimizer {
            opt.gradient
                .local_mut()
                .scaled_add(factor, &self.values.local());
        }
    }

    /// Applies the optimizer to the local block, a no-op for weights without one.
    pub fn step(&mut self) -> Result<()> {
        match &mut self.optimizer {
            Some(opt) => opt
                .rule
                .update_params(opt.gradient.local(), self.values.local_mut()),
            None => Ok(()),
        }
    }
}

impl fmt::Debug for Weights {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Weights")
            .field("name", &self.name)
            .field("shape", &self.values.shape())
            .field("trainable", &self.optimizer.is_some())
            .finish()
    }
}

/// The optimizer attached to some `Weights` and the gradient it consumes.
pub struct WeightsOptimizer {
    rule: Box<dyn Optimizer>,
    gradient: DistMatrix,
}

impl WeightsOptimizer {
    #[inline]
    pub fn gradient(&self) -> &DistMatrix {
        &self.gradient
    }

    #[inline]
    pub fn gradient_mut(&mut self) -> &mut DistMatrix {
        &mut self.gradient
    }

    pub fn clear_gradient(&mut self) {
        self.gradient.fill(0.);
    }

    /// Accumulates a replicated, already reduced, gradient into the owned entries.
    pub fn add_to_gradient(&mut self, global: ArrayView2<f64>) {
        self.gradient.scatter(global, |g, x| *g += x);
    }
}

#[cfg(test)]
mod tests {
    use ndarray::array;

    use super::*;
    use crate::optimization::GradientDescent;

    #[test]
    fn step_follows_the_accumulated_gradient() {
        let values = DistMatrix::from_global(array![[1., 2.]].view(), 0, 1);
        let mut w = Weights::new("w", values).with_optimizer(Box::new(GradientDescent::new(1.)));

        let opt = w.optimizer_mut().unwrap();
        opt.add_to_gradient(array![[0.5, 0.5]].view());
        opt.add_to_gradient(array![[0.5, -1.]].view());
        w.step().unwrap();
        assert_eq!(w.values().local(), array![[0., 2.5]]);

        w.optimizer_mut().unwrap().clear_gradient();
        w.step().unwrap();
        assert_eq!(w.values().local(), array![[0., 2.5]]);
    }

    #[test]
    fn weights_without_optimizer_are_frozen() {
        let values = DistMatrix::from_global(array![[1.]].view(), 0, 1);
        let mut w = Weights::new("frozen", values);

        assert!(w.optimizer().is_none());
        w.step().unwrap();
        assert_eq!(w.values().get(0, 0).unwrap(), 1.);
    }
}

use comms::Communicator;
use log::debug;
use ndarray::{Array2, ArrayView2};
use serde::{Deserialize, Serialize};

use super::{
    Statistics,
    loss::{LossFn, Mse},
};
use crate::{ExecutionMode, MlErr, Result, Weights};

/// A term of an objective function.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ObjectiveTerm {
    /// The mean over the mini-batch of the squared prediction errors.
    MeanSquaredError { scale: f64 },
    /// The sum of the squares of every weights entry.
    L2WeightRegularization { scale: f64 },
}

/// What an evaluation of the objective looks at.
pub struct EvalInputs<'a> {
    pub comm: &'a dyn Communicator,
    pub prediction: ArrayView2<'a, f64>,
    pub targets: ArrayView2<'a, f64>,
    pub weights: Vec<&'a Weights>,
}

/// A weighted sum of `ObjectiveTerm`s, with running statistics per execution mode.
pub struct ObjectiveFunction {
    terms: Vec<ObjectiveTerm>,
    statistics: Statistics,
    pending: Option<f64>,
    normalizer: f64,
}

impl ObjectiveFunction {
    /// Creates a new `ObjectiveFunction`.
    ///
    /// # Returns
    /// An error if there are no terms.
    pub fn new(terms: Vec<ObjectiveTerm>) -> Result<Self> {
        if terms.is_empty() {
            return Err(MlErr::Configuration(
                "an objective function needs at least one term".into(),
            ));
        }

        Ok(Self {
            terms,
            statistics: Statistics::default(),
            pending: None,
            normalizer: 0.,
        })
    }

    pub fn terms(&self) -> &[ObjectiveTerm] {
        &self.terms
    }

    /// Computes the value of the objective.
    ///
    /// This is a collective call, every participant gets the same value once
    /// `finish_evaluation` is called.
    pub fn start_evaluation(&mut self, inputs: &EvalInputs<'_>) -> Result<()> {
        if inputs.prediction.dim() != inputs.targets.dim() {
            return Err(MlErr::ShapeMismatch {
                what: "prediction and targets",
                got: inputs.prediction.dim(),
                expected: inputs.targets.dim(),
            });
        }

        let mut value = 0.;

        for term in &self.terms {
            match *term {
                ObjectiveTerm::MeanSquaredError { scale } => {
                    let mut sums = [
                        Mse.loss(inputs.prediction, inputs.targets),
                        inputs.prediction.len() as f64,
                    ];
                    inputs.comm.all_reduce_sum(&mut sums);

                    self.normalizer = sums[1];
                    if sums[1] > 0. {
                        value += scale * sums[0] / sums[1];
                    }
                }
                ObjectiveTerm::L2WeightRegularization { scale } => {
                    let sum: f64 = inputs
                        .weights
                        .iter()
                        .map(|w| w.values().sum_of_squares(inputs.comm))
                        .sum();

                    value += scale * sum;
                }
            }
        }

        self.pending = Some(value);
        Ok(())
    }

    /// Records the value computed by `start_evaluation` in the statistics of `mode`.
    ///
    /// # Returns
    /// The objective's value.
    pub fn finish_evaluation(&mut self, mode: ExecutionMode, mini_batch_size: usize) -> Result<f64> {
        let value = self.pending.take().ok_or_else(|| {
            MlErr::InvalidState("finish_evaluation called before start_evaluation".into())
        })?;

        self.statistics.add(mode, value, mini_batch_size);
        Ok(value)
    }

    /// Computes the gradient of the objective with respect to the local prediction rows,
    /// using the normalization of the last evaluation.
    pub fn differentiate(&self, prediction: ArrayView2<f64>, targets: ArrayView2<f64>) -> Array2<f64> {
        let mut d = Array2::zeros(prediction.dim());

        for term in &self.terms {
            if let ObjectiveTerm::MeanSquaredError { scale } = *term {
                d.scaled_add(scale, &Mse.loss_prime(prediction, targets, self.normalizer));
            }
        }

        d
    }

    /// Adds the gradients of the regularization terms to the optimized weights.
    pub fn compute_weight_regularization(&self, weights: &mut [&mut Weights]) {
        for term in &self.terms {
            if let ObjectiveTerm::L2WeightRegularization { scale } = *term {
                for w in weights.iter_mut() {
                    w.add_values_to_gradient(2. * scale);
                }
            }
        }
    }

    /// Returns the mean objective value over the mini-batches evaluated in `mode`.
    pub fn statistics(&self, mode: ExecutionMode) -> Option<f64> {
        self.statistics.mean(mode)
    }

    pub fn reset_statistics(&mut self, mode: ExecutionMode) {
        debug!(mode:? = mode; "resetting objective statistics");
        self.statistics.reset(mode);
        self.pending = None;
    }
}

#[cfg(test)]
mod tests {
    use comms::SelfComm;
    use ndarray::array;

    use super::*;
    use crate::{DistMatrix, optimization::GradientDescent};

    #[test]
    fn weighted_sum_of_terms() {
        let w = Weights::new("w", DistMatrix::from_global(array![[1., 2.]].view(), 0, 1));
        let prediction = array![[1.], [3.]];
        let targets = array![[0.], [1.]];

        let mut objective = ObjectiveFunction::new(vec![
            ObjectiveTerm::MeanSquaredError { scale: 2. },
            ObjectiveTerm::L2WeightRegularization { scale: 0.5 },
        ])
        .unwrap();

        let inputs = EvalInputs {
            comm: &SelfComm,
            prediction: prediction.view(),
            targets: targets.view(),
            weights: vec![&w],
        };

        objective.start_evaluation(&inputs).unwrap();
        // 2 * (1 + 4) / 2 + 0.5 * (1 + 4)
        assert_eq!(objective.finish_evaluation(ExecutionMode::Training, 2).unwrap(), 7.5);
        assert_eq!(objective.statistics(ExecutionMode::Training), Some(7.5));
        assert!(objective.finish_evaluation(ExecutionMode::Training, 2).is_err());

        let d = objective.differentiate(prediction.view(), targets.view());
        assert_eq!(d, array![[2.], [4.]]);
    }

    #[test]
    fn regularization_gradient_reaches_optimized_weights() {
        let values = DistMatrix::from_global(array![[1., -2.]].view(), 0, 1);
        let mut w = Weights::new("w", values).with_optimizer(Box::new(GradientDescent::new(1.)));

        let objective =
            ObjectiveFunction::new(vec![ObjectiveTerm::L2WeightRegularization { scale: 1. }]).unwrap();
        objective.compute_weight_regularization(&mut [&mut w]);

        let grad = w.optimizer().unwrap().gradient().local().to_owned();
        assert_eq!(grad, array![[2., -4.]]);
    }

    #[test]
    fn empty_objective_is_rejected() {
        assert!(ObjectiveFunction::new(vec![]).is_err());
    }
}

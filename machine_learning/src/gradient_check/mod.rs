//! Verifies a model's analytical gradients against finite differences.
//!
//! Every participant runs the same sequence of collective passes, perturbing one weights
//! entry at a time. The owner of the entry compares both gradients.

mod config;
mod guard;
mod report;

use log::{debug, info, warn};

pub use config::CheckGradientsConfig;
pub use guard::EntryGuard;
pub use report::{GradientCheckReport, GradientFailure};

use crate::{
    ExecutionMode, MlErr, Result,
    arch::{Model, layers::LayerRole},
};

/// Evaluates the objective after forward propagating every compute layer.
///
/// Input layers are expected to hold the current mini-batch already. This is a collective
/// call.
pub(crate) fn compute_objective<M: Model + ?Sized>(model: &mut M) -> Result<f64> {
    for i in 0..model.num_layers() {
        if model.layer_role(i) == LayerRole::Compute {
            model.forward_prop_layer(i)?;
        }
    }

    model.evaluate_objective()
}

/// The finite difference step and the error bound of a check.
#[derive(Debug, Clone, Copy, PartialEq)]
struct Tolerance {
    step_size: f64,
    expected_error: f64,
}

impl Tolerance {
    /// Balances the truncation error of the 5 point stencil, `h^4 / 18`, against the
    /// cancellation error of evaluating the objective, `eps * |f| / h`.
    ///
    /// # Arguments
    /// * `objective` - The objective's value at the unperturbed weights.
    /// * `step_size` - A fixed step, or `0` to derive it from `objective`.
    fn new(objective: f64, step_size: f64) -> Self {
        let eps = f64::EPSILON.powf(0.9);

        let step_size = if step_size > 0. {
            step_size
        } else if objective == 0. {
            eps.sqrt()
        } else {
            objective.abs() * eps.sqrt()
        };

        let expected_error = (eps * objective.abs() / step_size + step_size.powi(4) / 18.).powf(0.9);

        Self {
            step_size,
            expected_error,
        }
    }
}

/// The comparison of a single entry's gradients.
#[derive(Debug, Clone, Copy)]
struct EntryCheck {
    weight: f64,
    analytical: f64,
    numerical: f64,
    error: f64,
    relative_error: f64,
}

impl EntryCheck {
    fn new(weight: f64, analytical: f64, numerical: f64) -> Self {
        let error = (analytical - numerical).abs();
        let relative_error = if error == 0. {
            0.
        } else {
            error / analytical.abs().max(numerical.abs())
        };

        Self {
            weight,
            analytical,
            numerical,
            error,
            relative_error,
        }
    }

    fn failed(&self, expected_error: f64) -> bool {
        !self.error.is_finite() || self.error > expected_error
    }
}

/// Checks the gradients of every optimized weights of a model.
#[derive(Debug, Clone)]
pub struct CheckGradients {
    config: CheckGradientsConfig,
}

impl CheckGradients {
    /// Creates a new `CheckGradients`.
    ///
    /// # Returns
    /// An error if the configuration is invalid.
    pub fn new(config: CheckGradientsConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &CheckGradientsConfig {
        &self.config
    }

    /// Runs the check on the model's current mini-batch.
    ///
    /// Every weights entry is restored and the readers of the current mode are rewound
    /// before returning, even on error. This is a collective call.
    ///
    /// # Returns
    /// `None` if the check doesn't cover the model's execution mode. With `error_on_failure`,
    /// every participant gets the same `MlErr::GradientMismatch` for the first failing entry.
    pub fn check<M: Model + ?Sized>(&self, model: &mut M) -> Result<Option<GradientCheckReport>> {
        let mode = model.execution_mode();
        if !self.config.covers(mode) {
            debug!(mode:? = mode; "gradient check skipped");
            return Ok(None);
        }

        let result = self.run(model, mode);

        model.rewind_readers();
        model.reset_statistics(mode);

        result.map(Some)
    }

    fn run<M: Model + ?Sized>(&self, model: &mut M, mode: ExecutionMode) -> Result<GradientCheckReport> {
        let is_master = model.comm().is_world_master();

        model.reset_statistics(mode);
        model.clear_gradients();

        for i in 0..model.num_layers() {
            if model.layer_role(i) == LayerRole::Input {
                model.forward_prop_layer(i)?;
            }
        }

        let objective = compute_objective(model)?;
        let tolerance = Tolerance::new(objective, self.config.step_size);

        model.differentiate_objective()?;
        for i in (0..model.num_layers()).rev() {
            model.back_prop_layer(i)?;
        }

        if is_master {
            info!(
                mode:? = mode,
                objective = objective,
                step_size = tolerance.step_size,
                expected_error = tolerance.expected_error;
                "gradient checking"
            );
        }

        let mut report = GradientCheckReport {
            mode,
            objective,
            step_size: tolerance.step_size,
            expected_error: tolerance.expected_error,
            checked: 0,
            failures: Vec::new(),
        };

        for index in 0..model.num_weights() {
            let Some(weights) = model.weights(index) else {
                continue;
            };

            if weights.optimizer().is_none() {
                continue;
            }

            let (height, width) = weights.values().shape();
            if is_master {
                info!(weights = weights.name(), height = height, width = width; "checking weights");
            }

            for col in 0..width {
                for row in 0..height {
                    self.check_entry(model, index, row, col, tolerance, &mut report)?;
                }
            }
        }

        if is_master {
            info!(mode:? = mode, checked = report.checked; "gradient check done");
        }

        Ok(report)
    }

    fn check_entry<M: Model + ?Sized>(
        &self,
        model: &mut M,
        index: usize,
        row: usize,
        col: usize,
        tolerance: Tolerance,
        report: &mut GradientCheckReport,
    ) -> Result<()> {
        let h = tolerance.step_size;

        let mut guard = EntryGuard::acquire(&mut *model, index, row, col)?;
        let f_2h = guard.evaluate_at(2. * h)?;
        let f_h = guard.evaluate_at(h)?;
        let f_nh = guard.evaluate_at(-h)?;
        let f_n2h = guard.evaluate_at(-2. * h)?;
        let initial = guard.initial();
        guard.release()?;

        let Some(weights) = model.weights(index) else {
            return Err(MlErr::InvalidState(format!("weights {index} vanished")));
        };

        let mut failed = None;

        // Only the owner compares, non owners have no initial value.
        if let Some(weight) = initial {
            let analytical = match weights.optimizer() {
                Some(opt) => opt.gradient().get(row, col)?,
                None => 0.,
            };
            let numerical = (-f_2h + 8. * f_h - 8. * f_nh + f_n2h) / (12. * h);
            let entry = EntryCheck::new(weight, analytical, numerical);

            report.checked += 1;

            if entry.failed(tolerance.expected_error) {
                warn!(
                    weights = weights.name(),
                    row = row,
                    col = col,
                    weight = entry.weight,
                    analytical = entry.analytical,
                    numerical = entry.numerical,
                    error = entry.error,
                    relative_error = entry.relative_error;
                    "gradient error"
                );

                report.failures.push(GradientFailure {
                    weights: weights.name().to_string(),
                    row,
                    col,
                    weight: entry.weight,
                    analytical: entry.analytical,
                    numerical: entry.numerical,
                    error: entry.error,
                    relative_error: entry.relative_error,
                });

                failed = Some(entry);
            } else if self.config.verbose {
                info!(
                    weights = weights.name(),
                    row = row,
                    col = col,
                    weight = entry.weight,
                    analytical = entry.analytical,
                    numerical = entry.numerical,
                    error = entry.error,
                    relative_error = entry.relative_error;
                    "gradient ok"
                );
            }
        }

        if !self.config.error_on_failure {
            return Ok(());
        }

        // Every participant learns the owner's verdict, so they all abort together.
        let mut verdict = match failed {
            Some(entry) => [1., entry.analytical, entry.numerical],
            None => [0.; 3],
        };
        model.comm().all_reduce_sum(&mut verdict);

        if verdict[0] > 0. {
            let weights = model
                .weights(index)
                .map(|w| w.name().to_string())
                .unwrap_or_default();

            return Err(MlErr::GradientMismatch {
                weights,
                row,
                col,
                analytical: verdict[1],
                numerical: verdict[2],
                expected_error: tolerance.expected_error,
            });
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fixed_step_is_used_as_is() {
        let tolerance = Tolerance::new(2., 1e-3);

        assert_eq!(tolerance.step_size, 1e-3);
        let eps = f64::EPSILON.powf(0.9);
        let expected = (eps * 2. / 1e-3 + 1e-12 / 18.).powf(0.9);
        assert_eq!(tolerance.expected_error, expected);
    }

    #[test]
    fn derived_step_scales_with_the_objective() {
        let small = Tolerance::new(0.5, 0.);
        let large = Tolerance::new(-50., 0.);

        assert!(small.step_size > 0.);
        assert!((large.step_size / small.step_size - 100.).abs() < 1e-9);
        assert!(large.expected_error.is_finite());
    }

    #[test]
    fn zero_objective_still_gets_a_positive_step() {
        let tolerance = Tolerance::new(0., 0.);

        assert!(tolerance.step_size > 0.);
        assert!(tolerance.expected_error > 0.);
    }

    #[test]
    fn relative_error_of_an_exact_match_is_zero() {
        let entry = EntryCheck::new(1., 0.5, 0.5);
        assert_eq!(entry.relative_error, 0.);
        assert!(!entry.failed(0.));

        let entry = EntryCheck::new(1., 1., -1.);
        assert_eq!(entry.error, 2.);
        assert_eq!(entry.relative_error, 2.);
        assert!(entry.failed(1.));

        assert!(EntryCheck::new(1., f64::NAN, 0.).failed(f64::INFINITY));
    }
}

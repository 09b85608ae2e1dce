use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::{ExecutionMode, MlErr, Result};

/// The configuration of a `CheckGradients` run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CheckGradientsConfig {
    /// The modes in which the check runs, every mode if empty.
    pub execution_modes: HashSet<ExecutionMode>,
    /// The finite difference step, derived from the objective's value if `0`.
    pub step_size: f64,
    /// Log every entry, not just the failing ones.
    pub verbose: bool,
    /// Abort on the first failing entry instead of reporting it.
    pub error_on_failure: bool,
}

impl CheckGradientsConfig {
    pub fn validate(&self) -> Result<()> {
        if !self.step_size.is_finite() || self.step_size < 0. {
            return Err(MlErr::Configuration(format!(
                "step_size must be a finite non negative number, got {}",
                self.step_size
            )));
        }

        Ok(())
    }

    /// Returns whether the check runs in `mode`.
    pub fn covers(&self, mode: ExecutionMode) -> bool {
        self.execution_modes.is_empty() || self.execution_modes.contains(&mode)
    }
}

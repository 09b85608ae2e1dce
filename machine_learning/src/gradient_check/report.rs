use serde::Serialize;

use crate::ExecutionMode;

/// The outcome of a gradient check, as seen by one participant.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GradientCheckReport {
    pub mode: ExecutionMode,
    /// The objective's value at the unperturbed weights.
    pub objective: f64,
    pub step_size: f64,
    pub expected_error: f64,
    /// The amount of entries this participant compared.
    pub checked: usize,
    /// The failing entries owned by this participant.
    pub failures: Vec<GradientFailure>,
}

impl GradientCheckReport {
    /// Whether every entry owned by this participant passed.
    pub fn passed(&self) -> bool {
        self.failures.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GradientFailure {
    pub weights: String,
    pub row: usize,
    pub col: usize,
    pub weight: f64,
    pub analytical: f64,
    pub numerical: f64,
    pub error: f64,
    pub relative_error: f64,
}

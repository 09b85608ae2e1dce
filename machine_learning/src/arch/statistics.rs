use std::collections::HashMap;

use crate::ExecutionMode;

/// Running mini-batch weighted means, one per execution mode.
#[derive(Debug, Clone, Default)]
pub struct Statistics {
    per_mode: HashMap<ExecutionMode, (f64, usize)>,
}

impl Statistics {
    /// Records the value of a mini-batch of `samples` samples.
    pub fn add(&mut self, mode: ExecutionMode, value: f64, samples: usize) {
        let (sum, count) = self.per_mode.entry(mode).or_default();
        *sum += value * samples as f64;
        *count += samples;
    }

    /// Returns the mean of the values recorded in `mode`, `None` if there aren't any.
    pub fn mean(&self, mode: ExecutionMode) -> Option<f64> {
        match self.per_mode.get(&mode) {
            Some(&(sum, count)) if count > 0 => Some(sum / count as f64),
            _ => None,
        }
    }

    pub fn reset(&mut self, mode: ExecutionMode) {
        self.per_mode.remove(&mode);
    }
}

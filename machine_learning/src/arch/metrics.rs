use comms::Communicator;
use ndarray::ArrayView2;
use serde::{Deserialize, Serialize};

use super::Statistics;
use crate::ExecutionMode;

/// A quantity reported alongside the objective, never differentiated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetricKind {
    MeanAbsoluteError,
}

#[derive(Debug, Clone)]
pub struct Metric {
    kind: MetricKind,
    statistics: Statistics,
}

impl Metric {
    pub fn new(kind: MetricKind) -> Self {
        Self {
            kind,
            statistics: Statistics::default(),
        }
    }

    pub fn kind(&self) -> MetricKind {
        self.kind
    }

    /// Evaluates the metric over a mini-batch and records it in the statistics of `mode`.
    ///
    /// This is a collective call.
    ///
    /// # Returns
    /// The value over the whole mini-batch.
    pub fn evaluate(
        &mut self,
        comm: &dyn Communicator,
        mode: ExecutionMode,
        prediction: ArrayView2<f64>,
        targets: ArrayView2<f64>,
        mini_batch_size: usize,
    ) -> f64 {
        let mut sums = match self.kind {
            MetricKind::MeanAbsoluteError => [
                (&prediction - &targets).mapv(f64::abs).sum(),
                prediction.len() as f64,
            ],
        };

        comm.all_reduce_sum(&mut sums);
        let value = if sums[1] > 0. { sums[0] / sums[1] } else { 0. };

        self.statistics.add(mode, value, mini_batch_size);
        value
    }

    pub fn statistics(&self, mode: ExecutionMode) -> Option<f64> {
        self.statistics.mean(mode)
    }

    pub fn reset_statistics(&mut self, mode: ExecutionMode) {
        self.statistics.reset(mode);
    }
}

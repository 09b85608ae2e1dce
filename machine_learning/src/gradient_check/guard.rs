use log::error;

use super::compute_objective;
use crate::{MlErr, Result, arch::Model};

/// Exclusive access to a single weights entry while it's perturbed.
///
/// The entry is written back to it's initial value when the guard is released or dropped,
/// whichever comes first, so an early return can't leave the model perturbed.
///
/// Every participant holds a guard over the same entry, only the owner writes to it.
pub struct EntryGuard<'m, M: Model + ?Sized> {
    model: &'m mut M,
    weights: usize,
    row: usize,
    col: usize,
    initial: Option<f64>,
}

impl<'m, M: Model + ?Sized> EntryGuard<'m, M> {
    /// Acquires entry `(row, col)` of the `weights`-th weights of `model`.
    ///
    /// # Returns
    /// An error if there are no such weights or the entry is out of bounds.
    pub fn acquire(model: &'m mut M, weights: usize, row: usize, col: usize) -> Result<Self> {
        let values = model
            .weights(weights)
            .ok_or_else(|| MlErr::Configuration(format!("no weights at index {weights}")))?
            .values();

        let (height, width) = values.shape();
        if row >= height || col >= width {
            return Err(MlErr::OutOfBounds {
                row,
                col,
                height,
                width,
            });
        }

        let initial = match values.is_local(row, col) {
            true => Some(values.get(row, col)?),
            false => None,
        };

        Ok(Self {
            model,
            weights,
            row,
            col,
            initial,
        })
    }

    /// Returns the entry's initial value, `None` on participants not owning it.
    pub fn initial(&self) -> Option<f64> {
        self.initial
    }

    /// Sets the entry to `initial + delta` and evaluates the objective.
    ///
    /// This is a collective call.
    pub fn evaluate_at(&mut self, delta: f64) -> Result<f64> {
        if let Some(w0) = self.initial {
            self.write(w0 + delta)?;
        }

        compute_objective(&mut *self.model)
    }

    /// Restores the entry, reporting a failure to do so.
    pub fn release(mut self) -> Result<()> {
        self.restore()
    }

    fn restore(&mut self) -> Result<()> {
        match self.initial.take() {
            Some(w0) => self.write(w0),
            None => Ok(()),
        }
    }

    fn write(&mut self, value: f64) -> Result<()> {
        let (row, col) = (self.row, self.col);

        self.model
            .weights_mut(self.weights)
            .ok_or_else(|| MlErr::InvalidState(format!("weights {} vanished", self.weights)))?
            .set_value(row, col, value)
    }
}

impl<M: Model + ?Sized> Drop for EntryGuard<'_, M> {
    fn drop(&mut self) {
        if let Err(e) = self.restore() {
            error!(weights = self.weights, row = self.row, col = self.col; "failed to restore entry: {e}");
        }
    }
}

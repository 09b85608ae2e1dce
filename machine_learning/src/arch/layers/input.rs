use std::{collections::HashMap, sync::Arc};

use comms::Communicator;
use data_reader::DataReader;
use log::debug;
use ndarray::{Array2, ArrayView2, Axis};

use super::{Layer, LayerRole};
use crate::{ExecutionMode, MlErr, Result};

/// Loads mini-batches from one data reader per execution mode.
///
/// Every participant reads the whole mini-batch and keeps the samples at the positions
/// `k` for which `k % size == rank`.
pub struct InputLayer {
    name: String,
    comm: Arc<dyn Communicator>,
    readers: HashMap<ExecutionMode, DataReader>,
    samples: Array2<f64>,
    responses: Array2<f64>,
    mini_batch_size: usize,
}

impl InputLayer {
    /// Creates a new `InputLayer`.
    ///
    /// # Arguments
    /// * `name` - The layer's name.
    /// * `comm` - The group this layer belongs to.
    /// * `readers` - The loaded and set up reader of every supported mode.
    pub fn new(
        name: impl Into<String>,
        comm: Arc<dyn Communicator>,
        readers: HashMap<ExecutionMode, DataReader>,
    ) -> Self {
        Self {
            name: name.into(),
            comm,
            readers,
            samples: Array2::zeros((0, 0)),
            responses: Array2::zeros((0, 0)),
            mini_batch_size: 0,
        }
    }

    /// Returns the amount of scalars in a sample, taken from any of the readers.
    pub fn sample_size(&self) -> Option<usize> {
        self.readers.values().map(|r| r.sample_size()).next()
    }

    /// Returns the amount of scalars in a response, taken from any of the readers.
    pub fn response_size(&self) -> Option<usize> {
        self.readers.values().map(|r| r.response_size()).next()
    }

    pub fn readers(&self) -> &HashMap<ExecutionMode, DataReader> {
        &self.readers
    }
}

impl Layer for InputLayer {
    fn name(&self) -> &str {
        &self.name
    }

    fn role(&self) -> LayerRole {
        LayerRole::Input
    }

    fn forward_prop(&mut self, _prev: ArrayView2<f64>, mode: ExecutionMode) -> Result<()> {
        let reader = self.readers.get_mut(&mode).ok_or_else(|| {
            MlErr::Configuration(format!("{} has no data reader for {mode:?}", self.name))
        })?;

        let samples = reader.fetch_data()?;
        let responses = reader.fetch_responses()?;

        let (rank, size) = (self.comm.rank(), self.comm.size());
        let mine: Vec<_> = (0..samples.nrows()).filter(|k| k % size == rank).collect();

        self.mini_batch_size = samples.nrows();
        self.samples = samples.select(Axis(0), &mine);
        self.responses = responses.select(Axis(0), &mine);

        debug!(
            layer = self.name.as_str(),
            mini_batch_size = self.mini_batch_size,
            local = mine.len();
            "loaded mini-batch"
        );

        Ok(())
    }

    fn back_prop(&mut self, _d_out: ArrayView2<f64>) -> Result<Array2<f64>> {
        Ok(Array2::zeros((0, 0)))
    }

    fn activations(&self) -> ArrayView2<'_, f64> {
        self.samples.view()
    }

    fn targets(&self) -> Option<ArrayView2<'_, f64>> {
        Some(self.responses.view())
    }

    fn mini_batch_size(&self) -> Option<usize> {
        Some(self.mini_batch_size)
    }

    fn data_reader_mut(&mut self, mode: ExecutionMode) -> Option<&mut DataReader> {
        self.readers.get_mut(&mode)
    }
}

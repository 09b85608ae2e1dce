use std::sync::Arc;

use comms::Communicator;
use log::debug;
use ndarray::{Array2, ArrayView2};

use super::{
    Metric, Model,
    layers::{Layer, LayerRole},
    objective::{EvalInputs, ObjectiveFunction},
};
use crate::{ExecutionMode, MlErr, Result, Weights};

/// The outcome of a `Sequential::train_step`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StepOutcome {
    pub objective: f64,
    /// Whether the step consumed the last mini-batch of the epoch.
    pub epoch_done: bool,
}

/// A sequential model: information flows forward when computing an output and backward when
/// computing the *deltas* of its layers.
///
/// The first layer must be an input layer, it's targets are the expected outputs of the last
/// layer.
pub struct Sequential {
    comm: Arc<dyn Communicator>,
    mode: ExecutionMode,
    layers: Vec<Box<dyn Layer>>,
    objective: ObjectiveFunction,
    metrics: Vec<Metric>,
    delta: Option<Array2<f64>>,
}

impl Sequential {
    /// Creates a new `Sequential`.
    ///
    /// # Arguments
    /// * `comm` - The group the model is distributed over.
    /// * `layers` - The layers the sequential is composed of.
    /// * `objective` - The objective function.
    ///
    /// # Returns
    /// An error if the first layer isn't an input layer or if it's the only one.
    pub fn new(
        comm: Arc<dyn Communicator>,
        layers: Vec<Box<dyn Layer>>,
        objective: ObjectiveFunction,
    ) -> Result<Self> {
        match layers.first().map(|l| l.role()) {
            Some(LayerRole::Input) if layers.len() > 1 => {}
            _ => {
                return Err(MlErr::Configuration(
                    "a sequential model starts with an input layer followed by compute layers"
                        .into(),
                ));
            }
        }

        Ok(Self {
            comm,
            mode: ExecutionMode::Training,
            layers,
            objective,
            metrics: Vec::new(),
            delta: None,
        })
    }

    pub fn with_metrics(mut self, metrics: Vec<Metric>) -> Self {
        self.metrics = metrics;
        self
    }

    pub fn set_execution_mode(&mut self, mode: ExecutionMode) {
        self.mode = mode;
    }

    pub fn objective(&self) -> &ObjectiveFunction {
        &self.objective
    }

    pub fn metrics(&self) -> &[Metric] {
        &self.metrics
    }

    pub fn layers(&self) -> &[Box<dyn Layer>] {
        &self.layers
    }

    /// Returns the local rows of the last layer's activations.
    pub fn prediction(&self) -> ArrayView2<'_, f64> {
        self.output_layer().activations()
    }

    fn output_layer(&self) -> &dyn Layer {
        // `new` guarantees at least two layers.
        &*self.layers[self.layers.len() - 1]
    }

    fn input_layer(&self) -> &dyn Layer {
        &*self.layers[0]
    }

    fn targets(&self) -> Result<ArrayView2<'_, f64>> {
        self.input_layer().targets().ok_or_else(no_targets)
    }

    fn mini_batch_size(&self) -> usize {
        self.input_layer().mini_batch_size().unwrap_or(0)
    }

    fn locate(&self, index: usize) -> Option<(usize, usize)> {
        let mut rem = index;

        for (i, layer) in self.layers.iter().enumerate() {
            let n = layer.weights().len();
            if rem < n {
                return Some((i, rem));
            }
            rem -= n;
        }

        None
    }

    fn check_layer(&self, layer: usize) -> Result<()> {
        if layer >= self.layers.len() {
            return Err(MlErr::Configuration(format!(
                "layer {layer} out of range for {} layers",
                self.layers.len()
            )));
        }

        Ok(())
    }

    /// Forward props every layer, input layers included.
    pub fn forward_prop(&mut self) -> Result<()> {
        for i in 0..self.layers.len() {
            self.forward_prop_layer(i)?;
        }

        Ok(())
    }

    /// Evaluates the metrics over the current activations.
    pub fn evaluate_metrics(&mut self) -> Result<Vec<f64>> {
        let mini_batch_size = self.mini_batch_size();
        let (comm, mode) = (&*self.comm, self.mode);

        let last = self.layers.len() - 1;
        let prediction = self.layers[last].activations();
        let targets = self.layers[0].targets().ok_or_else(no_targets)?;

        Ok(self
            .metrics
            .iter_mut()
            .map(|m| m.evaluate(comm, mode, prediction, targets, mini_batch_size))
            .collect())
    }

    /// Runs one optimization step over the next mini-batch of the current mode.
    ///
    /// # Returns
    /// The objective's value before the step and whether the epoch is over.
    pub fn train_step(&mut self) -> Result<StepOutcome> {
        self.clear_gradients();
        self.forward_prop()?;

        let objective = self.evaluate_objective()?;
        self.evaluate_metrics()?;
        self.differentiate_objective()?;

        for i in (0..self.layers.len()).rev() {
            self.back_prop_layer(i)?;
        }

        for layer in &mut self.layers {
            for w in layer.weights_mut() {
                w.step()?;
            }
        }

        let mode = self.mode;
        let mut epoch_done = false;

        for layer in &mut self.layers {
            if layer.role() == LayerRole::Input
                && let Some(reader) = layer.data_reader_mut(mode)
            {
                epoch_done |= reader.update();
            }
        }

        debug!(objective = objective, epoch_done = epoch_done; "train step");
        Ok(StepOutcome {
            objective,
            epoch_done,
        })
    }
}

fn no_targets() -> MlErr {
    MlErr::Configuration("the input layer provides no targets".into())
}

impl Model for Sequential {
    fn comm(&self) -> &Arc<dyn Communicator> {
        &self.comm
    }

    fn execution_mode(&self) -> ExecutionMode {
        self.mode
    }

    fn num_layers(&self) -> usize {
        self.layers.len()
    }

    fn layer_role(&self, layer: usize) -> LayerRole {
        self.layers[layer].role()
    }

    fn forward_prop_layer(&mut self, layer: usize) -> Result<()> {
        self.check_layer(layer)?;

        let mode = self.mode;
        let (before, rest) = self.layers.split_at_mut(layer);
        let empty = Array2::<f64>::zeros((0, 0));
        let prev = match before.last() {
            Some(prev) => prev.activations(),
            None => empty.view(),
        };

        rest[0].forward_prop(prev, mode)
    }

    fn back_prop_layer(&mut self, layer: usize) -> Result<()> {
        self.check_layer(layer)?;

        let delta = self.delta.take().ok_or_else(|| {
            MlErr::InvalidState(format!(
                "back prop of layer {layer} without a delta, differentiate the objective first"
            ))
        })?;

        let d_in = self.layers[layer].back_prop(delta.view())?;

        if layer > 0 {
            self.delta = Some(d_in);
        }

        Ok(())
    }

    fn evaluate_objective(&mut self) -> Result<f64> {
        let mini_batch_size = self.mini_batch_size();
        let (layers, objective) = (&self.layers, &mut self.objective);

        let last = layers.len() - 1;
        let inputs = EvalInputs {
            comm: &*self.comm,
            prediction: layers[last].activations(),
            targets: layers[0].targets().ok_or_else(no_targets)?,
            weights: layers.iter().flat_map(|l| l.weights()).collect(),
        };

        objective.start_evaluation(&inputs)?;
        objective.finish_evaluation(self.mode, mini_batch_size)
    }

    fn differentiate_objective(&mut self) -> Result<()> {
        let d = self.objective.differentiate(self.prediction(), self.targets()?);

        let mut weights: Vec<&mut Weights> = self
            .layers
            .iter_mut()
            .flat_map(|l| l.weights_mut().iter_mut())
            .collect();

        self.objective.compute_weight_regularization(&mut weights);
        self.delta = Some(d);
        Ok(())
    }

    fn reset_statistics(&mut self, mode: ExecutionMode) {
        self.objective.reset_statistics(mode);
        self.metrics.iter_mut().for_each(|m| m.reset_statistics(mode));
    }

    fn num_weights(&self) -> usize {
        self.layers.iter().map(|l| l.weights().len()).sum()
    }

    fn weights(&self, index: usize) -> Option<&Weights> {
        let (layer, i) = self.locate(index)?;
        self.layers[layer].weights().get(i)
    }

    fn weights_mut(&mut self, index: usize) -> Option<&mut Weights> {
        let (layer, i) = self.locate(index)?;
        self.layers[layer].weights_mut().get_mut(i)
    }

    fn rewind_readers(&mut self) {
        let mode = self.mode;

        for layer in &mut self.layers {
            if layer.role() == LayerRole::Input
                && let Some(reader) = layer.data_reader_mut(mode)
            {
                reader.set_initial_position();
            }
        }
    }
}

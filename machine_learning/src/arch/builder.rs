use std::{collections::HashMap, sync::Arc};

use comms::Communicator;
use data_reader::DataReader;
use log::debug;
use ndarray::Array2;
use serde::{Deserialize, Serialize};

use super::{
    Metric, MetricKind, Sequential,
    activations::ActFn,
    layers::{Dense, InputLayer, Layer},
    objective::{ObjectiveFunction, ObjectiveTerm},
};
use crate::{
    DistMatrix, ExecutionMode, MlErr, Result, Weights, optimization::OptimizerSpec,
    weights::WeightInit,
};

// Keeps the bias seeds apart from the kernel seeds of every layer.
const BIAS_SEED_SALT: u64 = 0x0b1a_5000_0000_0000;

/// The activation function of a layer.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Activation {
    Sigmoid {
        #[serde(default = "default_amp")]
        amp: f64,
    },
    Relu,
}

fn default_amp() -> f64 {
    1.
}

impl From<Activation> for ActFn {
    fn from(value: Activation) -> Self {
        match value {
            Activation::Sigmoid { amp } => ActFn::sigmoid(amp),
            Activation::Relu => ActFn::relu(),
        }
    }
}

/// A compute layer of a sequential model, the input layer is implicit.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LayerSpec {
    Dense {
        outputs: usize,
        #[serde(default)]
        activation: Option<Activation>,
        #[serde(default = "yes")]
        bias: bool,
        #[serde(default = "default_init")]
        init: WeightInit,
        #[serde(default = "yes")]
        trainable: bool,
    },
}

fn yes() -> bool {
    true
}

fn default_init() -> WeightInit {
    WeightInit::XavierUniform
}

/// Describes a whole sequential model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelSpec {
    pub layers: Vec<LayerSpec>,
    pub objective: Vec<ObjectiveTerm>,
    #[serde(default)]
    pub metrics: Vec<MetricKind>,
    #[serde(default)]
    pub optimizer: OptimizerSpec,
    #[serde(default)]
    pub seed: u64,
}

/// Builds `Sequential` models given a specification.
pub struct ModelBuilder {
    comm: Arc<dyn Communicator>,
}

impl ModelBuilder {
    /// Creates a new `ModelBuilder`.
    ///
    /// # Arguments
    /// * `comm` - The group the built models are distributed over.
    pub fn new(comm: Arc<dyn Communicator>) -> Self {
        Self { comm }
    }

    /// Builds a new `Sequential` following a spec.
    ///
    /// # Arguments
    /// * `spec` - The specification for the model.
    /// * `readers` - The loaded and set up data reader of every supported mode, they must
    ///   agree on the sample and response sizes.
    ///
    /// # Returns
    /// An error if the spec is inconsistent with itself or with the readers.
    pub fn build(
        &self,
        spec: &ModelSpec,
        readers: HashMap<ExecutionMode, DataReader>,
    ) -> Result<Sequential> {
        let (inputs, responses) = self.resolve_io(&readers)?;

        let mut layers: Vec<Box<dyn Layer>> = Vec::with_capacity(spec.layers.len() + 1);
        layers.push(Box::new(InputLayer::new("input", self.comm.clone(), readers)));

        let mut width = inputs;
        for (i, layer_spec) in spec.layers.iter().enumerate() {
            let (layer, outputs) = self.resolve_layer(spec, i, *layer_spec, width)?;
            layers.push(layer);
            width = outputs;
        }

        if width != responses {
            return Err(MlErr::Configuration(format!(
                "the model outputs {width} values per sample but the responses have {responses}"
            )));
        }

        let objective = ObjectiveFunction::new(spec.objective.clone())?;
        let metrics = spec.metrics.iter().map(|&kind| Metric::new(kind)).collect();

        debug!(layers = layers.len(), inputs = inputs, outputs = width; "built sequential model");
        Ok(Sequential::new(self.comm.clone(), layers, objective)?.with_metrics(metrics))
    }

    fn resolve_io(&self, readers: &HashMap<ExecutionMode, DataReader>) -> Result<(usize, usize)> {
        let mut sizes = readers
            .values()
            .map(|r| (r.sample_size(), r.response_size()));

        let Some(first) = sizes.next() else {
            return Err(MlErr::Configuration(
                "a model needs at least one data reader".into(),
            ));
        };

        if sizes.any(|s| s != first) {
            return Err(MlErr::Configuration(
                "the data readers disagree on the sample or response sizes".into(),
            ));
        }

        Ok(first)
    }

    fn resolve_layer(
        &self,
        spec: &ModelSpec,
        index: usize,
        layer_spec: LayerSpec,
        inputs: usize,
    ) -> Result<(Box<dyn Layer>, usize)> {
        match layer_spec {
            LayerSpec::Dense {
                outputs,
                activation,
                bias,
                init,
                trainable,
            } => {
                if outputs == 0 {
                    return Err(MlErr::Configuration(format!(
                        "dense layer {index} has no outputs"
                    )));
                }

                let name = format!("dense{index}");
                let seed = spec.seed.wrapping_add(index as u64);

                let kernel = self.resolve_weights(
                    format!("{name}.kernel"),
                    init.generate(inputs, outputs, seed)?,
                    trainable.then_some(spec.optimizer),
                );

                let bias = bias
                    .then(|| {
                        let values = init.generate(1, outputs, seed ^ BIAS_SEED_SALT)?;
                        Ok::<_, MlErr>(self.resolve_weights(
                            format!("{name}.bias"),
                            values,
                            trainable.then_some(spec.optimizer),
                        ))
                    })
                    .transpose()?;

                let act_fn = activation.map(ActFn::from);
                let dense: Box<dyn Layer> =
                    Box::new(Dense::new(name, act_fn, self.comm.clone(), kernel, bias)?);

                Ok((dense, outputs))
            }
        }
    }

    fn resolve_weights(
        &self,
        name: String,
        values: Array2<f64>,
        optimizer: Option<OptimizerSpec>,
    ) -> Weights {
        let values = DistMatrix::from_global(values.view(), self.comm.rank(), self.comm.size());
        let weights = Weights::new(name, values);

        match optimizer {
            Some(optimizer) => weights.with_optimizer(optimizer.build()),
            None => weights,
        }
    }
}

use std::{collections::HashMap, num::NonZeroUsize, sync::Arc};

use comms::Communicator;
use data_reader::{DataReader, InMemoryDataset, ReaderConfig, ReaderErr, ReaderRole};
use log::info;
use ndarray::Array2;
use rand::{SeedableRng, rngs::StdRng};
use rand_distr::{Distribution, Normal, Uniform};
use serde::{Deserialize, Serialize};

use crate::{
    ExecutionMode, MlErr, Result,
    arch::{ModelBuilder, ModelSpec, Sequential},
    gradient_check::{CheckGradients, CheckGradientsConfig, GradientCheckReport},
};

/// A regression data set generated from a seed, `y = x * c + noise`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyntheticData {
    pub samples: usize,
    pub features: usize,
    #[serde(default = "one")]
    pub responses: usize,
    #[serde(default)]
    pub noise: f64,
    #[serde(default)]
    pub seed: u64,
}

fn one() -> usize {
    1
}

impl SyntheticData {
    /// Generates the data set, identical on every participant.
    pub fn generate(&self) -> Result<InMemoryDataset> {
        let mut rng = StdRng::seed_from_u64(self.seed);

        let uniform = Uniform::new_inclusive(-1., 1.)
            .map_err(|e| MlErr::Configuration(format!("synthetic data: {e}")))?;
        let noise = Normal::new(0., self.noise)
            .map_err(|e| MlErr::Configuration(format!("synthetic data noise: {e}")))?;

        let x = Array2::from_shape_simple_fn((self.samples, self.features), || {
            uniform.sample(&mut rng)
        });
        let c = Array2::from_shape_simple_fn((self.features, self.responses), || {
            uniform.sample(&mut rng)
        });

        let mut y = x.dot(&c);
        y.mapv_inplace(|v| v + noise.sample(&mut rng));

        InMemoryDataset::new(x)
            .with_responses(y)
            .map_err(|e| MlErr::Reader(ReaderErr::from(e)))
    }
}

/// The configuration of a gradient check run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GradCheckConfig {
    #[serde(default = "one_participant")]
    pub participants: NonZeroUsize,
    pub data: SyntheticData,
    pub reader: ReaderConfig,
    pub model: ModelSpec,
    /// The amount of training steps taken before checking.
    #[serde(default)]
    pub warmup_steps: usize,
    #[serde(default)]
    pub check: CheckGradientsConfig,
}

fn one_participant() -> NonZeroUsize {
    NonZeroUsize::MIN
}

/// Builds the model of a single participant, it's training reader is loaded and set up.
pub fn build_model(comm: Arc<dyn Communicator>, config: &GradCheckConfig) -> Result<Sequential> {
    let dataset = config.data.generate()?;

    let mut reader = DataReader::new(config.reader.clone(), ReaderRole::Train, Box::new(dataset))?
        .with_rank(comm.rank());
    reader.load()?;
    reader.setup_default()?;

    let readers = HashMap::from([(ExecutionMode::Training, reader)]);
    ModelBuilder::new(comm).build(&config.model, readers)
}

/// Runs the gradient check on a single participant.
///
/// This is a collective call, every participant of `comm` must run it with the same
/// configuration.
pub fn run_participant(
    comm: Arc<dyn Communicator>,
    config: &GradCheckConfig,
) -> Result<Option<GradientCheckReport>> {
    let check = CheckGradients::new(config.check.clone())?;
    let is_master = comm.is_world_master();
    let mut model = build_model(comm, config)?;

    for step in 0..config.warmup_steps {
        let outcome = model.train_step()?;

        if is_master {
            info!(step = step, objective = outcome.objective, epoch_done = outcome.epoch_done; "warmup step");
        }
    }

    check.check(&mut model)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn synthetic_data_depends_on_the_seed_only() {
        let spec = SyntheticData {
            samples: 8,
            features: 3,
            responses: 2,
            noise: 0.1,
            seed: 5,
        };

        let a = spec.generate().unwrap();
        let b = spec.generate().unwrap();

        assert_eq!(a.len(), 8);
        assert_eq!(a.samples(), b.samples());
        assert!(a.samples().iter().all(|x| (-1. ..=1.).contains(x)));
    }

    #[test]
    fn config_defaults() {
        let json = r#"{
            "data": {"samples": 10, "features": 2},
            "reader": {"batch_size": 4},
            "model": {
                "layers": [{"type": "dense", "outputs": 1}],
                "objective": [{"type": "mean_squared_error", "scale": 1.0}]
            }
        }"#;

        let config: GradCheckConfig = serde_json::from_str(json).unwrap();

        assert_eq!(config.participants.get(), 1);
        assert_eq!(config.data.responses, 1);
        assert_eq!(config.warmup_steps, 0);
        assert_eq!(config.check, CheckGradientsConfig::default());
    }
}

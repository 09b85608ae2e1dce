use ndarray::Array2;
use rand::{Rng, SeedableRng, rngs::StdRng};
use rand_distr::{Distribution, Normal, Uniform};
use serde::{Deserialize, Serialize};

use crate::{MlErr, Result};

/// A `WeightGen` generates values for the initial state of the model's weights.
pub trait WeightGen {
    /// Should sample at most `n` weights.
    ///
    /// # Arguments
    /// * `n` - The upper limit of samples to generate.
    ///
    /// # Returns
    /// `None` if the generator is exhausted.
    fn sample(&mut self, n: usize) -> Option<Vec<f64>>;
}

/// A weight generator that always generates the same value.
pub struct ConstWeightGen {
    value: f64,
    remaining: usize,
}

impl ConstWeightGen {
    /// Creates a new `ConstWeightGen` weight generator.
    ///
    /// # Arguments
    /// * `value` - The value to always generate.
    /// * `limit` - The maximum amount of times to generate that value.
    pub fn new(value: f64, limit: usize) -> Self {
        Self {
            value,
            remaining: limit,
        }
    }
}

impl WeightGen for ConstWeightGen {
    fn sample(&mut self, mut n: usize) -> Option<Vec<f64>> {
        if self.remaining == 0 {
            return None;
        }

        n = n.min(self.remaining);
        self.remaining -= n;
        Some(vec![self.value; n])
    }
}

/// A weight generator that follows a certain probabilistic distribution.
pub struct RandWeightGen<R: Rng, D: Distribution<f64>> {
    rng: R,
    distribution: D,
    remaining: usize,
}

impl<R: Rng, D: Distribution<f64>> RandWeightGen<R, D> {
    /// Creates a new `RandWeightGen` weight generator.
    ///
    /// # Arguments
    /// * `rng` - A random number generator.
    /// * `distribution` - The distribution to sample the random numbers from.
    /// * `limit` - The maximum amount of numbers to generate.
    pub fn new(rng: R, distribution: D, limit: usize) -> Self {
        Self {
            rng,
            distribution,
            remaining: limit,
        }
    }
}

impl<R: Rng> RandWeightGen<R, Uniform<f64>> {
    /// Creates a new `RandWeightGen` weight generator with a uniform distribution.
    ///
    /// # Arguments
    /// * `rng` - A random number generator.
    /// * `limit` - The maximum amount of numbers to generate.
    /// * `low` - The inclusive lower limit.
    /// * `high` - The exclusive upper limit.
    ///
    /// # Returns
    /// An error if the range is invalid (low >= high).
    pub fn uniform(rng: R, limit: usize, low: f64, high: f64) -> Result<Self> {
        let distribution = Uniform::new(low, high)
            .map_err(|e| MlErr::Configuration(format!("uniform [{low}, {high}): {e}")))?;

        Ok(Self::new(rng, distribution, limit))
    }

    /// Creates a new `RandWeightGen` weight generator using Xavier uniform initialization.
    ///
    /// # Arguments
    /// * `rng` - A random number generator.
    /// * `limit` - The maximum amount of numbers to generate.
    /// * `fan_in` - The number of input units in the weight tensor.
    /// * `fan_out` - The number of output units in the weight tensor.
    pub fn xavier_uniform(rng: R, limit: usize, fan_in: usize, fan_out: usize) -> Result<Self> {
        let range = (6. / (fan_in + fan_out) as f64).sqrt();
        Self::uniform(rng, limit, -range, range)
    }
}

impl<R: Rng> RandWeightGen<R, Normal<f64>> {
    /// Creates a new `RandWeightGen` weight generator with a normal distribution.
    ///
    /// # Arguments
    /// * `rng` - A random number generator.
    /// * `limit` - The maximum amount of numbers to generate.
    /// * `mean` - The mean of the distribution.
    /// * `std_dev` - The standard deviation of the distribution.
    ///
    /// # Returns
    /// An error if `std_dev` is not finite (Nan or infinite).
    pub fn normal(rng: R, limit: usize, mean: f64, std_dev: f64) -> Result<Self> {
        let distribution = Normal::new(mean, std_dev)
            .map_err(|e| MlErr::Configuration(format!("normal({mean}, {std_dev}): {e}")))?;

        Ok(Self::new(rng, distribution, limit))
    }
}

impl<R: Rng, D: Distribution<f64>> WeightGen for RandWeightGen<R, D> {
    fn sample(&mut self, mut n: usize) -> Option<Vec<f64>> {
        if self.remaining == 0 {
            return None;
        }

        n = n.min(self.remaining);
        self.remaining -= n;

        let sample = (0..n)
            .map(|_| self.distribution.sample(&mut self.rng))
            .collect();

        Some(sample)
    }
}

/// How a weights matrix is initialized.
///
/// Random initializations are seeded, so every participant generates the same matrix.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WeightInit {
    Constant { value: f64 },
    Uniform { low: f64, high: f64 },
    Normal { mean: f64, std_dev: f64 },
    XavierUniform,
}

impl WeightInit {
    /// Generates a whole `height x width` matrix.
    ///
    /// # Arguments
    /// * `height` - The amount of rows, also the fan in.
    /// * `width` - The amount of columns, also the fan out.
    /// * `seed` - The seed of the random initializations.
    pub fn generate(&self, height: usize, width: usize, seed: u64) -> Result<Array2<f64>> {
        let n = height * width;
        let rng = StdRng::seed_from_u64(seed);

        let mut weight_gen: Box<dyn WeightGen> = match *self {
            WeightInit::Constant { value } => Box::new(ConstWeightGen::new(value, n)),
            WeightInit::Uniform { low, high } => Box::new(RandWeightGen::uniform(rng, n, low, high)?),
            WeightInit::Normal { mean, std_dev } => {
                Box::new(RandWeightGen::normal(rng, n, mean, std_dev)?)
            }
            WeightInit::XavierUniform => {
                Box::new(RandWeightGen::xavier_uniform(rng, n, height, width)?)
            }
        };

        let values = weight_gen.sample(n).unwrap_or_default();
        Array2::from_shape_vec((height, width), values).map_err(|_| MlErr::ShapeMismatch {
            what: "generated weights",
            got: (n, 1),
            expected: (height, width),
        })
    }
}

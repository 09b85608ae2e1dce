use std::num::NonZeroUsize;

use serde::{Deserialize, Serialize};

use crate::{ReaderErr, Result};

/// The role a reader plays in a training session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReaderRole {
    Train,
    Validate,
    Test,
}

/// The configuration of a `DataReader`.
///
/// Subset selection accepts either an absolute `max_sample_count` or a `use_percent`,
/// optionally followed by a `validation_percent` carved out of the remaining samples.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReaderConfig {
    pub batch_size: NonZeroUsize,
    #[serde(default = "default_shuffle")]
    pub shuffle: bool,
    #[serde(default)]
    pub seed: u64,
    #[serde(default)]
    pub max_sample_count: Option<usize>,
    #[serde(default)]
    pub use_percent: Option<f64>,
    #[serde(default)]
    pub validation_percent: Option<f64>,
}

fn default_shuffle() -> bool {
    true
}

impl ReaderConfig {
    /// Creates a new `ReaderConfig` that shuffles and uses every sample.
    ///
    /// # Arguments
    /// * `batch_size` - The nominal mini-batch size.
    pub fn new(batch_size: NonZeroUsize) -> Self {
        Self {
            batch_size,
            shuffle: true,
            seed: 0,
            max_sample_count: None,
            use_percent: None,
            validation_percent: None,
        }
    }

    /// Checks the percentages and their combination.
    ///
    /// # Returns
    /// A `ReaderErr::Configuration` describing the first invalid setting.
    pub fn validate(&self) -> Result<()> {
        if let Some(p) = self.use_percent {
            check_percent("use_percent", p)?;
        }

        if let Some(p) = self.validation_percent {
            check_percent("validation_percent", p)?;
        }

        if self.max_sample_count.is_some() && self.use_percent.is_some() {
            return Err(ReaderErr::Configuration(
                "max_sample_count and use_percent are mutually exclusive".into(),
            ));
        }

        Ok(())
    }

    /// Sets the fraction of the data set to use, `0 <= p <= 1`.
    pub fn set_use_percent(&mut self, p: f64) -> Result<()> {
        check_percent("use_percent", p)?;
        self.use_percent = Some(p);
        Ok(())
    }

    /// Sets the fraction of the selected samples held out for validation, `0 <= p <= 1`.
    pub fn set_validation_percent(&mut self, p: f64) -> Result<()> {
        check_percent("validation_percent", p)?;
        self.validation_percent = Some(p);
        Ok(())
    }

    /// Sets the absolute amount of samples to use.
    pub fn set_max_sample_count(&mut self, count: usize) {
        self.max_sample_count = Some(count);
    }
}

fn check_percent(what: &str, p: f64) -> Result<()> {
    if !(0. ..=1.).contains(&p) {
        return Err(ReaderErr::Configuration(format!(
            "{what} must be within [0, 1], got {p}"
        )));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn percentages_out_of_range_are_rejected() {
        let mut cfg = ReaderConfig::new(NonZeroUsize::new(4).unwrap());

        assert!(matches!(cfg.set_use_percent(1.5), Err(ReaderErr::Configuration(_))));
        assert!(matches!(cfg.set_validation_percent(-0.1), Err(ReaderErr::Configuration(_))));
        assert!(matches!(cfg.set_use_percent(f64::NAN), Err(ReaderErr::Configuration(_))));
        assert!(cfg.use_percent.is_none());

        cfg.set_use_percent(0.5).unwrap();
        cfg.set_validation_percent(0.).unwrap();
        cfg.validate().unwrap();

        cfg.set_max_sample_count(10);
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn deserializes_with_defaults() {
        let cfg: ReaderConfig = serde_json::from_str(r#"{ "batch_size": 8 }"#).unwrap();
        assert_eq!(cfg, ReaderConfig::new(NonZeroUsize::new(8).unwrap()));

        let cfg: ReaderConfig = serde_json::from_str(
            r#"{ "batch_size": 2, "shuffle": false, "seed": 7, "validation_percent": 0.25 }"#,
        )
        .unwrap();
        assert!(!cfg.shuffle);
        assert_eq!(cfg.seed, 7);
        assert_eq!(cfg.validation_percent, Some(0.25));
    }

    #[test]
    fn zero_batch_size_does_not_deserialize() {
        assert!(serde_json::from_str::<ReaderConfig>(r#"{ "batch_size": 0 }"#).is_err());
    }
}

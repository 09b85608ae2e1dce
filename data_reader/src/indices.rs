use std::collections::HashSet;

use log::debug;
use rand::{Rng, seq::SliceRandom};

use crate::{ReaderConfig, ReaderErr, Result};

/// The partition of a data source's sample identifiers into the working set and the
/// unused set.
///
/// Both sets are disjoint and, together, cover every identifier the source reported at
/// load time.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IndexSet {
    shuffled: Vec<usize>,
    unused: Vec<usize>,
}

impl IndexSet {
    /// Creates an `IndexSet` whose working set is `0..total`.
    pub fn new(total: usize) -> Self {
        Self {
            shuffled: (0..total).collect(),
            unused: Vec::new(),
        }
    }

    /// Rebuilds an `IndexSet` from it's two halves.
    ///
    /// # Returns
    /// A `ReaderErr::CorruptState` if an identifier is repeated.
    pub fn from_parts(shuffled: Vec<usize>, unused: Vec<usize>) -> Result<Self> {
        let mut seen = HashSet::with_capacity(shuffled.len() + unused.len());

        if let Some(dup) = shuffled.iter().chain(&unused).find(|&&i| !seen.insert(i)) {
            return Err(ReaderErr::CorruptState(format!(
                "sample index {dup} appears more than once"
            )));
        }

        Ok(Self { shuffled, unused })
    }

    /// Returns the working set, in visiting order.
    #[inline]
    pub fn shuffled(&self) -> &[usize] {
        &self.shuffled
    }

    /// Returns the identifiers excluded from the working set.
    #[inline]
    pub fn unused(&self) -> &[usize] {
        &self.unused
    }

    /// Returns the size of the working set.
    #[inline]
    pub fn len(&self) -> usize {
        self.shuffled.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.shuffled.is_empty()
    }

    /// Returns the size of the whole index universe.
    #[inline]
    pub fn total(&self) -> usize {
        self.shuffled.len() + self.unused.len()
    }

    /// Randomly permutes the working set.
    pub fn shuffle<R: Rng + ?Sized>(&mut self, rng: &mut R) {
        self.shuffled.shuffle(rng);
    }

    /// Moves the identifiers excluded by `config` from the working set into the unused set.
    ///
    /// The working set is first truncated to `max_sample_count` or `use_percent` of it's
    /// size, then `validation_percent` of what is left is taken from it's tail. When
    /// shuffling, the working set is permuted beforehand and both sets are sorted
    /// afterwards.
    ///
    /// # Arguments
    /// * `config` - The reader configuration.
    /// * `rng` - The generator used for the initial permutation.
    ///
    /// # Returns
    /// A `ReaderErr::Configuration` if the configuration is invalid or asks for more
    /// samples than available, in which case nothing is modified.
    pub fn select_subset<R: Rng + ?Sized>(&mut self, config: &ReaderConfig, rng: &mut R) -> Result<()> {
        config.validate()?;

        let available = self.shuffled.len();
        let keep = match (config.max_sample_count, config.use_percent) {
            (Some(count), _) if count > available => {
                return Err(ReaderErr::Configuration(format!(
                    "max_sample_count={count} is greater than the {available} available samples"
                )));
            }
            (Some(count), _) => count,
            (None, Some(p)) => (p * available as f64) as usize,
            (None, None) => available,
        };

        if config.shuffle {
            self.shuffled.shuffle(rng);
        }

        let excluded = self.shuffled.split_off(keep);
        self.unused.extend(excluded);

        if let Some(p) = config.validation_percent {
            let held_out = (p * self.shuffled.len() as f64) as usize;
            let use_me = self.shuffled.len() - held_out;
            let validation = self.shuffled.split_off(use_me);
            self.unused.extend(validation);
        }

        if config.shuffle {
            self.shuffled.sort_unstable();
            self.unused.sort_unstable();
        }

        debug!(
            used = self.shuffled.len(),
            unused = self.unused.len();
            "selected subset of data"
        );

        Ok(())
    }

    /// Replaces the working set with the unused set and empties the latter.
    pub fn use_unused(&mut self) {
        self.shuffled = std::mem::take(&mut self.unused);
    }
}

#[cfg(test)]
mod tests {
    use std::num::NonZeroUsize;

    use rand::{SeedableRng, rngs::StdRng};

    use super::*;

    fn config() -> ReaderConfig {
        ReaderConfig::new(NonZeroUsize::new(4).unwrap())
    }

    fn assert_partition(set: &IndexSet, total: usize) {
        let mut all: Vec<_> = set.shuffled().iter().chain(set.unused()).copied().collect();
        all.sort_unstable();
        assert_eq!(all, (0..total).collect::<Vec<_>>());
    }

    #[test]
    fn use_percent_and_validation_split() {
        let mut set = IndexSet::new(100);
        let mut cfg = config();
        cfg.set_use_percent(0.5).unwrap();
        cfg.set_validation_percent(0.2).unwrap();

        set.select_subset(&cfg, &mut StdRng::seed_from_u64(1)).unwrap();

        assert_eq!(set.len(), 40);
        assert_eq!(set.unused().len(), 60);
        assert!(set.shuffled().is_sorted());
        assert_partition(&set, 100);
    }

    #[test]
    fn max_sample_count_without_shuffle_keeps_the_prefix() {
        let mut set = IndexSet::new(10);
        let mut cfg = config();
        cfg.shuffle = false;
        cfg.set_max_sample_count(6);

        set.select_subset(&cfg, &mut StdRng::seed_from_u64(0)).unwrap();

        assert_eq!(set.shuffled(), [0, 1, 2, 3, 4, 5]);
        assert_eq!(set.unused(), [6, 7, 8, 9]);
    }

    #[test]
    fn too_many_samples_is_a_configuration_error() {
        let mut set = IndexSet::new(10);
        let mut cfg = config();
        cfg.set_max_sample_count(11);

        let err = set.select_subset(&cfg, &mut StdRng::seed_from_u64(0));
        assert!(matches!(err, Err(ReaderErr::Configuration(_))));
        assert_eq!(set, IndexSet::new(10));
    }

    #[test]
    fn selection_is_deterministic_for_a_seed() {
        let mut cfg = config();
        cfg.set_use_percent(0.3).unwrap();

        let mut a = IndexSet::new(50);
        let mut b = IndexSet::new(50);
        a.select_subset(&cfg, &mut StdRng::seed_from_u64(9)).unwrap();
        b.select_subset(&cfg, &mut StdRng::seed_from_u64(9)).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn use_unused_swaps_roles() {
        let mut set = IndexSet::new(10);
        let mut cfg = config();
        cfg.shuffle = false;
        cfg.set_validation_percent(0.3).unwrap();
        set.select_subset(&cfg, &mut StdRng::seed_from_u64(0)).unwrap();

        set.use_unused();
        assert_eq!(set.shuffled(), [7, 8, 9]);
        assert!(set.unused().is_empty());

        set.use_unused();
        assert!(set.is_empty());
        assert_eq!(set.total(), 0);
    }

    #[test]
    fn repeated_identifiers_are_corrupt() {
        assert!(IndexSet::from_parts(vec![0, 1], vec![2]).is_ok());
        assert!(matches!(
            IndexSet::from_parts(vec![0, 1], vec![1]),
            Err(ReaderErr::CorruptState(_))
        ));
    }
}

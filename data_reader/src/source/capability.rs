use std::fmt;

/// Errors produced while accessing data source samples.
#[derive(Debug)]
pub enum DataError {
    /// The requested sample index is out of bounds.
    OutOfBounds { index: usize, len: usize },

    /// The data source could not provide a valid sample.
    InvalidSample(String),
}

impl fmt::Display for DataError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DataError::OutOfBounds { index, len } => {
                write!(f, "sample index {index} is out of bounds for {len} samples")
            }
            DataError::InvalidSample(msg) => write!(f, "invalid sample: {msg}"),
        }
    }
}

impl std::error::Error for DataError {}

/// The outcome of asking a data source for one of it's optional capabilities.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Capability<T = ()> {
    Supported(T),
    Unsupported,
}

impl<T> Capability<T> {
    /// Returns the supported value, if any.
    pub fn supported(self) -> Option<T> {
        match self {
            Capability::Supported(x) => Some(x),
            Capability::Unsupported => None,
        }
    }
}

/// A provider of samples addressed by index.
///
/// Only `load` is mandatory. Every fetching capability answers `Capability::Unsupported`
/// unless the concrete source overrides it, the reader turns those answers into
/// `ReaderErr::NotImplemented`.
pub trait DataSource: Send {
    /// Prepares the source and reports how many samples it holds.
    ///
    /// # Returns
    /// The amount of samples or an error if the source couldn't be loaded.
    fn load(&mut self) -> Result<usize, DataError>;

    /// Returns the amount of scalars in a linearized sample.
    fn sample_size(&self) -> usize {
        0
    }

    /// Returns the amount of scalars in a linearized response.
    fn response_size(&self) -> usize {
        1
    }

    /// Returns the amount of distinct classification labels.
    fn num_labels(&self) -> usize {
        0
    }

    /// Writes the sample at `index` into `out`, `out.len() == sample_size()`.
    fn fetch_sample(&self, _index: usize, _out: &mut [f64]) -> Result<Capability, DataError> {
        Ok(Capability::Unsupported)
    }

    /// Returns the classification label of the sample at `index`.
    fn fetch_label(&self, _index: usize) -> Result<Capability<usize>, DataError> {
        Ok(Capability::Unsupported)
    }

    /// Writes the regression response of the sample at `index` into `out`,
    /// `out.len() == response_size()`.
    fn fetch_response(&self, _index: usize, _out: &mut [f64]) -> Result<Capability, DataError> {
        Ok(Capability::Unsupported)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct CountOnly(usize);

    impl DataSource for CountOnly {
        fn load(&mut self) -> Result<usize, DataError> {
            Ok(self.0)
        }
    }

    #[test]
    fn capabilities_default_to_unsupported() {
        let mut src = CountOnly(3);
        assert_eq!(src.load().unwrap(), 3);

        let mut out = [0.];
        assert_eq!(src.fetch_sample(0, &mut out).unwrap(), Capability::Unsupported);
        assert_eq!(src.fetch_label(0).unwrap(), Capability::Unsupported);
        assert_eq!(src.fetch_response(0, &mut out).unwrap(), Capability::Unsupported);
        assert_eq!(Capability::Supported(4).supported(), Some(4));
    }
}

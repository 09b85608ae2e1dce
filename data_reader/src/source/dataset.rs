use ndarray::{Array2, ArrayView2};

use super::{Capability, DataError, DataSource};

/// A minimal in-memory data source.
///
/// Samples are the rows of a matrix. Responses (regression targets) and labels
/// (classification targets) are optional, asking for a missing one is reported as an
/// unsupported capability.
#[derive(Debug, Clone)]
pub struct InMemoryDataset {
    samples: Array2<f64>,
    responses: Option<Array2<f64>>,
    labels: Option<(Vec<usize>, usize)>,
}

impl InMemoryDataset {
    /// Creates a new dataset without targets.
    ///
    /// # Arguments
    /// * `samples` - One sample per row.
    pub fn new(samples: Array2<f64>) -> Self {
        Self {
            samples,
            responses: None,
            labels: None,
        }
    }

    /// Attaches regression responses, one row per sample.
    ///
    /// # Returns
    /// An error if the amount of rows doesn't match the amount of samples.
    pub fn with_responses(mut self, responses: Array2<f64>) -> Result<Self, DataError> {
        if responses.nrows() != self.samples.nrows() {
            return Err(DataError::InvalidSample(format!(
                "got {} responses for {} samples",
                responses.nrows(),
                self.samples.nrows()
            )));
        }

        self.responses = Some(responses);
        Ok(self)
    }

    /// Attaches classification labels, one per sample.
    ///
    /// # Arguments
    /// * `labels` - The label of each sample.
    /// * `num_labels` - The amount of classes, every label must be below it.
    pub fn with_labels(mut self, labels: Vec<usize>, num_labels: usize) -> Result<Self, DataError> {
        if labels.len() != self.samples.nrows() {
            return Err(DataError::InvalidSample(format!(
                "got {} labels for {} samples",
                labels.len(),
                self.samples.nrows()
            )));
        }

        if let Some(&bad) = labels.iter().find(|&&l| l >= num_labels) {
            return Err(DataError::InvalidSample(format!(
                "label {bad} is not below {num_labels}"
            )));
        }

        self.labels = Some((labels, num_labels));
        Ok(self)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.samples.nrows()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.samples.nrows() == 0
    }

    #[inline]
    pub fn samples(&self) -> ArrayView2<'_, f64> {
        self.samples.view()
    }

    fn check_index(&self, index: usize) -> Result<(), DataError> {
        if index >= self.len() {
            return Err(DataError::OutOfBounds {
                index,
                len: self.len(),
            });
        }

        Ok(())
    }
}

fn copy_row(src: &Array2<f64>, index: usize, out: &mut [f64]) -> Result<(), DataError> {
    if out.len() != src.ncols() {
        return Err(DataError::InvalidSample(format!(
            "destination holds {} values, rows have {}",
            out.len(),
            src.ncols()
        )));
    }

    out.iter_mut()
        .zip(src.row(index))
        .for_each(|(dst, &x)| *dst = x);

    Ok(())
}

impl DataSource for InMemoryDataset {
    fn load(&mut self) -> Result<usize, DataError> {
        Ok(self.len())
    }

    fn sample_size(&self) -> usize {
        self.samples.ncols()
    }

    fn response_size(&self) -> usize {
        self.responses.as_ref().map_or(1, |r| r.ncols())
    }

    fn num_labels(&self) -> usize {
        self.labels.as_ref().map_or(0, |(_, n)| *n)
    }

    fn fetch_sample(&self, index: usize, out: &mut [f64]) -> Result<Capability, DataError> {
        self.check_index(index)?;
        copy_row(&self.samples, index, out)?;
        Ok(Capability::Supported(()))
    }

    fn fetch_label(&self, index: usize) -> Result<Capability<usize>, DataError> {
        let Some((labels, _)) = &self.labels else {
            return Ok(Capability::Unsupported);
        };

        self.check_index(index)?;
        Ok(Capability::Supported(labels[index]))
    }

    fn fetch_response(&self, index: usize, out: &mut [f64]) -> Result<Capability, DataError> {
        let Some(responses) = &self.responses else {
            return Ok(Capability::Unsupported);
        };

        self.check_index(index)?;
        copy_row(responses, index, out)?;
        Ok(Capability::Supported(()))
    }
}

#[cfg(test)]
mod tests {
    use ndarray::array;

    use super::*;

    #[test]
    fn dataset_basic() {
        let mut ds = InMemoryDataset::new(array![[1., 2.], [3., 4.], [5., 6.]])
            .with_responses(array![[10.], [20.], [30.]])
            .unwrap();

        assert_eq!(ds.load().unwrap(), 3);
        assert_eq!(ds.sample_size(), 2);
        assert_eq!(ds.response_size(), 1);

        let mut x = [0.; 2];
        assert!(ds.fetch_sample(1, &mut x).unwrap().supported().is_some());
        assert_eq!(x, [3., 4.]);

        let mut y = [0.];
        ds.fetch_response(2, &mut y).unwrap();
        assert_eq!(y, [30.]);

        assert_eq!(ds.fetch_label(0).unwrap(), Capability::Unsupported);
    }

    #[test]
    fn out_of_bounds_is_an_error() {
        let ds = InMemoryDataset::new(array![[1.]]);
        let mut x = [0.];
        assert!(matches!(
            ds.fetch_sample(1, &mut x),
            Err(DataError::OutOfBounds { index: 1, len: 1 })
        ));
    }

    #[test]
    fn mismatched_targets_are_rejected() {
        let ds = InMemoryDataset::new(array![[1.], [2.]]);
        assert!(ds.clone().with_responses(array![[1.]]).is_err());
        assert!(ds.clone().with_labels(vec![0, 3], 2).is_err());

        let ds = ds.with_labels(vec![1, 0], 2).unwrap();
        assert_eq!(ds.fetch_label(0).unwrap(), Capability::Supported(1));
        assert_eq!(ds.num_labels(), 2);
    }
}

use std::num::NonZeroUsize;

use crate::{ReaderErr, Result};

/// The offsets and strides handed to `DataReader::setup`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StrideParams {
    pub base_offset: usize,
    pub batch_stride: usize,
    pub sample_stride: usize,
    pub model_offset: usize,
}

/// The static placement of a reader among the parallel readers of the parallel models
/// sharing the same working set.
///
/// Every model consumes a contiguous block of `num_readers * batch_size` positions per
/// step, inside of which each reader consumes it's own mini-batch, so no two readers of
/// any model ever fetch the same position within an epoch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReaderPartition {
    pub reader_id: usize,
    pub num_readers: NonZeroUsize,
    pub model_id: usize,
    pub num_models: NonZeroUsize,
}

impl ReaderPartition {
    /// Creates a new `ReaderPartition`.
    ///
    /// # Returns
    /// A `ReaderErr::Configuration` if an id is out of range.
    pub fn new(
        reader_id: usize,
        num_readers: NonZeroUsize,
        model_id: usize,
        num_models: NonZeroUsize,
    ) -> Result<Self> {
        if reader_id >= num_readers.get() {
            return Err(ReaderErr::Configuration(format!(
                "reader_id {reader_id} out of range for {num_readers} readers"
            )));
        }

        if model_id >= num_models.get() {
            return Err(ReaderErr::Configuration(format!(
                "model_id {model_id} out of range for {num_models} models"
            )));
        }

        Ok(Self {
            reader_id,
            num_readers,
            model_id,
            num_models,
        })
    }

    /// The partition of a lone reader.
    pub fn single() -> Self {
        Self {
            reader_id: 0,
            num_readers: NonZeroUsize::MIN,
            model_id: 0,
            num_models: NonZeroUsize::MIN,
        }
    }

    #[inline]
    fn step_span(self, batch_size: usize) -> usize {
        self.num_readers.get() * batch_size
    }

    /// Lays readers out as consecutive runs of `batch_size` positions.
    ///
    /// # Arguments
    /// * `batch_size` - The per-reader mini-batch size.
    pub fn blocked(self, batch_size: usize) -> StrideParams {
        let span = self.step_span(batch_size);

        StrideParams {
            base_offset: self.reader_id * batch_size,
            batch_stride: span * self.num_models.get(),
            sample_stride: 1,
            model_offset: self.model_id * span,
        }
    }

    /// Interleaves readers sample by sample, reader `r` taking every `num_readers`-th
    /// position starting at `r`.
    ///
    /// # Arguments
    /// * `batch_size` - The per-reader mini-batch size.
    pub fn interleaved(self, batch_size: usize) -> StrideParams {
        let span = self.step_span(batch_size);

        StrideParams {
            base_offset: self.reader_id,
            batch_stride: span * self.num_models.get(),
            sample_stride: self.num_readers.get(),
            model_offset: self.model_id * span,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn nz(n: usize) -> NonZeroUsize {
        NonZeroUsize::new(n).unwrap()
    }

    #[test]
    fn ids_out_of_range_are_rejected() {
        assert!(ReaderPartition::new(2, nz(2), 0, nz(1)).is_err());
        assert!(ReaderPartition::new(0, nz(2), 1, nz(1)).is_err());
    }

    #[test]
    fn blocked_layout() {
        let p = ReaderPartition::new(1, nz(3), 1, nz(2)).unwrap();
        assert_eq!(
            p.blocked(4),
            StrideParams {
                base_offset: 4,
                batch_stride: 24,
                sample_stride: 1,
                model_offset: 12,
            }
        );
    }

    #[test]
    fn interleaved_layout() {
        let p = ReaderPartition::new(2, nz(3), 0, nz(1)).unwrap();
        assert_eq!(
            p.interleaved(4),
            StrideParams {
                base_offset: 2,
                batch_stride: 12,
                sample_stride: 3,
                model_offset: 0,
            }
        );

        assert_eq!(
            ReaderPartition::single().blocked(8),
            StrideParams {
                base_offset: 0,
                batch_stride: 8,
                sample_stride: 1,
                model_offset: 0,
            }
        );
    }
}

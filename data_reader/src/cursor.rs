use log::warn;

use crate::{ReaderErr, Result};

/// Where a cursor stands within an epoch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CursorState {
    /// Inside the regular-sized mini-batches.
    Ready,
    /// At or past the last mini-batch threshold.
    LastBatch,
    /// The position is beyond the working set.
    EpochEnd,
}

/// The last mini-batch layout derived from the working set size and the strides.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EpochPlan {
    pub num_mini_batches_per_reader: usize,
    pub num_iterations_per_epoch: usize,
    pub last_mini_batch_threshold: usize,
    pub last_mini_batch_size: usize,
    pub last_mini_batch_stride: usize,
}

/// The mini-batch position of a reader within it's working set.
///
/// The cursor only does position arithmetic, the working set length is passed in by the
/// owner of the indices.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MiniBatchCursor {
    pub(crate) batch_size: usize,
    pub(crate) current_pos: usize,
    pub(crate) batch_stride: usize,
    pub(crate) base_offset: usize,
    pub(crate) model_offset: usize,
    pub(crate) sample_stride: usize,
    pub(crate) last_mini_batch_threshold: usize,
    pub(crate) last_mini_batch_size: usize,
    pub(crate) last_mini_batch_stride: usize,
    pub(crate) current_mini_batch_idx: usize,
    pub(crate) num_mini_batches_per_reader: usize,
    pub(crate) num_iterations_per_epoch: usize,
    pub(crate) derived_iterations: Option<usize>,
}

impl MiniBatchCursor {
    /// Creates a new `MiniBatchCursor` laid out for a single reader.
    ///
    /// # Arguments
    /// * `batch_size` - The nominal mini-batch size, must be positive.
    pub fn new(batch_size: usize) -> Result<Self> {
        let mut cursor = Self {
            batch_size,
            current_pos: 0,
            batch_stride: batch_size,
            base_offset: 0,
            model_offset: 0,
            sample_stride: 1,
            last_mini_batch_threshold: usize::MAX,
            last_mini_batch_size: batch_size,
            last_mini_batch_stride: batch_size,
            current_mini_batch_idx: 0,
            num_mini_batches_per_reader: 0,
            num_iterations_per_epoch: 0,
            derived_iterations: None,
        };

        cursor.setup(0, batch_size, 1, 0)?;
        Ok(cursor)
    }

    /// Resets the cursor for a new layout.
    ///
    /// # Arguments
    /// * `base_offset` - The first position of this reader.
    /// * `batch_stride` - The distance between two consecutive mini-batches of this reader.
    /// * `sample_stride` - The distance between two samples of the same mini-batch.
    /// * `model_offset` - The extra offset of this reader's model.
    ///
    /// # Returns
    /// A `ReaderErr::Configuration` if a size or stride is zero, the cursor is left
    /// untouched in that case.
    pub fn setup(
        &mut self,
        base_offset: usize,
        batch_stride: usize,
        sample_stride: usize,
        model_offset: usize,
    ) -> Result<()> {
        if self.batch_size == 0 {
            return Err(ReaderErr::Configuration("batch_size must be positive".into()));
        }

        if batch_stride == 0 {
            return Err(ReaderErr::Configuration("batch_stride must be positive".into()));
        }

        if sample_stride == 0 {
            return Err(ReaderErr::Configuration("sample_stride must be positive".into()));
        }

        self.base_offset = base_offset;
        self.batch_stride = batch_stride;
        self.sample_stride = sample_stride;
        self.model_offset = model_offset;
        self.clear_plan();
        self.set_initial_position();
        Ok(())
    }

    /// Forgets the last mini-batch layout, every mini-batch is regular sized afterwards.
    fn clear_plan(&mut self) {
        self.last_mini_batch_threshold = usize::MAX;
        self.last_mini_batch_size = self.batch_size;
        self.last_mini_batch_stride = self.batch_stride;
        self.num_mini_batches_per_reader = 0;
        self.num_iterations_per_epoch = 0;
        self.derived_iterations = None;
    }

    /// Adapts the cursor to a working set of a new size and rewinds it.
    ///
    /// A derived epoch plan is derived again for `len`, any other last mini-batch layout
    /// is dropped.
    ///
    /// # Arguments
    /// * `len` - The size of the new working set.
    pub fn resize(&mut self, len: usize) {
        let planned = self.derived_iterations.is_some();
        self.clear_plan();

        if planned {
            self.plan_epoch(len);
        }

        self.rewind(len);
    }

    /// Moves to the initial position of the layout.
    ///
    /// The position isn't bounded by a working set here, owners of one use `rewind`.
    pub fn set_initial_position(&mut self) {
        self.current_pos = self.initial_position();
        self.current_mini_batch_idx = 0;
    }

    /// Rewinds to the first mini-batch of the epoch within a working set of `len` samples.
    ///
    /// A reader whose initial position lies past the working set is left at `len`, where
    /// it's already at the end of the epoch.
    pub fn rewind(&mut self, len: usize) {
        self.set_initial_position();
        self.current_pos = self.current_pos.min(len);
    }

    #[inline]
    pub fn initial_position(&self) -> usize {
        self.base_offset + self.model_offset
    }

    /// Returns whether the cursor has crossed the last mini-batch threshold.
    #[inline]
    fn in_last_batch(&self) -> bool {
        self.current_pos >= self.last_mini_batch_threshold
    }

    #[inline]
    fn current_stride(&self) -> usize {
        if self.in_last_batch() {
            self.last_mini_batch_stride
        } else {
            self.batch_stride
        }
    }

    /// Returns the state of the cursor relative to a working set of `len` samples.
    pub fn state(&self, len: usize) -> CursorState {
        if self.current_pos >= len {
            CursorState::EpochEnd
        } else if self.in_last_batch() {
            CursorState::LastBatch
        } else {
            CursorState::Ready
        }
    }

    /// Returns the position `update` would move to.
    pub fn next_position(&self) -> usize {
        self.current_pos.saturating_add(self.current_stride())
    }

    /// Returns the size of the current mini-batch.
    pub fn current_mini_batch_size(&self) -> usize {
        if self.in_last_batch() {
            self.last_mini_batch_size
        } else {
            self.batch_size
        }
    }

    /// Advances to the next mini-batch.
    ///
    /// Once the last mini-batch threshold is crossed every advance uses the last
    /// mini-batch stride.
    ///
    /// # Arguments
    /// * `len` - The size of the working set.
    ///
    /// # Returns
    /// `true` if the advance completed the epoch, in which case the cursor is already
    /// rewound.
    pub fn update(&mut self, len: usize) -> bool {
        self.current_pos = self.next_position();

        if self.current_pos >= len {
            self.rewind(len);
            return true;
        }

        self.current_mini_batch_idx += 1;
        false
    }

    /// The positions of the current mini-batch's samples within the working set.
    ///
    /// # Arguments
    /// * `len` - The size of the working set.
    pub fn positions(&self, len: usize) -> impl Iterator<Item = usize> + use<> {
        let (start, stride) = (self.current_pos, self.sample_stride);

        (0..self.current_mini_batch_size())
            .map(move |k| start + k * stride)
            .take_while(move |&pos| pos < len)
    }

    /// Derives the layout of the epoch's last mini-batch from the strides.
    ///
    /// The derived global iteration count becomes the reference for
    /// `set_num_iterations_per_epoch`.
    ///
    /// # Arguments
    /// * `len` - The size of the working set.
    ///
    /// # Returns
    /// The derived plan, already applied to the cursor.
    pub fn plan_epoch(&mut self, len: usize) -> EpochPlan {
        let start = self.initial_position();
        let num_mini_batches = match len.checked_sub(start) {
            Some(span) if span > 0 => span.div_ceil(self.batch_stride),
            _ => 0,
        };

        let (threshold, last_size) = match num_mini_batches {
            0 => (usize::MAX, self.batch_size),
            n => {
                let threshold = start + (n - 1) * self.batch_stride;
                let available = (len - threshold).div_ceil(self.sample_stride);
                (threshold, available.min(self.batch_size))
            }
        };

        let iterations = len
            .saturating_sub(self.model_offset)
            .div_ceil(self.batch_stride);

        let plan = EpochPlan {
            num_mini_batches_per_reader: num_mini_batches,
            num_iterations_per_epoch: iterations,
            last_mini_batch_threshold: threshold,
            last_mini_batch_size: last_size,
            last_mini_batch_stride: self.batch_stride,
        };

        self.num_mini_batches_per_reader = num_mini_batches;
        self.num_iterations_per_epoch = iterations;
        self.derived_iterations = Some(iterations);
        self.last_mini_batch_threshold = threshold;
        self.last_mini_batch_size = last_size;
        self.last_mini_batch_stride = self.batch_stride;
        plan
    }

    /// Sets the amount of iterations every reader executes per epoch.
    ///
    /// # Returns
    /// A `ReaderErr::Configuration` if an epoch plan exists and derived a different count.
    pub fn set_num_iterations_per_epoch(&mut self, n: usize) -> Result<()> {
        if let Some(derived) = self.derived_iterations.filter(|&d| d != n) {
            warn!(derived = derived, given = n; "iteration count disagrees with epoch plan");
            return Err(ReaderErr::Configuration(format!(
                "num_iterations_per_epoch={n} disagrees with the {derived} iterations derived from the strides"
            )));
        }

        self.num_iterations_per_epoch = n;
        Ok(())
    }

    pub fn set_last_mini_batch_threshold(&mut self, threshold: usize) {
        self.last_mini_batch_threshold = threshold;
    }

    pub fn set_last_mini_batch_size(&mut self, size: usize) {
        self.last_mini_batch_size = size;
    }

    /// Sets the stride used once the last mini-batch threshold is crossed.
    ///
    /// # Returns
    /// A `ReaderErr::Configuration` if `stride` is zero.
    pub fn set_last_mini_batch_stride(&mut self, stride: usize) -> Result<()> {
        if stride == 0 {
            return Err(ReaderErr::Configuration(
                "last_mini_batch_stride must be positive".into(),
            ));
        }

        self.last_mini_batch_stride = stride;
        Ok(())
    }

    pub fn set_num_mini_batches_per_reader(&mut self, n: usize) {
        self.num_mini_batches_per_reader = n;
    }

    #[inline]
    pub fn position(&self) -> usize {
        self.current_pos
    }

    #[inline]
    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    #[inline]
    pub fn batch_stride(&self) -> usize {
        self.batch_stride
    }

    #[inline]
    pub fn base_offset(&self) -> usize {
        self.base_offset
    }

    #[inline]
    pub fn model_offset(&self) -> usize {
        self.model_offset
    }

    #[inline]
    pub fn sample_stride(&self) -> usize {
        self.sample_stride
    }

    #[inline]
    pub fn last_mini_batch_threshold(&self) -> usize {
        self.last_mini_batch_threshold
    }

    #[inline]
    pub fn last_mini_batch_size(&self) -> usize {
        self.last_mini_batch_size
    }

    #[inline]
    pub fn last_mini_batch_stride(&self) -> usize {
        self.last_mini_batch_stride
    }

    #[inline]
    pub fn current_mini_batch_idx(&self) -> usize {
        self.current_mini_batch_idx
    }

    #[inline]
    pub fn num_mini_batches_per_reader(&self) -> usize {
        self.num_mini_batches_per_reader
    }

    #[inline]
    pub fn num_iterations_per_epoch(&self) -> usize {
        self.num_iterations_per_epoch
    }
}

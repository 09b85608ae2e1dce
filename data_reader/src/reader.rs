use comms::{CheckpointSink, CheckpointSource, Serialize};
use log::{debug, info};
use ndarray::Array2;
use rand::{SeedableRng, rngs::StdRng};

use crate::{
    CursorState, EpochPlan, IndexSet, MiniBatchCursor, ReaderConfig, ReaderErr, ReaderRole,
    Result, StrideParams,
    checkpoint::ReaderState,
    source::{Capability, DataError, DataSource},
};

/// Mixed into the seed of the subset selection so it doesn't replay the epoch 0 shuffle.
const SUBSET_SALT: u64 = 0x5eed_5e1e_c7ed_0001;

/// A reader of mini-batches over a data source.
///
/// Combines the index partition, the mini-batch cursor walking it and the epoch counter
/// driving the deterministic reshuffles.
pub struct DataReader {
    config: ReaderConfig,
    role: ReaderRole,
    source: Box<dyn DataSource>,
    indices: IndexSet,
    cursor: MiniBatchCursor,
    epoch: u64,
    rank: usize,
    master: bool,
    indices_fetched_per_mb: Vec<usize>,
}

impl DataReader {
    /// Creates a new `DataReader`, the source isn't loaded until `load` is called.
    ///
    /// # Arguments
    /// * `config` - The reader configuration.
    /// * `role` - The role of this reader.
    /// * `source` - The source of the samples.
    ///
    /// # Returns
    /// A `ReaderErr::Configuration` if the configuration is invalid.
    pub fn new(config: ReaderConfig, role: ReaderRole, source: Box<dyn DataSource>) -> Result<Self> {
        config.validate()?;
        let cursor = MiniBatchCursor::new(config.batch_size.get())?;

        Ok(Self {
            config,
            role,
            source,
            indices: IndexSet::default(),
            cursor,
            epoch: 0,
            rank: 0,
            master: true,
            indices_fetched_per_mb: Vec::new(),
        })
    }

    /// Sets the rank of the participant owning this reader.
    pub fn with_rank(mut self, rank: usize) -> Self {
        self.rank = rank;
        self.master = rank == 0;
        self
    }

    /// Loads the data source and selects the configured subset of it's samples.
    ///
    /// # Returns
    /// A `ReaderErr::Configuration` if the subset can't be selected, in which case the
    /// index sets, the cursor and the epoch are left untouched.
    pub fn load(&mut self) -> Result<usize> {
        let total = self.source.load()?;
        let mut indices = IndexSet::new(total);
        indices.select_subset(&self.config, &mut self.subset_rng())?;

        self.indices = indices;
        self.epoch = 0;
        self.cursor.resize(self.indices.len());

        if self.master {
            info!(role:? = self.role, total = total, used = self.indices.len(); "loaded data source");
        }

        Ok(self.indices.len())
    }

    /// Moves the samples excluded by the configuration into the unused set.
    ///
    /// # Returns
    /// A `ReaderErr::Configuration` if the configuration can't be satisfied, in which
    /// case the index sets are left untouched.
    pub fn select_subset_of_data(&mut self) -> Result<()> {
        let mut rng = self.subset_rng();
        self.indices.select_subset(&self.config, &mut rng)?;
        self.cursor.resize(self.indices.len());
        Ok(())
    }

    fn subset_rng(&self) -> StdRng {
        StdRng::seed_from_u64(self.config.seed ^ SUBSET_SALT)
    }

    /// Makes the unused samples the working set, leaving the unused set empty.
    ///
    /// The cursor is rewound and a planned epoch is planned again for the new working set.
    pub fn use_unused_index_set(&mut self) {
        self.indices.use_unused();
        self.cursor.resize(self.indices.len());
        debug!(role:? = self.role, used = self.indices.len(); "switched to unused index set");
    }

    /// Resets the cursor for a new layout and shuffles the working set.
    ///
    /// # Arguments
    /// * `base_offset` - The first position of this reader.
    /// * `batch_stride` - The distance between two consecutive mini-batches of this reader.
    /// * `sample_stride` - The distance between two samples of the same mini-batch.
    /// * `model_offset` - The extra offset of this reader's model.
    pub fn setup(
        &mut self,
        base_offset: usize,
        batch_stride: usize,
        sample_stride: usize,
        model_offset: usize,
    ) -> Result<()> {
        self.cursor
            .setup(base_offset, batch_stride, sample_stride, model_offset)?;
        self.cursor.rewind(self.indices.len());
        self.indices_fetched_per_mb.clear();
        self.shuffle();

        debug!(
            base_offset = base_offset,
            batch_stride = batch_stride,
            sample_stride = sample_stride,
            model_offset = model_offset;
            "reader setup"
        );

        Ok(())
    }

    /// Same as `setup(0, batch_size, 1, 0)`.
    pub fn setup_default(&mut self) -> Result<()> {
        self.setup(0, self.cursor.batch_size(), 1, 0)
    }

    /// Same as `setup` with the parameters of a `ReaderPartition`.
    pub fn setup_partition(&mut self, params: StrideParams) -> Result<()> {
        let StrideParams {
            base_offset,
            batch_stride,
            sample_stride,
            model_offset,
        } = params;

        self.setup(base_offset, batch_stride, sample_stride, model_offset)
    }

    fn shuffle(&mut self) {
        if self.config.shuffle {
            let mut rng = StdRng::seed_from_u64(self.config.seed.wrapping_add(self.epoch));
            self.indices.shuffle(&mut rng);
        }
    }

    /// Advances to the next mini-batch.
    ///
    /// # Returns
    /// `true` if this call completed the epoch, the working set is already reshuffled for
    /// the next one in that case.
    pub fn update(&mut self) -> bool {
        self.indices_fetched_per_mb.clear();

        if !self.cursor.update(self.indices.len()) {
            return false;
        }

        self.epoch += 1;
        self.shuffle();
        debug!(role:? = self.role, epoch = self.epoch; "epoch completed");
        true
    }

    /// Rewinds to the first mini-batch of the epoch without reshuffling.
    pub fn set_initial_position(&mut self) {
        self.cursor.rewind(self.indices.len());
        self.indices_fetched_per_mb.clear();
    }

    #[inline]
    pub fn position_valid(&self) -> bool {
        self.cursor.position() < self.indices.len()
    }

    #[inline]
    pub fn at_new_epoch(&self) -> bool {
        self.cursor.current_mini_batch_idx() == 0
    }

    #[inline]
    pub fn position(&self) -> usize {
        self.cursor.position()
    }

    #[inline]
    pub fn next_position(&self) -> usize {
        self.cursor.next_position()
    }

    #[inline]
    pub fn state(&self) -> CursorState {
        self.cursor.state(self.indices.len())
    }

    #[inline]
    pub fn current_mini_batch_size(&self) -> usize {
        self.cursor.current_mini_batch_size()
    }

    /// Returns the sample identifiers of the current mini-batch.
    pub fn mini_batch_indices(&self) -> Vec<usize> {
        let shuffled = self.indices.shuffled();

        self.cursor
            .positions(shuffled.len())
            .map(|pos| shuffled[pos])
            .collect()
    }

    /// Fetches the samples of the current mini-batch, one per row.
    ///
    /// # Returns
    /// A `ReaderErr::NotImplemented` if the source can't provide samples.
    pub fn fetch_data(&mut self) -> Result<Array2<f64>> {
        let ids = self.mini_batch_indices();
        let source = &self.source;
        let out = fetch_rows(&ids, source.sample_size(), "fetch_sample", |id, dst| {
            source.fetch_sample(id, dst)
        })?;

        self.indices_fetched_per_mb = ids;
        Ok(out)
    }

    /// Fetches the regression responses of the current mini-batch, one per row.
    ///
    /// # Returns
    /// A `ReaderErr::NotImplemented` if the source can't provide responses.
    pub fn fetch_responses(&self) -> Result<Array2<f64>> {
        let ids = self.mini_batch_indices();
        let source = &self.source;

        fetch_rows(&ids, source.response_size(), "fetch_response", |id, dst| {
            source.fetch_response(id, dst)
        })
    }

    /// Fetches the classification labels of the current mini-batch.
    ///
    /// # Returns
    /// A `ReaderErr::NotImplemented` if the source can't provide labels.
    pub fn fetch_labels(&self) -> Result<Vec<usize>> {
        self.mini_batch_indices()
            .into_iter()
            .map(|id| {
                self.source
                    .fetch_label(id)?
                    .supported()
                    .ok_or(ReaderErr::NotImplemented {
                        capability: "fetch_label",
                    })
            })
            .collect()
    }

    /// Derives the epoch's last mini-batch layout from the working set and the strides.
    pub fn plan_epoch(&mut self) -> EpochPlan {
        let plan = self.cursor.plan_epoch(self.indices.len());
        debug!(
            mini_batches = plan.num_mini_batches_per_reader,
            iterations = plan.num_iterations_per_epoch,
            threshold = plan.last_mini_batch_threshold,
            last_size = plan.last_mini_batch_size;
            "planned epoch"
        );
        plan
    }

    pub fn set_last_mini_batch_threshold(&mut self, threshold: usize) {
        self.cursor.set_last_mini_batch_threshold(threshold);
    }

    pub fn set_last_mini_batch_size(&mut self, size: usize) {
        self.cursor.set_last_mini_batch_size(size);
    }

    pub fn set_last_mini_batch_stride(&mut self, stride: usize) -> Result<()> {
        self.cursor.set_last_mini_batch_stride(stride)
    }

    pub fn set_num_mini_batches_per_reader(&mut self, n: usize) {
        self.cursor.set_num_mini_batches_per_reader(n);
    }

    pub fn set_num_iterations_per_epoch(&mut self, n: usize) -> Result<()> {
        self.cursor.set_num_iterations_per_epoch(n)
    }

    #[inline]
    pub fn num_iterations_per_epoch(&self) -> usize {
        self.cursor.num_iterations_per_epoch()
    }

    #[inline]
    pub fn cursor(&self) -> &MiniBatchCursor {
        &self.cursor
    }

    #[inline]
    pub fn config(&self) -> &ReaderConfig {
        &self.config
    }

    #[inline]
    pub fn role(&self) -> ReaderRole {
        self.role
    }

    #[inline]
    pub fn rank(&self) -> usize {
        self.rank
    }

    #[inline]
    pub fn is_master(&self) -> bool {
        self.master
    }

    #[inline]
    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    #[inline]
    pub fn index_set(&self) -> &IndexSet {
        &self.indices
    }

    #[inline]
    pub fn indices(&self) -> &[usize] {
        self.indices.shuffled()
    }

    #[inline]
    pub fn unused_indices(&self) -> &[usize] {
        self.indices.unused()
    }

    #[inline]
    pub fn num_data(&self) -> usize {
        self.indices.len()
    }

    #[inline]
    pub fn num_unused_data(&self) -> usize {
        self.indices.unused().len()
    }

    /// The identifiers fetched by the last `fetch_data` of the current mini-batch.
    #[inline]
    pub fn indices_fetched_per_mb(&self) -> &[usize] {
        &self.indices_fetched_per_mb
    }

    #[inline]
    pub fn sample_size(&self) -> usize {
        self.source.sample_size()
    }

    #[inline]
    pub fn response_size(&self) -> usize {
        self.source.response_size()
    }

    /// Writes the index sets, the cursor and the epoch as the blob `name`.
    ///
    /// # Returns
    /// The amount of bytes written.
    pub fn save_checkpoint<S>(&self, sink: &mut S, name: &str) -> Result<usize>
    where
        S: CheckpointSink + ?Sized,
    {
        let state = ReaderState {
            indices: self.indices.clone(),
            cursor: self.cursor.clone(),
            epoch: self.epoch,
            seed: self.config.seed,
        };

        let mut buf = Vec::new();
        state.serialize(&mut buf);
        let n = sink.write_blob(name, &buf)?;

        debug!(name = name, bytes = n, epoch = self.epoch; "saved reader checkpoint");
        Ok(n)
    }

    /// Restores the state written by `save_checkpoint` under `name`.
    ///
    /// # Returns
    /// The amount of bytes read, or a `ReaderErr::CorruptState` if the blob is malformed,
    /// in which case the reader is left untouched.
    pub fn load_checkpoint<S>(&mut self, source: &S, name: &str) -> Result<usize>
    where
        S: CheckpointSource + ?Sized,
    {
        let buf = source.read_blob(name)?;
        let state = ReaderState::decode(&buf)?;

        self.indices = state.indices;
        self.cursor = state.cursor;
        self.epoch = state.epoch;
        self.config.seed = state.seed;
        self.indices_fetched_per_mb.clear();

        debug!(name = name, bytes = buf.len(), epoch = self.epoch; "loaded reader checkpoint");
        Ok(buf.len())
    }
}

/// Fills one row per identifier through `fetch`.
fn fetch_rows<F>(
    ids: &[usize],
    width: usize,
    capability: &'static str,
    mut fetch: F,
) -> Result<Array2<f64>>
where
    F: FnMut(usize, &mut [f64]) -> std::result::Result<Capability, DataError>,
{
    let mut buf = vec![0.; ids.len() * width];

    // Zero sized rows still ask the source, it may not support the capability at all.
    for (k, &id) in ids.iter().enumerate() {
        let dst = &mut buf[k * width..(k + 1) * width];
        fetch(id, dst)?
            .supported()
            .ok_or(ReaderErr::NotImplemented { capability })?;
    }

    Array2::from_shape_vec((ids.len(), width), buf)
        .map_err(|e| DataError::InvalidSample(e.to_string()).into())
}

use std::io;

use comms::{
    Deserialize, Serialize,
    persist::{BlobReader, write_u64, write_u64_slice},
};

use crate::{IndexSet, MiniBatchCursor, ReaderErr, Result};

const MAGIC: &[u8; 4] = b"IDX1";
const NONE: u64 = u64::MAX;

/// Everything needed to resume index scheduling exactly where it stopped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct ReaderState {
    pub(crate) indices: IndexSet,
    pub(crate) cursor: MiniBatchCursor,
    pub(crate) epoch: u64,
    pub(crate) seed: u64,
}

fn encode_usize(x: usize) -> u64 {
    if x == usize::MAX { NONE } else { x as u64 }
}

fn decode_usize(x: u64) -> io::Result<usize> {
    if x == NONE {
        return Ok(usize::MAX);
    }

    usize::try_from(x).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
}

impl Serialize for ReaderState {
    fn serialize(&self, buf: &mut Vec<u8>) {
        let c = &self.cursor;

        buf.extend_from_slice(MAGIC);
        write_u64(buf, self.epoch);
        write_u64(buf, self.seed);

        for field in [
            c.batch_size,
            c.current_pos,
            c.batch_stride,
            c.base_offset,
            c.model_offset,
            c.sample_stride,
            c.last_mini_batch_threshold,
            c.last_mini_batch_size,
            c.last_mini_batch_stride,
            c.current_mini_batch_idx,
            c.num_mini_batches_per_reader,
            c.num_iterations_per_epoch,
            c.derived_iterations.unwrap_or(usize::MAX),
        ] {
            write_u64(buf, encode_usize(field));
        }

        let to_u64 = |xs: &[usize]| xs.iter().map(|&x| x as u64).collect::<Vec<_>>();
        write_u64_slice(buf, &to_u64(self.indices.shuffled()));
        write_u64_slice(buf, &to_u64(self.indices.unused()));
    }
}

impl Deserialize for ReaderState {
    fn deserialize(buf: &[u8]) -> io::Result<Self> {
        let mut reader = BlobReader::new(buf);

        if reader.read_bytes(MAGIC.len())? != MAGIC {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                "not a reader checkpoint",
            ));
        }

        let epoch = reader.read_u64()?;
        let seed = reader.read_u64()?;

        let mut fields = [0usize; 13];
        for field in &mut fields {
            *field = decode_usize(reader.read_u64()?)?;
        }

        let [
            batch_size,
            current_pos,
            batch_stride,
            base_offset,
            model_offset,
            sample_stride,
            last_mini_batch_threshold,
            last_mini_batch_size,
            last_mini_batch_stride,
            current_mini_batch_idx,
            num_mini_batches_per_reader,
            num_iterations_per_epoch,
            derived_iterations,
        ] = fields;

        let shuffled = decode_indices(reader.read_u64_slice()?)?;
        let unused = decode_indices(reader.read_u64_slice()?)?;
        reader.finish()?;

        let indices = IndexSet::from_parts(shuffled, unused)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e.to_string()))?;

        let cursor = MiniBatchCursor {
            batch_size,
            current_pos,
            batch_stride,
            base_offset,
            model_offset,
            sample_stride,
            last_mini_batch_threshold,
            last_mini_batch_size,
            last_mini_batch_stride,
            current_mini_batch_idx,
            num_mini_batches_per_reader,
            num_iterations_per_epoch,
            derived_iterations: (derived_iterations != usize::MAX).then_some(derived_iterations),
        };

        Ok(Self {
            indices,
            cursor,
            epoch,
            seed,
        })
    }
}

fn decode_indices(raw: Vec<u64>) -> io::Result<Vec<usize>> {
    raw.into_iter().map(decode_usize).collect()
}

impl ReaderState {
    /// Decodes a checkpoint blob and checks the cursor against the index sets.
    ///
    /// # Returns
    /// A `ReaderErr::CorruptState` if the blob is malformed or inconsistent.
    pub(crate) fn decode(buf: &[u8]) -> Result<Self> {
        let state = Self::deserialize(buf).map_err(|e| ReaderErr::CorruptState(e.to_string()))?;
        let c = &state.cursor;

        if c.batch_size == 0 || c.batch_stride == 0 || c.sample_stride == 0 || c.last_mini_batch_stride == 0 {
            return Err(ReaderErr::CorruptState(
                "checkpoint holds a zero size or stride".into(),
            ));
        }

        let len = state.indices.len();
        if c.current_pos > len {
            return Err(ReaderErr::CorruptState(format!(
                "position {} is past the {len} indices of the working set",
                c.current_pos
            )));
        }

        Ok(state)
    }
}

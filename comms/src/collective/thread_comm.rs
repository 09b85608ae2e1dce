use std::{
    num::NonZeroUsize,
    sync::{Arc, Barrier},
};

use parking_lot::Mutex;

use super::Communicator;

/// The state shared by every participant of a `LocalGroup`.
#[derive(Debug)]
struct Shared {
    slots: Mutex<Vec<Vec<f64>>>,
    barrier: Barrier,
}

/// A group of participants living in the same process, each one meant to be driven
/// by it's own thread.
pub struct LocalGroup;

impl LocalGroup {
    /// Creates the communicators for a new group.
    ///
    /// # Arguments
    /// * `size` - The amount of participants.
    ///
    /// # Returns
    /// One `ThreadComm` per rank, ordered by rank.
    #[allow(clippy::new_ret_no_self)]
    pub fn new(size: NonZeroUsize) -> Vec<ThreadComm> {
        let size = size.get();
        let shared = Arc::new(Shared {
            slots: Mutex::new(vec![Vec::new(); size]),
            barrier: Barrier::new(size),
        });

        (0..size)
            .map(|rank| ThreadComm {
                rank,
                size,
                shared: Arc::clone(&shared),
            })
            .collect()
    }
}

/// A participant of a `LocalGroup`.
#[derive(Debug, Clone)]
pub struct ThreadComm {
    rank: usize,
    size: usize,
    shared: Arc<Shared>,
}

impl Communicator for ThreadComm {
    fn rank(&self) -> usize {
        self.rank
    }

    fn size(&self) -> usize {
        self.size
    }

    fn all_reduce_sum(&self, buf: &mut [f64]) {
        {
            let mut slots = self.shared.slots.lock();
            let slot = &mut slots[self.rank];
            slot.clear();
            slot.extend_from_slice(buf);
        }

        self.shared.barrier.wait();

        {
            let slots = self.shared.slots.lock();
            buf.fill(0.);

            for (rank, slot) in slots.iter().enumerate() {
                assert_eq!(
                    slot.len(),
                    buf.len(),
                    "all_reduce_sum: rank {rank} contributed {} values, rank {} contributed {}",
                    slot.len(),
                    self.rank,
                    buf.len()
                );

                buf.iter_mut().zip(slot).for_each(|(acc, x)| *acc += x);
            }
        }

        // Nobody may overwrite a slot until everyone finished reading.
        self.shared.barrier.wait();
    }

    fn barrier(&self) {
        self.shared.barrier.wait();
    }
}

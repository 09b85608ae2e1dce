use super::Communicator;

/// A group with a single participant, every collective is the identity.
#[derive(Debug, Default, Clone, Copy)]
pub struct SelfComm;

impl SelfComm {
    /// Creates a new `SelfComm`.
    pub fn new() -> Self {
        Self
    }
}

impl Communicator for SelfComm {
    fn rank(&self) -> usize {
        0
    }

    fn size(&self) -> usize {
        1
    }

    fn all_reduce_sum(&self, _buf: &mut [f64]) {}

    fn barrier(&self) {}
}

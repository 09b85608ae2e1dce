/// A participant of a lock-step collective computation.
///
/// Every participant of a group must issue the same sequence of collective calls, a
/// participant skipping a call leaves the rest of the group waiting forever.
pub trait Communicator: Send + Sync {
    /// Returns the identifier of this participant, in `0..size()`.
    fn rank(&self) -> usize;

    /// Returns the amount of participants in the group.
    fn size(&self) -> usize;

    /// Sums `buf` element-wise across every participant, leaving the result in every
    /// participant's `buf`.
    ///
    /// The summation order is the same on every participant, so all of them observe
    /// bit-identical results.
    ///
    /// # Arguments
    /// * `buf` - The local contribution, overwritten with the reduced values.
    ///
    /// # Panics
    /// If participants contribute buffers of different lengths.
    fn all_reduce_sum(&self, buf: &mut [f64]);

    /// Blocks until every participant of the group reached this call.
    fn barrier(&self);

    /// Returns `true` for the participant that reports on behalf of the whole group.
    fn is_world_master(&self) -> bool {
        self.rank() == 0
    }

    /// Sums a single scalar across every participant.
    ///
    /// # Arguments
    /// * `value` - The local contribution.
    ///
    /// # Returns
    /// The global sum.
    fn all_reduce_scalar(&self, value: f64) -> f64 {
        let mut buf = [value];
        self.all_reduce_sum(&mut buf);
        buf[0]
    }

    /// Collective logical or.
    ///
    /// # Arguments
    /// * `flag` - The local flag.
    ///
    /// # Returns
    /// `true` if any participant passed `true`.
    fn any(&self, flag: bool) -> bool {
        self.all_reduce_scalar(if flag { 1. } else { 0. }) > 0.
    }

    /// Copies `root`'s buffer into every other participant's buffer.
    ///
    /// # Arguments
    /// * `root` - The rank whose values are kept.
    /// * `buf` - The values to send on `root`, the destination everywhere else.
    fn broadcast(&self, root: usize, buf: &mut [f64]) {
        if self.rank() != root {
            buf.fill(0.);
        }

        self.all_reduce_sum(buf);
    }
}

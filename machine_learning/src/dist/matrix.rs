use comms::Communicator;
use ndarray::{Array2, ArrayView2, ArrayViewMut2};

use super::Grid;
use crate::{MlErr, Result};

/// A 2-D matrix distributed element-cyclically over the participants of a group.
///
/// Every participant stores the entries it owns in a dense local block, entry `(i, j)`
/// lives at local coordinate `(i / grid_rows, j / grid_cols)` of it's owner.
#[derive(Debug, Clone, PartialEq)]
pub struct DistMatrix {
    height: usize,
    width: usize,
    grid: Grid,
    rank: usize,
    local: Array2<f64>,
}

impl DistMatrix {
    /// Creates a new zeroed `DistMatrix`.
    ///
    /// # Arguments
    /// * `height` - The global amount of rows.
    /// * `width` - The global amount of columns.
    /// * `rank` - The rank of this participant.
    /// * `size` - The amount of participants.
    pub fn zeros(height: usize, width: usize, rank: usize, size: usize) -> Self {
        let grid = Grid::new(size);
        let (row, col) = grid.position(rank);
        let shape = (
            Grid::local_len(height, row, grid.rows()),
            Grid::local_len(width, col, grid.cols()),
        );

        Self {
            height,
            width,
            grid,
            rank,
            local: Array2::zeros(shape),
        }
    }

    /// Creates a new `DistMatrix` keeping this participant's share of a replicated matrix.
    ///
    /// # Arguments
    /// * `global` - The whole matrix, identical on every participant.
    /// * `rank` - The rank of this participant.
    /// * `size` - The amount of participants.
    pub fn from_global(global: ArrayView2<f64>, rank: usize, size: usize) -> Self {
        let (height, width) = global.dim();
        let mut matrix = Self::zeros(height, width, rank, size);
        matrix.scatter(global, |local, x| *local = x);
        matrix
    }

    /// Creates a new zeroed `DistMatrix` distributed like `self`.
    pub fn zeros_like(&self) -> Self {
        Self::zeros(self.height, self.width, self.rank, self.grid.size())
    }

    #[inline]
    pub fn height(&self) -> usize {
        self.height
    }

    #[inline]
    pub fn width(&self) -> usize {
        self.width
    }

    #[inline]
    pub fn shape(&self) -> (usize, usize) {
        (self.height, self.width)
    }

    /// Returns the amount of entries in the whole matrix.
    #[inline]
    pub fn len(&self) -> usize {
        self.height * self.width
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[inline]
    pub fn grid(&self) -> Grid {
        self.grid
    }

    /// Returns the rank owning entry `(row, col)`.
    #[inline]
    pub fn owner(&self, row: usize, col: usize) -> usize {
        self.grid.owner(row, col)
    }

    /// Returns whether entry `(row, col)` is stored by this participant.
    #[inline]
    pub fn is_local(&self, row: usize, col: usize) -> bool {
        row < self.height && col < self.width && self.owner(row, col) == self.rank
    }

    /// Maps a global coordinate to this participant's local block.
    ///
    /// # Returns
    /// `None` if the entry isn't owned by this participant.
    pub fn local_coords(&self, row: usize, col: usize) -> Option<(usize, usize)> {
        self.is_local(row, col)
            .then(|| (row / self.grid.rows(), col / self.grid.cols()))
    }

    /// Maps a coordinate of this participant's local block to the global matrix.
    pub fn global_coords(&self, local_row: usize, local_col: usize) -> (usize, usize) {
        let (row, col) = self.grid.position(self.rank);
        (
            row + local_row * self.grid.rows(),
            col + local_col * self.grid.cols(),
        )
    }

    fn check_bounds(&self, row: usize, col: usize) -> Result<()> {
        if row >= self.height || col >= self.width {
            return Err(MlErr::OutOfBounds {
                row,
                col,
                height: self.height,
                width: self.width,
            });
        }

        Ok(())
    }

    fn local_index(&self, row: usize, col: usize) -> Result<(usize, usize)> {
        self.check_bounds(row, col)?;
        self.local_coords(row, col)
            .ok_or(MlErr::NotLocal { row, col })
    }

    /// Reads entry `(row, col)`.
    ///
    /// # Returns
    /// An error if the entry is out of bounds or owned by another participant.
    pub fn get(&self, row: usize, col: usize) -> Result<f64> {
        let idx = self.local_index(row, col)?;
        Ok(self.local[idx])
    }

    /// Writes entry `(row, col)`.
    ///
    /// # Returns
    /// An error if the entry is out of bounds or owned by another participant.
    pub fn set(&mut self, row: usize, col: usize, value: f64) -> Result<()> {
        let idx = self.local_index(row, col)?;
        self.local[idx] = value;
        Ok(())
    }

    #[inline]
    pub fn local(&self) -> ArrayView2<'_, f64> {
        self.local.view()
    }

    #[inline]
    pub fn local_mut(&mut self) -> ArrayViewMut2<'_, f64> {
        self.local.view_mut()
    }

    pub fn fill(&mut self, value: f64) {
        self.local.fill(value);
    }

    /// Combines this participant's entries with the matching entries of a replicated
    /// matrix.
    ///
    /// # Arguments
    /// * `global` - A matrix with the global shape.
    /// * `f` - Called with every local entry and it's global counterpart.
    pub fn scatter<F>(&mut self, global: ArrayView2<f64>, mut f: F)
    where
        F: FnMut(&mut f64, f64),
    {
        let (rows, cols) = (self.grid.rows(), self.grid.cols());
        let (row0, col0) = self.grid.position(self.rank);

        for ((li, lj), x) in self.local.indexed_iter_mut() {
            f(x, global[(row0 + li * rows, col0 + lj * cols)]);
        }
    }

    /// Assembles the whole matrix on every participant.
    ///
    /// This is a collective call.
    pub fn gather(&self, comm: &dyn Communicator) -> Array2<f64> {
        let mut global = Array2::zeros(self.shape());

        for ((li, lj), &x) in self.local.indexed_iter() {
            global[self.global_coords(li, lj)] = x;
        }

        all_reduce_array(comm, &mut global);
        global
    }

    /// Sums the squares of every entry of the whole matrix.
    ///
    /// This is a collective call.
    pub fn sum_of_squares(&self, comm: &dyn Communicator) -> f64 {
        let local = self.local.iter().map(|x| x * x).sum();
        comm.all_reduce_scalar(local)
    }
}

/// Sums `a` element-wise across every participant of `comm`.
///
/// This is a collective call.
pub fn all_reduce_array(comm: &dyn Communicator, a: &mut Array2<f64>) {
    if let Some(buf) = a.as_slice_mut() {
        comm.all_reduce_sum(buf);
        return;
    }

    let mut buf: Vec<_> = a.iter().copied().collect();
    comm.all_reduce_sum(&mut buf);
    a.iter_mut().zip(buf).for_each(|(x, y)| *x = y);
}

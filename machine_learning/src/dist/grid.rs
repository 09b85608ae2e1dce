/// The 2-D process grid a `DistMatrix` is distributed over.
///
/// Participants are laid out column-major on a `rows x cols` grid, `rows` being the
/// largest divisor of the group size not above it's square root.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Grid {
    rows: usize,
    cols: usize,
}

impl Grid {
    /// Creates the grid for a group of `size` participants, `size == 0` is treated as 1.
    pub fn new(size: usize) -> Self {
        let size = size.max(1);
        let rows = (1..=size)
            .take_while(|r| r * r <= size)
            .filter(|r| size % r == 0)
            .last()
            .unwrap_or(1);

        Self {
            rows,
            cols: size / rows,
        }
    }

    #[inline]
    pub fn rows(&self) -> usize {
        self.rows
    }

    #[inline]
    pub fn cols(&self) -> usize {
        self.cols
    }

    #[inline]
    pub fn size(&self) -> usize {
        self.rows * self.cols
    }

    /// Returns the grid position of `rank`.
    #[inline]
    pub fn position(&self, rank: usize) -> (usize, usize) {
        (rank % self.rows, rank / self.rows)
    }

    /// Returns the rank owning entry `(row, col)` of a matrix.
    #[inline]
    pub fn owner(&self, row: usize, col: usize) -> usize {
        row % self.rows + (col % self.cols) * self.rows
    }

    /// Returns how many of `len` cyclically dealt indices land on grid line `line` of `lines`.
    pub(crate) fn local_len(len: usize, line: usize, lines: usize) -> usize {
        len.saturating_sub(line).div_ceil(lines)
    }
}

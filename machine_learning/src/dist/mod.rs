mod grid;
mod matrix;

pub use grid::Grid;
pub use matrix::{DistMatrix, all_reduce_array};

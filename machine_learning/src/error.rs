use std::{
    error::Error,
    fmt::{self, Display},
};

use data_reader::ReaderErr;

/// The result type used in the entire machine learning module.
pub type Result<T> = std::result::Result<T, MlErr>;

/// The machine learning module's error type.
#[derive(Debug)]
pub enum MlErr {
    Configuration(String),
    ShapeMismatch {
        what: &'static str,
        got: (usize, usize),
        expected: (usize, usize),
    },
    OutOfBounds {
        row: usize,
        col: usize,
        height: usize,
        width: usize,
    },
    NotLocal {
        row: usize,
        col: usize,
    },
    /// A numerical gradient disagreed with the analytical one beyond the expected error.
    GradientMismatch {
        weights: String,
        row: usize,
        col: usize,
        analytical: f64,
        numerical: f64,
        expected_error: f64,
    },
    /// A pass was driven out of order, e.g. back prop before differentiating.
    InvalidState(String),
    Reader(ReaderErr),
}

impl Display for MlErr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MlErr::Configuration(msg) => write!(f, "invalid model configuration: {msg}"),
            MlErr::ShapeMismatch {
                what,
                got,
                expected,
            } => write!(
                f,
                "There's a shape mismatch in {what}, got {got:?} and expected {expected:?}"
            ),
            MlErr::OutOfBounds {
                row,
                col,
                height,
                width,
            } => write!(
                f,
                "entry ({row}, {col}) is out of bounds for a {height}x{width} matrix"
            ),
            MlErr::NotLocal { row, col } => {
                write!(f, "entry ({row}, {col}) is not owned by this participant")
            }
            MlErr::GradientMismatch {
                weights,
                row,
                col,
                analytical,
                numerical,
                expected_error,
            } => write!(
                f,
                "gradient checking found a large difference between analytical ({analytical}) \
                 and numerical ({numerical}) gradients of {weights} entry ({row}, {col}), \
                 expected an error of at most {expected_error}"
            ),
            MlErr::InvalidState(msg) => write!(f, "invalid model state: {msg}"),
            MlErr::Reader(e) => write!(f, "data reader error: {e}"),
        }
    }
}

impl Error for MlErr {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            MlErr::Reader(e) => Some(e),
            _ => None,
        }
    }
}

impl From<ReaderErr> for MlErr {
    fn from(value: ReaderErr) -> Self {
        Self::Reader(value)
    }
}

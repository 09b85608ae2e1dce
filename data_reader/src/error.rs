use std::{
    error::Error,
    fmt::{self, Display},
    io,
};

use crate::source::DataError;

/// The result type used in the entire data reader module.
pub type Result<T> = std::result::Result<T, ReaderErr>;

/// The data reader module's error type.
#[derive(Debug)]
pub enum ReaderErr {
    /// Invalid percentages, counts or batch parameters, detected before any mutation.
    Configuration(String),
    /// A checkpoint blob couldn't be decoded into a consistent reader state.
    CorruptState(String),
    /// A capability was requested from a data source that doesn't provide it.
    NotImplemented { capability: &'static str },
    Data(DataError),
    Io(io::Error),
}

impl Display for ReaderErr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReaderErr::Configuration(msg) => write!(f, "invalid reader configuration: {msg}"),
            ReaderErr::CorruptState(msg) => write!(f, "corrupt reader checkpoint: {msg}"),
            ReaderErr::NotImplemented { capability } => {
                write!(f, "the method {capability} has not been implemented")
            }
            ReaderErr::Data(e) => write!(f, "data source error: {e}"),
            ReaderErr::Io(e) => write!(f, "io error: {e}"),
        }
    }
}

impl Error for ReaderErr {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            ReaderErr::Data(e) => Some(e),
            ReaderErr::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<DataError> for ReaderErr {
    fn from(value: DataError) -> Self {
        Self::Data(value)
    }
}

impl From<io::Error> for ReaderErr {
    fn from(value: io::Error) -> Self {
        Self::Io(value)
    }
}

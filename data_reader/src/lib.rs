//! Sample index scheduling for data readers.
//!
//! A `DataReader` owns the partition of a data source's sample identifiers into a working
//! set and an unused set (`IndexSet`), and a `MiniBatchCursor` walking the working set one
//! mini-batch at a time, possibly interleaved with other readers and models.

mod checkpoint;
mod config;
mod cursor;
mod error;
mod indices;
mod partition;
mod reader;
pub mod source;

pub use config::{ReaderConfig, ReaderRole};
pub use cursor::{CursorState, EpochPlan, MiniBatchCursor};
pub use error::{ReaderErr, Result};
pub use indices::IndexSet;
pub use partition::{ReaderPartition, StrideParams};
pub use reader::DataReader;
pub use source::{Capability, DataError, DataSource, InMemoryDataset};

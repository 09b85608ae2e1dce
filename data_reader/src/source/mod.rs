mod capability;
mod dataset;

pub use capability::{Capability, DataError, DataSource};
pub use dataset::InMemoryDataset;

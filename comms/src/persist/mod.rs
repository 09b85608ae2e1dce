//! Named-blob checkpoint persistence.
//!
//! A checkpoint is a flat namespace of opaque byte blobs. Components encode their own
//! state (see `Serialize` and `Deserialize`) and store it under a name of their choice.

mod blob;
mod dir;
mod memory;

use std::io;

pub use blob::{BlobReader, write_u64, write_u64_slice};
pub use dir::DirCheckpoint;
pub use memory::MemoryCheckpoint;

/// The writing end of a checkpoint.
pub trait CheckpointSink {
    /// Stores `bytes` under `name`, replacing any previous blob with that name.
    ///
    /// # Arguments
    /// * `name` - The blob's name.
    /// * `bytes` - The blob's contents.
    ///
    /// # Returns
    /// The amount of bytes written or an io error.
    fn write_blob(&mut self, name: &str, bytes: &[u8]) -> io::Result<usize>;
}

/// The reading end of a checkpoint.
pub trait CheckpointSource {
    /// Reads the blob stored under `name`.
    ///
    /// # Arguments
    /// * `name` - The blob's name.
    ///
    /// # Returns
    /// The blob's contents or `io::ErrorKind::NotFound` if there is no such blob.
    fn read_blob(&self, name: &str) -> io::Result<Vec<u8>>;
}

use std::{collections::HashMap, io};

use super::{CheckpointSink, CheckpointSource};

/// A checkpoint kept in memory, mostly useful for tests and for handing state between
/// components of the same process.
#[derive(Debug, Default, Clone)]
pub struct MemoryCheckpoint {
    blobs: HashMap<String, Vec<u8>>,
}

impl MemoryCheckpoint {
    /// Creates a new empty `MemoryCheckpoint`.
    pub fn new() -> Self {
        Self::default()
    }

    /// Gives mutable access to a stored blob.
    pub fn blob_mut(&mut self, name: &str) -> Option<&mut Vec<u8>> {
        self.blobs.get_mut(name)
    }

    /// Returns the amount of stored blobs.
    pub fn len(&self) -> usize {
        self.blobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blobs.is_empty()
    }
}

impl CheckpointSink for MemoryCheckpoint {
    fn write_blob(&mut self, name: &str, bytes: &[u8]) -> io::Result<usize> {
        self.blobs.insert(name.to_owned(), bytes.to_vec());
        Ok(bytes.len())
    }
}

impl CheckpointSource for MemoryCheckpoint {
    fn read_blob(&self, name: &str) -> io::Result<Vec<u8>> {
        self.blobs.get(name).cloned().ok_or_else(|| {
            io::Error::new(io::ErrorKind::NotFound, format!("no blob named {name}"))
        })
    }
}

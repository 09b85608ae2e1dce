use std::{
    fs, io,
    path::{Path, PathBuf},
};

use log::debug;

use super::{CheckpointSink, CheckpointSource};

/// A checkpoint stored as a directory with one `<name>.bin` file per blob.
#[derive(Debug, Clone)]
pub struct DirCheckpoint {
    dir: PathBuf,
}

impl DirCheckpoint {
    /// Creates a new `DirCheckpoint`, creating `dir` if it doesn't exist.
    ///
    /// # Arguments
    /// * `dir` - The checkpoint directory.
    ///
    /// # Returns
    /// An io error if the directory couldn't be created.
    pub fn create<P: AsRef<Path>>(dir: P) -> io::Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    /// Returns the checkpoint directory.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn blob_path(&self, name: &str) -> io::Result<PathBuf> {
        if name.is_empty() || name.contains(['/', '\\']) || name == "." || name == ".." {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("invalid blob name {name:?}"),
            ));
        }

        Ok(self.dir.join(format!("{name}.bin")))
    }
}

impl CheckpointSink for DirCheckpoint {
    fn write_blob(&mut self, name: &str, bytes: &[u8]) -> io::Result<usize> {
        let path = self.blob_path(name)?;
        fs::write(&path, bytes)?;
        debug!(bytes = bytes.len(); "wrote checkpoint blob {}", path.display());
        Ok(bytes.len())
    }
}

impl CheckpointSource for DirCheckpoint {
    fn read_blob(&self, name: &str) -> io::Result<Vec<u8>> {
        let path = self.blob_path(name)?;
        let bytes = fs::read(&path)?;
        debug!(bytes = bytes.len(); "read checkpoint blob {}", path.display());
        Ok(bytes)
    }
}

use std::io;

use crate::{LEN_TYPE_SIZE, LenType};

/// Appends `value` to `buf`.
pub fn write_u64(buf: &mut Vec<u8>, value: u64) {
    buf.extend_from_slice(bytemuck::bytes_of(&value));
}

/// Appends a length-prefixed slice of `u64`s to `buf`.
pub fn write_u64_slice(buf: &mut Vec<u8>, values: &[u64]) {
    write_u64(buf, values.len() as LenType);
    buf.extend_from_slice(bytemuck::cast_slice(values));
}

/// A cursor over an encoded blob.
///
/// Every read checks the remaining length first, so truncated blobs surface as
/// `io::ErrorKind::InvalidData` errors instead of panics.
#[derive(Debug)]
pub struct BlobReader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> BlobReader<'a> {
    /// Creates a new `BlobReader` positioned at the start of `buf`.
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    /// Returns the amount of bytes not yet consumed.
    pub fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    /// Consumes exactly `n` bytes.
    ///
    /// # Arguments
    /// * `n` - The amount of bytes to consume.
    ///
    /// # Returns
    /// The consumed bytes or an error if the blob is shorter than that.
    pub fn read_bytes(&mut self, n: usize) -> io::Result<&'a [u8]> {
        if self.remaining() < n {
            return Err(truncated(n, self.remaining()));
        }

        let bytes = &self.buf[self.pos..self.pos + n];
        self.pos += n;
        Ok(bytes)
    }

    /// Consumes a single `u64`.
    pub fn read_u64(&mut self) -> io::Result<u64> {
        let bytes = self.read_bytes(size_of::<u64>())?;
        Ok(bytemuck::pod_read_unaligned(bytes))
    }

    /// Consumes a length-prefixed slice of `u64`s written by `write_u64_slice`.
    pub fn read_u64_slice(&mut self) -> io::Result<Vec<u64>> {
        let len = self.read_u64()? as usize;
        let size = len.checked_mul(LEN_TYPE_SIZE).ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::InvalidData,
                format!("slice length {len} overflows the address space"),
            )
        })?;

        let bytes = self.read_bytes(size)?;

        Ok(bytes
            .chunks_exact(LEN_TYPE_SIZE)
            .map(bytemuck::pod_read_unaligned)
            .collect())
    }

    /// Checks that the whole blob was consumed.
    ///
    /// # Returns
    /// An error if there are trailing bytes.
    pub fn finish(self) -> io::Result<()> {
        match self.remaining() {
            0 => Ok(()),
            n => Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("blob has {n} trailing bytes"),
            )),
        }
    }
}

fn truncated(needed: usize, available: usize) -> io::Error {
    io::Error::new(
        io::ErrorKind::InvalidData,
        format!("blob is truncated, needed {needed} more bytes but only {available} remain"),
    )
}

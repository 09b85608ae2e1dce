use std::io;

/// Decodes a value previously written by it's `Serialize` counterpart.
pub trait Deserialize: Sized {
    /// Decodes an instance from `buf`.
    ///
    /// # Arguments
    /// * `buf` - The encoded bytes, must be consumed entirely.
    ///
    /// # Returns
    /// The decoded value or an `io::ErrorKind::InvalidData` error if `buf` is malformed.
    fn deserialize(buf: &[u8]) -> io::Result<Self>;
}

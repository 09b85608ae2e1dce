/// Encodes a value into the binary layout used by checkpoint blobs.
pub trait Serialize {
    /// Appends the encoded form of `self` at the end of `buf`.
    ///
    /// # Arguments
    /// * `buf` - The output buffer.
    fn serialize(&self, buf: &mut Vec<u8>);
}

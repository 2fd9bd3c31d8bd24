//! Big-endian binary framing shared by the block types.
//!
//! Variable-length fields are prefixed with a `u32` length; fixed-width
//! integers are big-endian. Decoding never panics on malformed input.

use crate::error::{CodecError, CodecResult};
use crate::hash::Hash;

/// Sequential reader over an encoded value.
pub(crate) struct Reader<'a> {
    input: &'a [u8],
    offset: usize,
}

impl<'a> Reader<'a> {
    pub(crate) fn new(input: &'a [u8]) -> Self {
        Self { input, offset: 0 }
    }

    fn take(&mut self, len: usize) -> CodecResult<&'a [u8]> {
        let remaining = self.input.len() - self.offset;
        if len > remaining {
            return Err(CodecError::UnexpectedEof);
        }
        let slice = &self.input[self.offset..self.offset + len];
        self.offset += len;
        Ok(slice)
    }

    pub(crate) fn read_u32(&mut self) -> CodecResult<u32> {
        let bytes = self.take(4)?;
        Ok(u32::from_be_bytes(bytes.try_into().expect("4-byte slice")))
    }

    pub(crate) fn read_u64(&mut self) -> CodecResult<u64> {
        let bytes = self.take(8)?;
        Ok(u64::from_be_bytes(bytes.try_into().expect("8-byte slice")))
    }

    pub(crate) fn read_hash(&mut self) -> CodecResult<Hash> {
        Hash::from_slice(self.take(Hash::SIZE)?)
    }

    /// Read a `u32`-length-prefixed byte string.
    pub(crate) fn read_bytes(&mut self) -> CodecResult<Vec<u8>> {
        let len = self.read_u32()? as usize;
        let remaining = self.input.len() - self.offset;
        if len > remaining {
            return Err(CodecError::LengthOverflow {
                declared: len,
                remaining,
            });
        }
        Ok(self.take(len)?.to_vec())
    }

    /// Fail unless the whole input was consumed.
    pub(crate) fn finish(self) -> CodecResult<()> {
        if self.offset == self.input.len() {
            Ok(())
        } else {
            Err(CodecError::TrailingBytes)
        }
    }
}

pub(crate) fn write_u32(out: &mut Vec<u8>, value: u32) {
    out.extend_from_slice(&value.to_be_bytes());
}

pub(crate) fn write_u64(out: &mut Vec<u8>, value: u64) {
    out.extend_from_slice(&value.to_be_bytes());
}

pub(crate) fn write_hash(out: &mut Vec<u8>, hash: &Hash) {
    out.extend_from_slice(hash.as_bytes());
}

/// Write a `u32`-length-prefixed byte string.
pub(crate) fn write_bytes(out: &mut Vec<u8>, bytes: &[u8]) {
    write_u32(out, bytes.len() as u32);
    out.extend_from_slice(bytes);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reader_rejects_truncated_input() {
        let mut out = Vec::new();
        write_bytes(&mut out, b"payload");
        let mut reader = Reader::new(&out[..out.len() - 2]);
        assert!(matches!(
            reader.read_bytes(),
            Err(CodecError::LengthOverflow { .. })
        ));
    }

    #[test]
    fn reader_rejects_trailing_bytes() {
        let mut out = Vec::new();
        write_u64(&mut out, 42);
        out.push(0);
        let mut reader = Reader::new(&out);
        assert_eq!(reader.read_u64().unwrap(), 42);
        assert_eq!(reader.finish(), Err(CodecError::TrailingBytes));
    }
}

//! 32-byte block and transaction identifiers.

use crate::error::{CodecError, CodecResult};
use blake2::digest::consts::U32;
use blake2::{Blake2b, Digest};
use std::fmt;

/// A 32-byte Blake2b-256 digest identifying a block or transaction.
///
/// Deterministic, cheap to copy and safe to use as a map key.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Hash([u8; 32]);

impl Hash {
    /// Size of a hash in bytes.
    pub const SIZE: usize = 32;

    /// The all-zero hash, used as the genesis parent.
    pub const ZERO: Self = Self([0u8; 32]);

    /// Hash arbitrary bytes with Blake2b-256.
    pub fn of(data: &[u8]) -> Self {
        let mut hasher = Blake2b::<U32>::new();
        hasher.update(data);
        let digest = hasher.finalize();
        let mut out = [0u8; 32];
        out.copy_from_slice(&digest);
        Self(out)
    }

    /// Wrap raw digest bytes without hashing.
    pub const fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Parse a hash from a slice; fails unless it is exactly 32 bytes.
    pub fn from_slice(bytes: &[u8]) -> CodecResult<Self> {
        if bytes.len() != Self::SIZE {
            return Err(CodecError::InvalidHashLength(bytes.len()));
        }
        let mut out = [0u8; 32];
        out.copy_from_slice(bytes);
        Ok(Self(out))
    }

    /// The raw digest bytes.
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Check whether this is the all-zero hash.
    pub fn is_zero(&self) -> bool {
        self.0.iter().all(|&b| b == 0)
    }
}

impl AsRef<[u8]> for Hash {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl From<[u8; 32]> for Hash {
    fn from(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }
}

impl fmt::Display for Hash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(self.0))
    }
}

impl fmt::Debug for Hash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Hash({})", hex::encode(self.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hashing_is_deterministic() {
        let a = Hash::of(b"block data");
        let b = Hash::of(b"block data");
        assert_eq!(a, b);
        assert_ne!(a, Hash::of(b"other data"));
    }

    #[test]
    fn from_slice_rejects_wrong_length() {
        assert!(Hash::from_slice(&[0u8; 31]).is_err());
        assert!(Hash::from_slice(&[0u8; 33]).is_err());
        assert!(Hash::from_slice(&[7u8; 32]).is_ok());
    }

    #[test]
    fn display_is_hex() {
        let h = Hash::from_bytes([0xab; 32]);
        assert_eq!(h.to_string(), "ab".repeat(32));
    }
}

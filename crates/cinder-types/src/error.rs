//! Error types for encoding and decoding.

use thiserror::Error;

/// Errors raised while decoding stored values.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CodecError {
    /// Input ended before the value was complete.
    #[error("Unexpected end of input while decoding")]
    UnexpectedEof,

    /// A hash field was not exactly 32 bytes.
    #[error("Invalid hash length: expected 32 bytes, got {0}")]
    InvalidHashLength(usize),

    /// Input was longer than the encoded value.
    #[error("Trailing bytes after decoding")]
    TrailingBytes,

    /// A declared length exceeds the remaining input.
    #[error("Declared length {declared} exceeds remaining input {remaining}")]
    LengthOverflow { declared: usize, remaining: usize },
}

/// Result type for codec operations.
pub type CodecResult<T> = Result<T, CodecError>;

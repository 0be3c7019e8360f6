//! Error types for the document engine.

/// Errors produced while encoding, decoding or editing documents.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum DocError {
    /// The payload could not be deserialized or violates a structural rule.
    #[error("decode error: {0}")]
    Decode(String),

    /// Serialization failure.
    #[error("encode error: {0}")]
    Encode(String),

    /// The buffer does not start with the expected magic bytes.
    #[error("bad magic: expected {expected:?}, got {actual:?}")]
    BadMagic { expected: [u8; 4], actual: Vec<u8> },

    /// The envelope was written by an unknown format version.
    #[error("unsupported format version {0}")]
    UnsupportedVersion(u8),

    /// Payload checksum does not match the envelope header.
    #[error("checksum mismatch: expected {expected:#010x}, computed {computed:#010x}")]
    ChecksumMismatch { expected: u32, computed: u32 },

    /// A local edit addressed a position outside the visible text.
    #[error("index {index} out of bounds for length {len}")]
    IndexOutOfBounds { index: usize, len: usize },
}

/// Result alias for document engine operations.
pub type DocResult<T> = Result<T, DocError>;

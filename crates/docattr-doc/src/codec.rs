//! Versioned binary envelope shared by every persisted payload.
//!
//! Layout: `[4 bytes magic][1 byte version][4 bytes CRC32 BE][bincode payload]`.
//! The magic distinguishes updates from attribute maps so a mixed-up key is
//! reported as a decode error instead of producing garbage.

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::{DocError, DocResult};

/// Current envelope format version.
pub const FORMAT_VERSION: u8 = 1;

/// Size of the envelope header in bytes.
pub const HEADER_LEN: usize = 4 + 1 + 4;

/// Magic for encoded [`crate::Update`] payloads (edits and snapshots).
pub const UPDATE_MAGIC: [u8; 4] = *b"DAUP";

/// Magic for encoded [`crate::AttributeMap`] payloads.
pub const ATTRS_MAGIC: [u8; 4] = *b"DAAM";

/// Serialize `value` into an envelope tagged with `magic`.
pub fn encode<T: Serialize>(magic: [u8; 4], value: &T) -> DocResult<Vec<u8>> {
    let payload = bincode::serialize(value).map_err(|e| DocError::Encode(e.to_string()))?;
    let crc = crc32fast::hash(&payload);
    let mut buf = Vec::with_capacity(HEADER_LEN + payload.len());
    buf.extend_from_slice(&magic);
    buf.push(FORMAT_VERSION);
    buf.extend_from_slice(&crc.to_be_bytes());
    buf.extend_from_slice(&payload);
    Ok(buf)
}

/// Verify the envelope around `data` and deserialize its payload.
pub fn decode<T: DeserializeOwned>(magic: [u8; 4], data: &[u8]) -> DocResult<T> {
    if data.len() < HEADER_LEN {
        return Err(DocError::Decode(format!(
            "buffer too short: {} bytes, header needs {HEADER_LEN}",
            data.len()
        )));
    }
    if data[0..4] != magic {
        return Err(DocError::BadMagic {
            expected: magic,
            actual: data[0..4].to_vec(),
        });
    }
    if data[4] != FORMAT_VERSION {
        return Err(DocError::UnsupportedVersion(data[4]));
    }
    let mut crc_bytes = [0u8; 4];
    crc_bytes.copy_from_slice(&data[5..9]);
    let expected = u32::from_be_bytes(crc_bytes);
    let payload = &data[HEADER_LEN..];
    let computed = crc32fast::hash(payload);
    if expected != computed {
        return Err(DocError::ChecksumMismatch { expected, computed });
    }
    bincode::deserialize(payload).map_err(|e| DocError::Decode(e.to_string()))
}

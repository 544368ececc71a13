//! Release encoding for remote objects and SQL rows.
//!
//! JSON, gzip, then base64. Decoding accepts payloads with or without the
//! gzip layer.

use std::io::{Read, Write};

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;

use crate::constants::{RELEASE_DECODED_BYTES_MAX, RELEASE_ENCODED_BYTES_MAX};

use super::error::{StorageError, StorageResult};
use super::release::Release;

const GZIP_MAGIC: [u8; 3] = [0x1f, 0x8b, 0x08];

/// Encode a release for storage.
///
/// # Errors
/// Returns `Serialization` if encoding fails or the result is too large.
pub fn encode_release(release: &Release) -> StorageResult<String> {
    let json = serde_json::to_vec(release)
        .map_err(|e| StorageError::serialization(format!("failed to encode release: {e}")))?;

    let mut encoder = GzEncoder::new(Vec::with_capacity(json.len() / 2), Compression::best());
    encoder
        .write_all(&json)
        .map_err(|e| StorageError::serialization(format!("failed to compress release: {e}")))?;
    let compressed = encoder
        .finish()
        .map_err(|e| StorageError::serialization(format!("failed to compress release: {e}")))?;

    let encoded = BASE64.encode(compressed);
    if encoded.len() > RELEASE_ENCODED_BYTES_MAX {
        return Err(StorageError::serialization(format!(
            "encoded release {} bytes exceeds max {}",
            encoded.len(),
            RELEASE_ENCODED_BYTES_MAX
        )));
    }
    Ok(encoded)
}

/// Decode a stored release.
///
/// # Errors
/// Returns `Serialization` if the payload is not a valid encoded release or
/// inflates past [`RELEASE_DECODED_BYTES_MAX`].
pub fn decode_release(encoded: &str) -> StorageResult<Release> {
    let bytes = BASE64
        .decode(encoded.trim())
        .map_err(|e| StorageError::serialization(format!("invalid base64: {e}")))?;

    let json = if bytes.starts_with(&GZIP_MAGIC) {
        // one byte past the limit tells an exact fit from an overflow
        let limit = u64::try_from(RELEASE_DECODED_BYTES_MAX).map_or(u64::MAX, |max| max + 1);
        let mut decoder = GzDecoder::new(bytes.as_slice()).take(limit);
        let mut out = Vec::with_capacity(bytes.len() * 2);
        decoder
            .read_to_end(&mut out)
            .map_err(|e| StorageError::serialization(format!("invalid gzip: {e}")))?;
        if out.len() > RELEASE_DECODED_BYTES_MAX {
            return Err(StorageError::serialization(format!(
                "decompressed release exceeds max {RELEASE_DECODED_BYTES_MAX} bytes"
            )));
        }
        out
    } else {
        bytes
    };

    serde_json::from_slice(&json)
        .map_err(|e| StorageError::serialization(format!("failed to decode release: {e}")))
}

//! Byte ↔ text transport encoding
//!
//! Records are persisted as text, so compressed payloads go through
//! standard base64 (with padding, no line breaks). Large inputs are fed
//! to a streaming encoder in fixed-size chunks so the per-step working
//! set stays bounded; the output is identical to a one-pass encode.

use crate::storage::error::{StorageError, StorageResult};
use base64::engine::general_purpose::STANDARD;
use base64::write::EncoderStringWriter;
use base64::Engine;
use std::io::Write;

/// Inputs at or above this size are encoded chunk by chunk
pub const CHUNKED_ENCODE_MIN: usize = 65536;

/// Chunk size used for large inputs
pub const ENCODE_CHUNK_SIZE: usize = 32768;

/// Encode bytes as standard base64
pub fn encode(bytes: &[u8]) -> String {
    if bytes.len() < CHUNKED_ENCODE_MIN {
        return STANDARD.encode(bytes);
    }

    let mut writer = EncoderStringWriter::from_consumer(
        String::with_capacity(encoded_len(bytes.len())),
        &STANDARD,
    );
    for chunk in bytes.chunks(ENCODE_CHUNK_SIZE) {
        // Writing into a String cannot fail
        let _ = writer.write_all(chunk);
    }
    writer.into_inner()
}

/// Decode standard base64 back into bytes
pub fn decode(text: &str) -> StorageResult<Vec<u8>> {
    if text.is_empty() {
        return Ok(Vec::new());
    }

    STANDARD
        .decode(text)
        .map_err(|e| StorageError::decode(format!("invalid base64 payload: {}", e)))
}

/// UTF-8 byte length of a string
pub fn byte_length(text: &str) -> usize {
    text.len()
}

fn encoded_len(len: usize) -> usize {
    len.div_ceil(3) * 4
}

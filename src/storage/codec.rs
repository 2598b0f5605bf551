//! Value codec: JSON → threshold check → optional compression → framing
//!
//! Every stored value becomes a framed record:
//!
//! ```text
//! marker ++ base64(payload)
//!
//! R  payload = UTF-8 JSON
//! G  payload = gzip(UTF-8 JSON)
//! D  payload = deflate(UTF-8 JSON)
//! ```
//!
//! Compression is chosen purely on serialized size (`size >= threshold`)
//! and on whether the host supports it. There is no check that the
//! compressed form is smaller.

use crate::storage::error::{StorageError, StorageResult, CIRCULAR_REFERENCE_MESSAGE};
use crate::storage::provider::{CompressionProvider, Flate2Provider};
use crate::storage::transcoder;
use crate::storage::types::{Algorithm, CompressionResult, Marker, ResolvedConfig};
use serde::de::{DeserializeOwned, IgnoredAny};
use serde::Serialize;
use std::fmt;
use std::sync::Arc;

/// How a value's payload is produced, decided once per write
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EncodePath {
    /// Store the serialized JSON as-is
    Raw,
    /// Run the serialized JSON through a compression transform
    Compressed(Algorithm),
}

impl EncodePath {
    /// Pick the path for a value of `original_size` serialized bytes
    pub fn select(original_size: usize, config: &ResolvedConfig, supported: bool) -> Self {
        if original_size < config.threshold || !supported {
            EncodePath::Raw
        } else {
            EncodePath::Compressed(config.algorithm)
        }
    }

    pub fn marker(&self) -> Marker {
        match self {
            EncodePath::Raw => Marker::Raw,
            EncodePath::Compressed(algorithm) => algorithm.marker(),
        }
    }

    fn payload(&self, provider: &dyn CompressionProvider, json: &[u8]) -> StorageResult<Vec<u8>> {
        match self {
            EncodePath::Raw => Ok(json.to_vec()),
            EncodePath::Compressed(algorithm) => Ok(provider.compress(*algorithm, json)?),
        }
    }
}

/// Encoder/decoder for framed records
#[derive(Clone)]
pub struct Codec {
    provider: Arc<dyn CompressionProvider>,
}

impl fmt::Debug for Codec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Codec")
            .field("supported", &self.is_supported())
            .finish()
    }
}

impl Default for Codec {
    fn default() -> Self {
        Self::new()
    }
}

impl Codec {
    /// Codec backed by flate2
    pub fn new() -> Self {
        Self::with_provider(Arc::new(Flate2Provider::new()))
    }

    pub fn with_provider(provider: Arc<dyn CompressionProvider>) -> Self {
        Self { provider }
    }

    /// Capability probe for the underlying compression primitives
    pub fn is_supported(&self) -> bool {
        self.provider.is_supported()
    }

    /// Encode a value into a framed record
    pub fn compress<T>(&self, value: &T, config: &ResolvedConfig) -> StorageResult<CompressionResult>
    where
        T: Serialize + ?Sized,
    {
        let json = to_json(value)?;
        let original_size = transcoder::byte_length(&json);

        let path = EncodePath::select(original_size, config, self.is_supported());
        let payload = path.payload(self.provider.as_ref(), json.as_bytes())?;

        let encoded = transcoder::encode(&payload);
        let mut data = String::with_capacity(encoded.len() + 1);
        data.push(path.marker().as_char());
        data.push_str(&encoded);

        let compressed_size = transcoder::byte_length(&data);
        tracing::trace!(
            marker = %path.marker().as_char(),
            original_size,
            compressed_size,
            "Encoded value"
        );

        Ok(CompressionResult {
            data,
            original_size,
            compressed_size,
            was_compressed: path != EncodePath::Raw,
        })
    }

    /// Decode a framed record back into a value
    pub fn decompress<T: DeserializeOwned>(&self, data: &str) -> StorageResult<T> {
        let json = self.decode_text(data)?;
        from_json(&json)
    }

    /// Decode a framed record to its JSON text, validating that it parses
    pub fn decode_json(&self, data: &str) -> StorageResult<String> {
        let json = self.decode_text(data)?;
        from_json::<IgnoredAny>(&json)?;
        Ok(json)
    }

    fn decode_text(&self, data: &str) -> StorageResult<String> {
        let mut chars = data.chars();
        let first = chars
            .next()
            .ok_or_else(|| StorageError::decode("empty record"))?;
        let marker = Marker::from_char(first)
            .ok_or_else(|| StorageError::decode(format!("unknown marker {:?}", first)))?;

        let payload = transcoder::decode(chars.as_str())?;

        let bytes = match marker.algorithm() {
            None => payload,
            Some(algorithm) => self
                .provider
                .decompress(algorithm, &payload)
                .map_err(|e| {
                    StorageError::decode(format!("{} payload could not be decompressed: {}", algorithm, e))
                })?,
        };

        String::from_utf8(bytes)
            .map_err(|e| StorageError::decode(format!("payload is not valid UTF-8: {}", e)))
    }
}

/// Serialize to JSON, separating cyclic values from other serializer faults
pub fn to_json<T: Serialize + ?Sized>(value: &T) -> StorageResult<String> {
    serde_json::to_string(value).map_err(|e| {
        if e.to_string().to_ascii_lowercase().contains("circular") {
            StorageError::CircularReference
        } else {
            StorageError::Serialization(e.to_string())
        }
    })
}

/// Parse JSON text, reporting failures as decode errors
pub fn from_json<T: DeserializeOwned>(json: &str) -> StorageResult<T> {
    serde_json::from_str(json).map_err(|e| StorageError::decode(format!("invalid json data: {}", e)))
}

/// Error for `Serialize` impls over shared graphs that detect a cycle
pub fn circular_reference<E: serde::ser::Error>() -> E {
    E::custom(CIRCULAR_REFERENCE_MESSAGE)
}

/// Encode with a flate2-backed codec
pub fn compress<T: Serialize + ?Sized>(
    value: &T,
    config: &ResolvedConfig,
) -> StorageResult<CompressionResult> {
    Codec::new().compress(value, config)
}

/// Decode with a flate2-backed codec
pub fn decompress<T: DeserializeOwned>(data: &str) -> StorageResult<T> {
    Codec::new().decompress(data)
}

/// Whether the default codec can compress on this host
pub fn is_supported() -> bool {
    Codec::new().is_supported()
}

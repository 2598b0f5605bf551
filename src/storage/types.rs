//! Core data types for the compressed storage layer
//!
//! - `Algorithm` and `Marker`: compression choice and its on-disk tag
//! - `StoreOptions` / `ResolvedConfig`: constructor-time configuration
//! - `CompressionResult`: outcome of encoding one value
//! - `ItemMeta`: per-item diagnostics
//! - `StorageStats`: aggregate size report over a namespace

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Default byte size below which values are stored uncompressed
pub const DEFAULT_THRESHOLD: usize = 500;

/// Default namespace prefix
pub const DEFAULT_KEY_PREFIX: &str = "ns:";

/// Version of the framed record format written by this crate
pub const FORMAT_VERSION: u32 = 1;

/// Streaming compression algorithm applied to large values
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Algorithm {
    /// RFC 1952 gzip stream
    #[default]
    Gzip,
    /// RFC 1950 zlib-wrapped deflate stream
    Deflate,
}

impl Algorithm {
    pub fn as_str(&self) -> &'static str {
        match self {
            Algorithm::Gzip => "gzip",
            Algorithm::Deflate => "deflate",
        }
    }

    /// Marker written in front of records compressed with this algorithm
    pub fn marker(&self) -> Marker {
        match self {
            Algorithm::Gzip => Marker::Gzip,
            Algorithm::Deflate => Marker::Deflate,
        }
    }
}

impl fmt::Display for Algorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Algorithm {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "gzip" => Ok(Algorithm::Gzip),
            "deflate" => Ok(Algorithm::Deflate),
            other => Err(format!("unknown algorithm '{}', expected gzip or deflate", other)),
        }
    }
}

/// One-character tag at the start of every framed record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Marker {
    /// Payload is the serialized JSON itself
    Raw,
    /// Payload is a gzip stream
    Gzip,
    /// Payload is a deflate stream
    Deflate,
}

impl Marker {
    pub fn as_char(&self) -> char {
        match self {
            Marker::Raw => 'R',
            Marker::Gzip => 'G',
            Marker::Deflate => 'D',
        }
    }

    pub fn from_char(c: char) -> Option<Self> {
        match c {
            'R' => Some(Marker::Raw),
            'G' => Some(Marker::Gzip),
            'D' => Some(Marker::Deflate),
            _ => None,
        }
    }

    /// Algorithm needed to reverse the payload, if any
    pub fn algorithm(&self) -> Option<Algorithm> {
        match self {
            Marker::Raw => None,
            Marker::Gzip => Some(Algorithm::Gzip),
            Marker::Deflate => Some(Algorithm::Deflate),
        }
    }
}

/// Caller-supplied configuration; unset fields fall back to defaults
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreOptions {
    pub threshold: Option<usize>,
    pub algorithm: Option<Algorithm>,
    pub key_prefix: Option<String>,
}

impl StoreOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder method: set compression threshold in bytes
    pub fn threshold(mut self, threshold: usize) -> Self {
        self.threshold = Some(threshold);
        self
    }

    /// Builder method: set compression algorithm
    pub fn algorithm(mut self, algorithm: Algorithm) -> Self {
        self.algorithm = Some(algorithm);
        self
    }

    /// Builder method: set namespace prefix
    pub fn key_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.key_prefix = Some(prefix.into());
        self
    }

    /// Resolve against defaults, field by field
    pub fn resolve(self) -> ResolvedConfig {
        let defaults = ResolvedConfig::default();
        ResolvedConfig {
            threshold: self.threshold.unwrap_or(defaults.threshold),
            algorithm: self.algorithm.unwrap_or(defaults.algorithm),
            key_prefix: self.key_prefix.unwrap_or(defaults.key_prefix),
        }
    }
}

/// Fully resolved configuration, immutable for the lifetime of a store
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedConfig {
    /// Serialized size below which values are stored raw
    pub threshold: usize,
    /// Algorithm used once the threshold is reached
    pub algorithm: Algorithm,
    /// Namespace prefix for every managed key
    pub key_prefix: String,
}

impl Default for ResolvedConfig {
    fn default() -> Self {
        Self {
            threshold: DEFAULT_THRESHOLD,
            algorithm: Algorithm::default(),
            key_prefix: DEFAULT_KEY_PREFIX.to_string(),
        }
    }
}

impl From<StoreOptions> for ResolvedConfig {
    fn from(options: StoreOptions) -> Self {
        options.resolve()
    }
}

/// Outcome of encoding a single value
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompressionResult {
    /// Framed record: marker followed by base64 payload
    pub data: String,
    /// UTF-8 length of the serialized JSON
    pub original_size: usize,
    /// UTF-8 length of `data`
    pub compressed_size: usize,
    /// Whether a compression transform was applied
    pub was_compressed: bool,
}

impl CompressionResult {
    pub fn marker(&self) -> Option<Marker> {
        self.data.chars().next().and_then(Marker::from_char)
    }
}

/// Diagnostics tracked for an item written through a store
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemMeta {
    pub timestamp: DateTime<Utc>,
    pub original_size: usize,
    pub version: u32,
}

impl ItemMeta {
    pub fn new(original_size: usize) -> Self {
        Self {
            timestamp: Utc::now(),
            original_size,
            version: FORMAT_VERSION,
        }
    }
}

/// Aggregate size report over all managed keys
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StorageStats {
    pub total_items: usize,
    /// Sum of stored record lengths
    pub compressed_size: usize,
    /// Sum of recovered (or estimated) original lengths
    pub original_size: usize,
    /// `compressed_size / original_size`, 1.0 when nothing is stored
    pub compression_ratio: f64,
}

impl StorageStats {
    pub fn new(total_items: usize, compressed_size: usize, original_size: usize) -> Self {
        let compression_ratio = if original_size > 0 {
            compressed_size as f64 / original_size as f64
        } else {
            1.0
        };

        Self {
            total_items,
            compressed_size,
            original_size,
            compression_ratio,
        }
    }

    /// Bytes saved relative to storing every value raw
    pub fn saved_bytes(&self) -> i64 {
        self.original_size as i64 - self.compressed_size as i64
    }
}

impl Default for StorageStats {
    fn default() -> Self {
        Self::new(0, 0, 0)
    }
}

impl fmt::Display for StorageStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} items, {} → {} bytes, ratio: {:.3}",
            self.total_items, self.original_size, self.compressed_size, self.compression_ratio
        )
    }
}

//! Compression primitives behind a capability probe
//!
//! The codec never calls flate2 directly. It goes through a
//! [`CompressionProvider`], which can report that compression is not
//! available; in that case every value takes the raw path.

use crate::storage::types::Algorithm;
use flate2::read::GzDecoder;
use flate2::write::{GzEncoder, ZlibEncoder};
use flate2::{Compression, Decompress, FlushDecompress, Status};
use std::io::{self, Read, Write};

/// Byte-stream compression keyed by algorithm
pub trait CompressionProvider: Send + Sync {
    /// Whether `compress`/`decompress` can be used at all
    fn is_supported(&self) -> bool;

    fn compress(&self, algorithm: Algorithm, input: &[u8]) -> io::Result<Vec<u8>>;

    /// Reverse `compress`; malformed or truncated input is an error
    fn decompress(&self, algorithm: Algorithm, input: &[u8]) -> io::Result<Vec<u8>>;
}

/// gzip and zlib-wrapped deflate via flate2
#[derive(Debug, Clone, Copy)]
pub struct Flate2Provider {
    level: Compression,
}

impl Flate2Provider {
    pub fn new() -> Self {
        Self {
            level: Compression::default(),
        }
    }

    /// Use a specific compression level (0-9)
    pub fn with_level(level: u32) -> Self {
        Self {
            level: Compression::new(level.min(9)),
        }
    }
}

impl Default for Flate2Provider {
    fn default() -> Self {
        Self::new()
    }
}

impl CompressionProvider for Flate2Provider {
    fn is_supported(&self) -> bool {
        true
    }

    fn compress(&self, algorithm: Algorithm, input: &[u8]) -> io::Result<Vec<u8>> {
        match algorithm {
            Algorithm::Gzip => {
                let mut encoder = GzEncoder::new(Vec::new(), self.level);
                encoder.write_all(input)?;
                encoder.finish()
            }
            Algorithm::Deflate => {
                let mut encoder = ZlibEncoder::new(Vec::new(), self.level);
                encoder.write_all(input)?;
                encoder.finish()
            }
        }
    }

    fn decompress(&self, algorithm: Algorithm, input: &[u8]) -> io::Result<Vec<u8>> {
        match algorithm {
            Algorithm::Gzip => {
                let mut out = Vec::new();
                GzDecoder::new(input).read_to_end(&mut out)?;
                Ok(out)
            }
            Algorithm::Deflate => inflate_zlib(input),
        }
    }
}

/// Inflate a zlib stream, failing unless the stream end is reached.
///
/// `ZlibDecoder` reports a truncated stream as a short read, so the
/// low-level state machine is driven directly here.
fn inflate_zlib(input: &[u8]) -> io::Result<Vec<u8>> {
    let mut inflater = Decompress::new(true);
    let mut out = Vec::with_capacity(input.len().saturating_mul(4).max(64));

    loop {
        if out.len() == out.capacity() {
            out.reserve(out.capacity().max(64));
        }

        let consumed = inflater.total_in() as usize;
        let produced = inflater.total_out();
        let status =
            inflater.decompress_vec(&input[consumed..], &mut out, FlushDecompress::Finish)?;

        match status {
            Status::StreamEnd => return Ok(out),
            Status::Ok | Status::BufError => {
                let stalled = inflater.total_in() as usize == consumed
                    && inflater.total_out() == produced
                    && out.len() < out.capacity();
                if stalled {
                    return Err(io::Error::new(
                        io::ErrorKind::UnexpectedEof,
                        "deflate stream ended before completion",
                    ));
                }
            }
        }
    }
}

/// Host without compression support
#[derive(Debug, Clone, Copy, Default)]
pub struct NoCompression;

impl CompressionProvider for NoCompression {
    fn is_supported(&self) -> bool {
        false
    }

    fn compress(&self, algorithm: Algorithm, _input: &[u8]) -> io::Result<Vec<u8>> {
        Err(unsupported(algorithm))
    }

    fn decompress(&self, algorithm: Algorithm, _input: &[u8]) -> io::Result<Vec<u8>> {
        Err(unsupported(algorithm))
    }
}

fn unsupported(algorithm: Algorithm) -> io::Error {
    io::Error::new(
        io::ErrorKind::Unsupported,
        format!("{} compression is not available on this host", algorithm),
    )
}

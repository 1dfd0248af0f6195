//! Decompression of stored response bodies.
//!
//! Bodies are cached exactly as they came over the wire, so a response sent with a
//! `Content-Encoding` is stored compressed. This module maps the header value to a
//! decoder:
//! - `gzip` / `x-gzip`, all members of a multi-member stream
//! - `deflate` (zlib stream)
//! - anything else is left as is

use std::io::Read;

use flate2::read::{MultiGzDecoder, ZlibDecoder};

use crate::{CacheError, Result};

/// Content encodings the exporter knows how to undo.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ContentEncoding {
    /// No encoding, or one that is not supported.
    #[default]
    Identity,
    Gzip,
    Deflate,
}

impl ContentEncoding {
    /// Parses a `Content-Encoding` header value.
    pub fn from_header(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "gzip" | "x-gzip" => ContentEncoding::Gzip,
            "deflate" => ContentEncoding::Deflate,
            _ => ContentEncoding::Identity,
        }
    }
}

/// Common interface for body decoders.
pub trait Decompressor {
    /// Decodes a complete body.
    ///
    /// # Errors
    ///
    /// Returns an error if the data is not a valid stream of this encoding.
    fn decompress(&self, data: &[u8]) -> Result<Vec<u8>>;
}

/// Pass-through decoder.
pub struct NoCompression;

impl Decompressor for NoCompression {
    fn decompress(&self, data: &[u8]) -> Result<Vec<u8>> {
        Ok(data.to_vec())
    }
}

pub struct GzipDecompressor;

impl Decompressor for GzipDecompressor {
    fn decompress(&self, data: &[u8]) -> Result<Vec<u8>> {
        let mut decoder = MultiGzDecoder::new(data);
        let mut decompressed = Vec::new();
        decoder
            .read_to_end(&mut decompressed)
            .map_err(|e| CacheError::decompression_error(format!("Gzip error: {}", e)))?;
        Ok(decompressed)
    }
}

pub struct DeflateDecompressor;

impl Decompressor for DeflateDecompressor {
    fn decompress(&self, data: &[u8]) -> Result<Vec<u8>> {
        let mut decoder = ZlibDecoder::new(data);
        let mut decompressed = Vec::new();
        decoder
            .read_to_end(&mut decompressed)
            .map_err(|e| CacheError::decompression_error(format!("Inflate error: {}", e)))?;
        Ok(decompressed)
    }
}

pub fn get_decompressor(encoding: ContentEncoding) -> Box<dyn Decompressor> {
    match encoding {
        ContentEncoding::Identity => Box::new(NoCompression),
        ContentEncoding::Gzip => Box::new(GzipDecompressor),
        ContentEncoding::Deflate => Box::new(DeflateDecompressor),
    }
}

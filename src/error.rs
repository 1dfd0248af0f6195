//! Error types and result type for the webcache crate.
//!
//! This module defines all error variants that can occur while decoding a block-file
//! cache. It uses the `snafu` library for ergonomic error handling with automatic
//! backtrace capture.
//!
//! Only a few of these errors are fatal for a whole recovery run. A [`CacheError::InvalidMagic`]
//! on the index file aborts, while address, chain and decompression errors are recovered
//! by the caller that dereferenced the pointer: the referenced thing is simply absent.
//!
//! # Examples
//!
//! ```
//! use webcache::{Result, CacheError};
//!
//! fn open_cache() -> Result<()> {
//!     Err(CacheError::invalid_parameter("Cache root does not exist"))
//! }
//!
//! match open_cache() {
//!     Ok(()) => println!("opened"),
//!     Err(e) => eprintln!("Error: {}", e),
//! }
//! ```
//!
//! # Error Variants
//!
//! - [`CacheError::Io`]: I/O errors from file operations
//! - [`CacheError::InvalidMagic`]: A file is not an index or block file
//! - [`CacheError::NullAddress`]: A zero address was dereferenced
//! - [`CacheError::InvalidAddress`]: An address with a clear init bit or unknown block type
//! - [`CacheError::CorruptChain`]: A collision chain loops or runs too long
//! - [`CacheError::CompressionError`]: Decompression of a stored body failed

use std::io;
use std::path::PathBuf;

use snafu::{Backtrace, Snafu};

// Re-export snafu for context providers
pub use snafu;

/// Main error type for the webcache crate.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum CacheError {
    /// I/O error occurred during file operations.
    #[snafu(display("IO error: {source}"))]
    Io {
        source: io::Error,
        backtrace: Backtrace,
    },

    /// The leading magic of a file matches neither the index nor the block file magic.
    #[snafu(display("Not a valid cache file: {} (magic {magic:#010x})", path.display()))]
    InvalidMagic {
        path: PathBuf,
        magic: u32,
        backtrace: Backtrace,
    },

    /// A file carried a valid magic, but of the wrong kind for where it was found.
    #[snafu(display("Unexpected cache file kind: {} is {found}, expected {expected}", path.display()))]
    UnexpectedFileKind {
        path: PathBuf,
        expected: &'static str,
        found: &'static str,
        backtrace: Backtrace,
    },

    /// A null (zero) cache address was dereferenced.
    #[snafu(display("Null cache address"))]
    NullAddress {
        backtrace: Backtrace,
    },

    /// A non-zero cache address that cannot be dereferenced.
    #[snafu(display("Invalid cache address {raw:#010x}: {message}"))]
    InvalidAddress {
        raw: u32,
        message: String,
        backtrace: Backtrace,
    },

    /// A block file failed validation and none of its slots can be trusted.
    #[snafu(display("Unusable block file {file_name}: {message}"))]
    UnusableBlockFile {
        file_name: String,
        message: String,
        backtrace: Backtrace,
    },

    /// A collision chain revisits an address or exceeds the configured length bound.
    #[snafu(display("Corrupt collision chain at {raw:#010x}: {message}"))]
    CorruptChain {
        raw: u32,
        message: String,
        backtrace: Backtrace,
    },

    /// Error during decompression of a stored body.
    #[snafu(display("Compression error: {message}"))]
    CompressionError {
        message: String,
        backtrace: Backtrace,
    },

    /// Error parsing a JSON configuration file.
    #[snafu(display("Parser error: {source}"))]
    ParserError {
        source: Box<dyn std::error::Error + Send + Sync + 'static>,
        backtrace: Backtrace,
    },

    /// Function was called with invalid parameters.
    #[snafu(display("Invalid parameter: {message}"))]
    InvalidParameter {
        message: String,
        backtrace: Backtrace,
    },
}

impl From<io::Error> for CacheError {
    fn from(source: io::Error) -> Self {
        Self::Io { source, backtrace: Backtrace::capture() }
    }
}

impl From<serde_json::Error> for CacheError {
    fn from(source: serde_json::Error) -> Self {
        Self::ParserError {
            source: Box::new(source),
            backtrace: Backtrace::capture(),
        }
    }
}

/// Helper methods for creating errors without context providers.
impl CacheError {
    /// Creates an `InvalidParameter` error with the given message.
    pub fn invalid_parameter<S: Into<String>>(message: S) -> Self {
        Self::InvalidParameter {
            message: message.into(),
            backtrace: Backtrace::capture(),
        }
    }

    /// Creates an `InvalidMagic` error for the given file.
    pub fn invalid_magic<P: Into<PathBuf>>(path: P, magic: u32) -> Self {
        Self::InvalidMagic {
            path: path.into(),
            magic,
            backtrace: Backtrace::capture(),
        }
    }

    pub fn unexpected_file_kind<P: Into<PathBuf>>(path: P, expected: &'static str, found: &'static str) -> Self {
        Self::UnexpectedFileKind {
            path: path.into(),
            expected,
            found,
            backtrace: Backtrace::capture(),
        }
    }

    /// Creates a `NullAddress` error.
    pub fn null_address() -> Self {
        Self::NullAddress {
            backtrace: Backtrace::capture(),
        }
    }

    /// Creates an `InvalidAddress` error for the raw address value.
    pub fn invalid_address<S: Into<String>>(raw: u32, message: S) -> Self {
        Self::InvalidAddress {
            raw,
            message: message.into(),
            backtrace: Backtrace::capture(),
        }
    }

    pub fn unusable_block_file<S: Into<String>, M: Into<String>>(file_name: S, message: M) -> Self {
        Self::UnusableBlockFile {
            file_name: file_name.into(),
            message: message.into(),
            backtrace: Backtrace::capture(),
        }
    }

    /// Creates a `CorruptChain` error for the address at which the chain broke.
    pub fn corrupt_chain<S: Into<String>>(raw: u32, message: S) -> Self {
        Self::CorruptChain {
            raw,
            message: message.into(),
            backtrace: Backtrace::capture(),
        }
    }

    /// Creates a `CompressionError` for decompression failures.
    pub fn decompression_error<S: Into<String>>(message: S) -> Self {
        Self::CompressionError {
            message: message.into(),
            backtrace: Backtrace::capture(),
        }
    }

    /// Checks if this error is an `InvalidMagic` variant.
    pub fn is_invalid_magic(&self) -> bool {
        matches!(self, CacheError::InvalidMagic { .. })
    }

    /// Checks if this error means a pointer could not be dereferenced at all.
    ///
    /// These errors are the normal representation of an absent stream or key and are
    /// never fatal to a walk.
    pub fn is_absent_pointer(&self) -> bool {
        matches!(
            self,
            CacheError::NullAddress { .. } | CacheError::InvalidAddress { .. } | CacheError::UnusableBlockFile { .. }
        )
    }
}

/// A specialized `Result` type for webcache operations.
pub type Result<T> = std::result::Result<T, CacheError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_absent_pointer_classification() {
        assert!(CacheError::null_address().is_absent_pointer());
        assert!(CacheError::invalid_address(0x9000_0001, "unknown block type 7").is_absent_pointer());
        assert!(!CacheError::invalid_magic("index", 0xdeadbeef).is_absent_pointer());
        assert!(CacheError::invalid_magic("index", 0xdeadbeef).is_invalid_magic());
    }

    #[test]
    fn test_invalid_magic_message_names_file() {
        let msg = CacheError::invalid_magic("/tmp/Cache/index", 0x1234).to_string();
        assert!(msg.contains("/tmp/Cache/index"));
        assert!(msg.contains("0x00001234"));
    }
}

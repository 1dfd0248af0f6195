//! # webcache - Block-File Browser Cache Recovery
//!
//! This crate recovers cached web resources (bodies and HTTP response headers) from a
//! browser's on-disk block-file cache, without the browser running.
//!
//! ## Features
//!
//! - **Address decoding**: Packed 32-bit cache addresses to file/block locators
//! - **Header validation**: Index and `data_N` block file headers
//! - **Entry traversal**: Hash table scan with bounded collision chain following
//! - **Stream recovery**: Block-stored and `f_XXXXXX` stored data streams
//! - **HTTP headers**: Tolerant extraction of embedded response header blocks
//! - **Export**: Content-type bucketed output with gzip/deflate decoding
//!
//! ## Quick Start
//!
//! ```no_run
//! use webcache::exporter::{CacheExporter, ExportConfig};
//! use webcache::readers::CacheReader;
//!
//! # fn main() -> webcache::Result<()> {
//! let cache = CacheReader::open("/path/to/profile")?;
//! let report = CacheExporter::new(ExportConfig::default()).export_cache(&cache)?;
//! println!("Recovered {} files", report.payload_files);
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! - **Storage**: [`storage`] for addresses, file headers, entries and data streams
//! - **Readers**: [`readers`] for opening a cache and walking its entries
//! - **Exporter**: [`exporter`] for writing recovered entries
//! - **Utilities**: [`utils`] for decompression, output I/O and progress reporting
//!
//! ## Error Handling
//!
//! All fallible operations return a [`Result<T>`] type, where errors are represented by
//! [`CacheError`]. Pointer errors met during a walk are recovered locally and logged;
//! only an unreadable or invalid index is fatal.

pub mod error;
pub mod exporter;
pub mod readers;
pub mod storage;
pub mod utils;

pub use readers::CacheReader;
pub use storage::{CacheAddress, CacheEntry};

pub use error::{CacheError, Result, snafu};

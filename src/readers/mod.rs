// Readers for block-file cache directories
//
// This module opens a cache directory, validates its index and block files, and walks
// the hash table to materialize entries.

pub mod cache_reader;

pub use cache_reader::{CacheReader, EntryWalker};

// On-disk structures of the block-file cache
//
// This module decodes packed cache addresses, index and block file headers, entry
// records, and the data streams (including embedded HTTP header blocks) they point at.

pub mod address;
pub mod file_header;
pub mod entry;
pub mod data_stream;
pub mod reader_helper;
#[cfg(test)]
pub(crate) mod test_fixtures;

pub use address::{BlockType, CacheAddress, BLOCK_HEADER_SIZE};
pub use file_header::{
    read_block_file_header, read_file_header, read_index_header, BlockFileHeader, FileHeader, IndexHeader,
    BLOCK_MAGIC, INDEX_MAGIC,
};
pub use entry::{CacheEntry, EntryKey, EntryRecord, MAX_STREAMS};
pub use data_stream::{parse_http_header_block, DataStream, HttpHeaderSet, StreamKind};

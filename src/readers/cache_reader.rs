//! Cache directory reader and hash table walker.
//!
//! This module provides the entry point for reading a block-file cache. It handles:
//! - Locating the `index` file under a browser profile root
//! - Validating the index header (fatal on failure)
//! - Validating and memoizing `data_N` block file headers
//! - Walking the hash table and its collision chains
//!
//! # Examples
//!
//! ```no_run
//! use webcache::readers::CacheReader;
//!
//! # fn main() -> webcache::Result<()> {
//! let cache = CacheReader::open("/home/user/.config/chromium/Default")?;
//! for entry in cache.walk()? {
//!     println!("{:#x} {:?}", entry.hash(), entry.key_text());
//! }
//! # Ok(())
//! # }
//! ```

use std::cell::RefCell;
use std::collections::HashSet;
use std::fs::File;
use std::io::{BufReader, Seek, SeekFrom};
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use byteorder::{LittleEndian, ReadBytesExt};
use log::{debug, info, warn};
use lru::LruCache;

use crate::storage::address::CacheAddress;
use crate::storage::entry::CacheEntry;
use crate::storage::file_header::{read_block_file_header, read_index_header, BlockFileHeader, IndexHeader};
use crate::{CacheError, Result};

/// Location of the cache directory relative to the profile root.
pub const CACHE_SUBDIR: [&str; 2] = ["Application Cache", "Cache"];
pub const INDEX_FILE_NAME: &str = "index";
/// Byte offset of the hash table in the index file (92 32-bit words of preamble).
pub const TABLE_OFFSET: u64 = 92 * 4;
/// Default bound on the number of entries followed in a single bucket chain.
pub const DEFAULT_MAX_CHAIN_LENGTH: usize = 4096;

const BLOCK_FILE_CACHE_SIZE: NonZeroUsize = NonZeroUsize::new(16).unwrap();

type BlockFileState = std::result::Result<Rc<BlockFileHeader>, String>;

/// Reader for one cache directory.
///
/// The cache is treated as a static snapshot: every read opens, uses and drops its own
/// file handle.
pub struct CacheReader {
    cache_dir: PathBuf,
    index_header: IndexHeader,
    max_chain_length: usize,
    block_files: RefCell<LruCache<u32, BlockFileState>>,
}

impl CacheReader {
    /// Opens the cache of a browser profile rooted at `root`.
    ///
    /// # Errors
    ///
    /// Fails when the index file cannot be read or is not an index file.
    pub fn open<P: AsRef<Path>>(root: P) -> Result<Self> {
        let mut cache_dir = root.as_ref().to_path_buf();
        cache_dir.extend(CACHE_SUBDIR);
        Self::from_cache_dir(cache_dir)
    }

    /// Opens a cache directory that directly contains `index`, `data_N` and `f_XXXXXX`.
    pub fn from_cache_dir<P: Into<PathBuf>>(cache_dir: P) -> Result<Self> {
        let cache_dir = cache_dir.into();
        if !cache_dir.is_dir() {
            return Err(CacheError::invalid_parameter(format!(
                "Cache directory not found: {}",
                cache_dir.display()
            )));
        }
        let index_header = read_index_header(cache_dir.join(INDEX_FILE_NAME))?;
        info!(
            "Index: version {:#x}, {} entries, {} bytes, last file {}, table {} slots",
            index_header.version,
            index_header.num_entries,
            index_header.num_bytes,
            index_header.last_file_name(),
            index_header.effective_table_len()
        );
        Ok(Self {
            cache_dir,
            index_header,
            max_chain_length: DEFAULT_MAX_CHAIN_LENGTH,
            block_files: RefCell::new(LruCache::new(BLOCK_FILE_CACHE_SIZE)),
        })
    }

    /// Sets the bound on entries followed per bucket chain.
    pub fn with_max_chain_length(mut self, max_chain_length: usize) -> Self {
        self.max_chain_length = max_chain_length.max(1);
        self
    }

    pub fn cache_dir(&self) -> &Path {
        &self.cache_dir
    }

    pub fn index_header(&self) -> &IndexHeader {
        &self.index_header
    }

    /// Path of the file holding the record at `address`.
    pub fn file_path(&self, address: &CacheAddress) -> PathBuf {
        self.cache_dir.join(address.file_name())
    }

    /// Checks that the block file behind `address` carries a block file header.
    ///
    /// The outcome is memoized per file. A block file that fails validation makes every
    /// address into it unusable.
    pub fn validate_block_file(&self, address: &CacheAddress) -> Result<Rc<BlockFileHeader>> {
        let file_number = address.file_number();
        let cached = self.block_files.borrow_mut().get(&file_number).cloned();
        let state = match cached {
            Some(state) => state,
            None => {
                let state = self.load_block_file(address);
                self.block_files.borrow_mut().put(file_number, state.clone());
                state
            }
        };
        state.map_err(|message| CacheError::unusable_block_file(address.file_name(), message))
    }

    fn load_block_file(&self, address: &CacheAddress) -> BlockFileState {
        let path = self.file_path(address);
        match read_block_file_header(&path) {
            Ok(header) => {
                if header.entry_size != address.entry_size() {
                    warn!(
                        "{}: header declares {}-byte blocks, address expects {}",
                        address.file_name(),
                        header.entry_size,
                        address.entry_size()
                    );
                }
                debug!("{}: {} of {} blocks used", address.file_name(), header.num_entries, header.max_entries);
                Ok(Rc::new(header))
            }
            Err(e) => {
                warn!("Skipping block file {}: {}", path.display(), e);
                Err(e.to_string())
            }
        }
    }

    /// Starts a lazy walk over all reachable entries.
    ///
    /// Entries come in table-slot order, then chain order within a slot. Each call starts a
    /// fresh walk.
    pub fn walk(&self) -> Result<EntryWalker<'_>> {
        let mut table = BufReader::new(File::open(self.cache_dir.join(INDEX_FILE_NAME))?);
        table.seek(SeekFrom::Start(TABLE_OFFSET))?;
        Ok(EntryWalker {
            cache: self,
            table,
            table_len: self.index_header.effective_table_len(),
            slot: 0,
            chain: ChainState::default(),
        })
    }

    /// Collects every reachable entry.
    pub fn entries(&self) -> Result<Vec<CacheEntry>> {
        Ok(self.walk()?.collect())
    }
}

#[derive(Default)]
struct ChainState {
    pending: Option<u32>,
    visited: HashSet<u32>,
}

impl ChainState {
    fn start(&mut self, raw: u32) {
        self.pending = Some(raw);
        self.visited.clear();
    }
}

/// Iterator over the entries reachable from the index hash table.
///
/// Unusable pointers end the chain they appear in; the walk goes on with the next slot.
pub struct EntryWalker<'a> {
    cache: &'a CacheReader,
    table: BufReader<File>,
    table_len: u32,
    slot: u32,
    chain: ChainState,
}

impl EntryWalker<'_> {
    /// Materializes the pending chain link, if it is usable.
    fn follow_chain(&mut self, raw: u32) -> Option<CacheEntry> {
        if self.chain.visited.contains(&raw) {
            let err = CacheError::corrupt_chain(raw, "address already visited in this chain");
            warn!("Slot {}: {}", self.slot - 1, err);
            return None;
        }
        if self.chain.visited.len() >= self.cache.max_chain_length {
            let err = CacheError::corrupt_chain(raw, format!("longer than {} entries", self.cache.max_chain_length));
            warn!("Slot {}: {}", self.slot - 1, err);
            return None;
        }
        self.chain.visited.insert(raw);

        let entry = CacheAddress::decode(raw).and_then(|address| CacheEntry::read(self.cache, address));
        match entry {
            Ok(entry) => {
                if entry.next() != 0 {
                    self.chain.pending = Some(entry.next());
                }
                Some(entry)
            }
            Err(e) => {
                warn!("Slot {}: entry {:#010x} unusable: {}", self.slot - 1, raw, e);
                None
            }
        }
    }
}

impl Iterator for EntryWalker<'_> {
    type Item = CacheEntry;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(raw) = self.chain.pending.take() {
                if let Some(entry) = self.follow_chain(raw) {
                    return Some(entry);
                }
                continue;
            }
            if self.slot >= self.table_len {
                return None;
            }
            let raw = match self.table.read_u32::<LittleEndian>() {
                Ok(raw) => raw,
                Err(e) => {
                    warn!("Index ends at slot {} of {}: {}", self.slot, self.table_len, e);
                    self.slot = self.table_len;
                    return None;
                }
            };
            self.slot += 1;
            if raw != 0 {
                self.chain.start(raw);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::storage::address::BlockType;
    use crate::storage::entry::EntryRecord;
    use crate::storage::test_fixtures::CacheFixture;

    fn record(hash: u32, next: u32) -> EntryRecord {
        EntryRecord { hash, next, ..Default::default() }
    }

    #[test]
    fn test_open_rejects_invalid_index() {
        let fixture = CacheFixture::new();
        std::fs::write(fixture.cache_dir().join(INDEX_FILE_NAME), b"not an index at all").unwrap();
        let err = CacheReader::open(fixture.root()).err().unwrap();
        assert!(err.is_invalid_magic());
    }

    #[test]
    fn test_walk_orders_by_slot_then_chain() {
        let fixture = CacheFixture::new();
        let third = fixture.put_entry(1, 3, &record(3, 0), b"c");
        let second = fixture.put_entry(1, 2, &record(2, third.raw()), b"b");
        let first = fixture.put_entry(1, 1, &record(1, 0), b"a");
        fixture.set_table(&[0, first.raw(), 0, second.raw()]);
        let cache = fixture.open();

        let hashes: Vec<u32> = cache.entries().unwrap().iter().map(CacheEntry::hash).collect();
        assert_eq!(hashes, vec![1, 2, 3]);

        // The walk is restartable.
        assert_eq!(cache.walk().unwrap().count(), 3);
    }

    #[test]
    fn test_self_referencing_chain_terminates() {
        let fixture = CacheFixture::new();
        let addr = CacheAddress::block(BlockType::Block256, 1, 1, 0).unwrap();
        fixture.put_entry(1, 0, &record(7, addr.raw()), b"loop");
        fixture.set_table(&[addr.raw()]);
        let cache = fixture.open();

        let hashes: Vec<u32> = cache.entries().unwrap().iter().map(CacheEntry::hash).collect();
        assert_eq!(hashes, vec![7]);
    }

    #[test]
    fn test_chain_length_bound() {
        let fixture = CacheFixture::new();
        let mut next = 0;
        for block in (0..5u16).rev() {
            next = fixture.put_entry(1, block, &record(block as u32, next), b"k").raw();
        }
        fixture.set_table(&[next]);
        let cache = fixture.open().with_max_chain_length(3);
        assert_eq!(cache.entries().unwrap().len(), 3);
    }

    #[test]
    fn test_unusable_pointers_end_chain_only() {
        let fixture = CacheFixture::new();
        let good = fixture.put_entry(1, 0, &record(1, 0xF000_0001), b"a");
        let other = fixture.put_entry(1, 1, &record(2, 0), b"b");
        // Slot 1 points into a block file that does not exist.
        let missing = CacheAddress::block(BlockType::Block256, 1, 9, 0).unwrap();
        fixture.set_table(&[good.raw(), missing.raw(), other.raw()]);
        let cache = fixture.open();

        let hashes: Vec<u32> = cache.entries().unwrap().iter().map(CacheEntry::hash).collect();
        assert_eq!(hashes, vec![1, 2]);
    }

    #[test]
    fn test_truncated_table_stops_walk() {
        let fixture = CacheFixture::new();
        let only = fixture.put_entry(1, 0, &record(5, 0), b"a");
        fixture.set_table_with_len(&[only.raw()], 1000);
        let cache = fixture.open();
        assert_eq!(cache.entries().unwrap().len(), 1);
    }
}

//! Synthetic cache directories for tests.

use std::fs::{self, OpenOptions};
use std::io::{Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use byteorder::{LittleEndian, WriteBytesExt};
use tempfile::TempDir;

use crate::readers::cache_reader::{CacheReader, CACHE_SUBDIR, INDEX_FILE_NAME, TABLE_OFFSET};
use crate::storage::address::{BlockType, CacheAddress};
use crate::storage::entry::EntryRecord;
use crate::storage::file_header::{BLOCK_MAGIC, INDEX_MAGIC};

pub fn index_header_bytes(num_entries: u32, last_file: u32, table_len: u32) -> Vec<u8> {
    let mut bytes = Vec::new();
    bytes.write_u32::<LittleEndian>(INDEX_MAGIC).unwrap();
    bytes.write_u16::<LittleEndian>(0).unwrap();
    bytes.write_u16::<LittleEndian>(0x0002).unwrap();
    bytes.write_u32::<LittleEndian>(num_entries).unwrap();
    bytes.write_u32::<LittleEndian>(num_entries * 256).unwrap();
    bytes.write_u32::<LittleEndian>(last_file).unwrap();
    bytes.write_all(&[0u8; 8]).unwrap();
    bytes.write_u32::<LittleEndian>(table_len).unwrap();
    bytes
}

pub fn block_file_header_bytes(this_file: i16, entry_size: u32) -> Vec<u8> {
    let mut bytes = Vec::new();
    bytes.write_u32::<LittleEndian>(BLOCK_MAGIC).unwrap();
    bytes.write_u16::<LittleEndian>(0).unwrap();
    bytes.write_u16::<LittleEndian>(0x0002).unwrap();
    bytes.write_i16::<LittleEndian>(this_file).unwrap();
    bytes.write_i16::<LittleEndian>(0).unwrap();
    bytes.write_u32::<LittleEndian>(entry_size).unwrap();
    bytes.write_u32::<LittleEndian>(1).unwrap();
    bytes.write_u32::<LittleEndian>(1024).unwrap();
    for value in 1..=8u32 {
        bytes.write_u32::<LittleEndian>(value).unwrap();
    }
    bytes
}

/// A profile root with an `Application Cache/Cache` directory in a temp dir.
pub struct CacheFixture {
    root: TempDir,
    cache_dir: PathBuf,
}

impl CacheFixture {
    /// Creates the directory with an index holding a single empty slot.
    pub fn new() -> Self {
        let root = tempfile::tempdir().unwrap();
        let mut cache_dir = root.path().to_path_buf();
        cache_dir.extend(CACHE_SUBDIR);
        fs::create_dir_all(&cache_dir).unwrap();
        let fixture = Self { root, cache_dir };
        fixture.set_table(&[0]);
        fixture
    }

    pub fn root(&self) -> &Path {
        self.root.path()
    }

    pub fn cache_dir(&self) -> &Path {
        &self.cache_dir
    }

    pub fn open(&self) -> CacheReader {
        CacheReader::open(self.root()).unwrap()
    }

    pub fn set_table(&self, table: &[u32]) {
        self.set_table_with_len(table, table.len() as u32);
    }

    /// Writes an index whose header declares `table_len` slots but stores only `table`.
    pub fn set_table_with_len(&self, table: &[u32], table_len: u32) {
        let mut bytes = index_header_bytes(table.len() as u32, 0, table_len);
        bytes.resize(TABLE_OFFSET as usize, 0);
        for raw in table {
            bytes.write_u32::<LittleEndian>(*raw).unwrap();
        }
        fs::write(self.cache_dir.join(INDEX_FILE_NAME), bytes).unwrap();
    }

    fn write_at(&self, file_name: &str, offset: u64, bytes: &[u8]) {
        let mut file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(false)
            .open(self.cache_dir.join(file_name))
            .unwrap();
        file.seek(SeekFrom::Start(offset)).unwrap();
        file.write_all(bytes).unwrap();
    }

    /// Stores `bytes` in contiguous blocks of `data_<file_number>`, creating the file.
    pub fn put_block(&self, block_type: BlockType, file_number: u8, block: u16, bytes: &[u8]) -> CacheAddress {
        let block_size = block_type.block_size().unwrap();
        let num_blocks = (bytes.len() as u32).div_ceil(block_size).clamp(1, 4);
        let addr = CacheAddress::block(block_type, num_blocks, file_number, block).unwrap();
        let file_name = addr.file_name();
        if !self.cache_dir.join(&file_name).exists() {
            self.write_at(&file_name, 0, &block_file_header_bytes(file_number as i16, block_size));
        }
        self.write_at(&file_name, addr.file_offset(), bytes);
        addr
    }

    pub fn put_separate_file(&self, file_number: u32, bytes: &[u8]) -> CacheAddress {
        let addr = CacheAddress::separate_file(file_number).unwrap();
        fs::write(self.cache_dir.join(addr.file_name()), bytes).unwrap();
        addr
    }

    /// Stores an entry record followed by its inline key in 256-byte blocks.
    pub fn put_entry(&self, file_number: u8, block: u16, record: &EntryRecord, key: &[u8]) -> CacheAddress {
        let mut bytes = Vec::new();
        record.to_writer(&mut bytes).unwrap();
        bytes.extend_from_slice(key);
        self.put_block(BlockType::Block256, file_number, block, &bytes)
    }

    pub fn corrupt_block_file_magic(&self, file_number: u8) {
        self.write_at(&format!("data_{}", file_number), 0, &[0u8; 4]);
    }
}

//! Fixed binary headers of the index file and of `data_N` block files.
//!
//! Both headers start with a 4-byte little-endian magic that tells them apart. Everything
//! else is read field by field in file order, skipping the reserved gaps verbatim.

use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

use byteorder::{LittleEndian, ReadBytesExt};
use log::debug;

use crate::storage::reader_helper::skip_bytes;
use crate::{CacheError, Result};

pub const INDEX_MAGIC: u32 = 0xC103_CAC3;
pub const BLOCK_MAGIC: u32 = 0xC104_CAC3;

/// Table length used when the index header stores 0.
pub const DEFAULT_TABLE_LEN: u32 = 0x10000;

/// Header of the `index` file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexHeader {
    pub magic: u32,
    pub version: u16,
    /// Number of entries currently stored.
    pub num_entries: u32,
    /// Total size of the stored data.
    pub num_bytes: u32,
    /// Number of the last external file created.
    pub last_file: u32,
    /// Declared size of the hash table, 0 means [`DEFAULT_TABLE_LEN`].
    pub table_len: u32,
}

impl IndexHeader {
    pub fn from_reader<R: Read>(reader: &mut R) -> Result<Self> {
        let magic = reader.read_u32::<LittleEndian>()?;
        Self::read_after_magic(reader, magic)
    }

    fn read_after_magic<R: Read>(reader: &mut R, magic: u32) -> Result<Self> {
        skip_bytes(reader, 2)?;
        let version = reader.read_u16::<LittleEndian>()?;
        let num_entries = reader.read_u32::<LittleEndian>()?;
        let num_bytes = reader.read_u32::<LittleEndian>()?;
        let last_file = reader.read_u32::<LittleEndian>()?;
        skip_bytes(reader, 8)?;
        let table_len = reader.read_u32::<LittleEndian>()?;
        Ok(Self { magic, version, num_entries, num_bytes, last_file, table_len })
    }

    /// Name of the last external file created, `f_XXXXXX`.
    pub fn last_file_name(&self) -> String {
        format!("f_{:06x}", self.last_file)
    }

    /// Number of hash table slots to scan.
    pub fn effective_table_len(&self) -> u32 {
        if self.table_len == 0 { DEFAULT_TABLE_LEN } else { self.table_len }
    }
}

/// Header of a `data_N` block file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockFileHeader {
    pub magic: u32,
    pub version: u16,
    /// Index of this file.
    pub this_file: i16,
    /// Next file when this one is full.
    pub next_file: i16,
    /// Size of the blocks of this file.
    pub entry_size: u32,
    /// Number of stored entries.
    pub num_entries: u32,
    /// Current maximum number of entries.
    pub max_entries: u32,
    /// Counters of empty entries for each type.
    pub empty: [u32; 4],
    /// Last used position for each entry type.
    pub hints: [u32; 4],
}

impl BlockFileHeader {
    pub fn from_reader<R: Read>(reader: &mut R) -> Result<Self> {
        let magic = reader.read_u32::<LittleEndian>()?;
        Self::read_after_magic(reader, magic)
    }

    fn read_after_magic<R: Read>(reader: &mut R, magic: u32) -> Result<Self> {
        skip_bytes(reader, 2)?;
        let version = reader.read_u16::<LittleEndian>()?;
        let this_file = reader.read_i16::<LittleEndian>()?;
        let next_file = reader.read_i16::<LittleEndian>()?;
        let entry_size = reader.read_u32::<LittleEndian>()?;
        let num_entries = reader.read_u32::<LittleEndian>()?;
        let max_entries = reader.read_u32::<LittleEndian>()?;
        let mut empty = [0u32; 4];
        reader.read_u32_into::<LittleEndian>(&mut empty)?;
        let mut hints = [0u32; 4];
        reader.read_u32_into::<LittleEndian>(&mut hints)?;
        Ok(Self { magic, version, this_file, next_file, entry_size, num_entries, max_entries, empty, hints })
    }
}

/// A recognized cache file header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileHeader {
    Index(IndexHeader),
    Block(BlockFileHeader),
}

impl FileHeader {
    /// Reads whichever header the leading magic announces.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError::InvalidMagic`] when the magic is neither [`INDEX_MAGIC`] nor
    /// [`BLOCK_MAGIC`]; `path` is only used for the diagnostic.
    pub fn from_reader<R: Read>(reader: &mut R, path: &Path) -> Result<Self> {
        let magic = reader.read_u32::<LittleEndian>()?;
        match magic {
            INDEX_MAGIC => Ok(FileHeader::Index(IndexHeader::read_after_magic(reader, magic)?)),
            BLOCK_MAGIC => Ok(FileHeader::Block(BlockFileHeader::read_after_magic(reader, magic)?)),
            _ => Err(CacheError::invalid_magic(path, magic)),
        }
    }

    pub fn kind_name(&self) -> &'static str {
        match self {
            FileHeader::Index(_) => "index",
            FileHeader::Block(_) => "block file",
        }
    }
}

/// Reads and validates the header at the start of `path`.
pub fn read_file_header<P: AsRef<Path>>(path: P) -> Result<FileHeader> {
    let path = path.as_ref();
    let mut reader = BufReader::new(File::open(path)?);
    let header = FileHeader::from_reader(&mut reader, path)?;
    debug!("{}: {:?}", path.display(), header);
    Ok(header)
}

/// Reads `path` and requires it to be an index file.
pub fn read_index_header<P: AsRef<Path>>(path: P) -> Result<IndexHeader> {
    let path = path.as_ref();
    match read_file_header(path)? {
        FileHeader::Index(header) => Ok(header),
        other => Err(CacheError::unexpected_file_kind(path, "index", other.kind_name())),
    }
}

/// Reads `path` and requires it to be a block file.
pub fn read_block_file_header<P: AsRef<Path>>(path: P) -> Result<BlockFileHeader> {
    let path = path.as_ref();
    match read_file_header(path)? {
        FileHeader::Block(header) => Ok(header),
        other => Err(CacheError::unexpected_file_kind(path, "block file", other.kind_name())),
    }
}

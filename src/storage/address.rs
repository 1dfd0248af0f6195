//! Packed 32-bit cache addresses.
//!
//! Every pointer stored in the cache (hash table slots, chain links, data streams, long
//! keys) is a 32-bit value with this layout, most significant bit first:
//!
//! ```text
//! 31      initialized flag
//! 30..28  block type
//!
//! separate file:   27..0   external file number    -> f_XXXXXX
//! block kinds:     27..26  reserved
//!                  25..24  contiguous blocks - 1
//!                  23..16  file number             -> data_N
//!                  15..0   first block in the file
//! ```
//!
//! Decoding is pure bit arithmetic. A zero value is the null address, and a value with a
//! clear initialized flag or an unknown block type is rejected before any I/O happens.

use std::fmt;

use crate::{CacheError, Result};

/// Size of the header and allocation bitmap that precede the first block of a block file.
pub const BLOCK_HEADER_SIZE: u64 = 8192;

const INITIALIZED_MASK: u32 = 0x8000_0000;
const BLOCK_TYPE_MASK: u32 = 0x7000_0000;
const BLOCK_TYPE_OFFSET: u32 = 28;
const FILE_NUMBER_MASK: u32 = 0x0FFF_FFFF;
const NUM_BLOCKS_MASK: u32 = 0x0300_0000;
const NUM_BLOCKS_OFFSET: u32 = 24;
const FILE_SELECTOR_MASK: u32 = 0x00FF_0000;
const FILE_SELECTOR_OFFSET: u32 = 16;
const START_BLOCK_MASK: u32 = 0x0000_FFFF;

/// Storage kind of the record an address points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum BlockType {
    /// A dedicated external file, `f_XXXXXX`.
    SeparateFile = 0,
    /// 36-byte rankings node.
    RankingBlock = 1,
    Block256 = 2,
    Block1024 = 3,
    Block4096 = 4,
}

impl TryFrom<u8> for BlockType {
    type Error = CacheError;

    fn try_from(value: u8) -> Result<Self> {
        match value {
            0 => Ok(BlockType::SeparateFile),
            1 => Ok(BlockType::RankingBlock),
            2 => Ok(BlockType::Block256),
            3 => Ok(BlockType::Block1024),
            4 => Ok(BlockType::Block4096),
            _ => Err(CacheError::invalid_parameter(format!("Invalid block type:{}", value))),
        }
    }
}

impl BlockType {
    /// Fixed slot size of this kind, `None` for separate files.
    pub fn block_size(self) -> Option<u32> {
        match self {
            BlockType::SeparateFile => None,
            BlockType::RankingBlock => Some(36),
            BlockType::Block256 => Some(256),
            BlockType::Block1024 => Some(1024),
            BlockType::Block4096 => Some(4096),
        }
    }
}

/// A decoded, dereferenceable cache address.
///
/// Only [`CacheAddress::decode`] and the packing constructors create values of this type,
/// so holding one means the initialized flag is set and the block type is known.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CacheAddress {
    raw: u32,
    block_type: BlockType,
}

impl CacheAddress {
    /// Decodes a raw address value.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError::NullAddress`] for `0`, and [`CacheError::InvalidAddress`] when the
    /// initialized flag is clear or the block type bits are not one of the five known kinds.
    ///
    /// # Examples
    ///
    /// ```
    /// use webcache::storage::{BlockType, CacheAddress};
    ///
    /// let addr = CacheAddress::decode(0xA001_0003)?;
    /// assert_eq!(addr.block_type(), BlockType::Block256);
    /// assert_eq!(addr.file_name(), "data_1");
    /// assert_eq!(addr.block_number(), 3);
    /// # Ok::<(), webcache::CacheError>(())
    /// ```
    pub fn decode(raw: u32) -> Result<Self> {
        if raw == 0 {
            return Err(CacheError::null_address());
        }
        if raw & INITIALIZED_MASK == 0 {
            return Err(CacheError::invalid_address(raw, "initialized flag is clear"));
        }
        let type_bits = ((raw & BLOCK_TYPE_MASK) >> BLOCK_TYPE_OFFSET) as u8;
        let block_type = BlockType::try_from(type_bits)
            .map_err(|_| CacheError::invalid_address(raw, format!("unknown block type {}", type_bits)))?;
        Ok(Self { raw, block_type })
    }

    /// Packs an address of an external `f_XXXXXX` file.
    pub fn separate_file(file_number: u32) -> Result<Self> {
        if file_number > FILE_NUMBER_MASK {
            return Err(CacheError::invalid_parameter(format!("External file number out of range: {:#x}", file_number)));
        }
        Ok(Self { raw: INITIALIZED_MASK | file_number, block_type: BlockType::SeparateFile })
    }

    /// Packs an address of `num_blocks` contiguous slots starting at `start_block` of `data_<file_number>`.
    pub fn block(block_type: BlockType, num_blocks: u32, file_number: u8, start_block: u16) -> Result<Self> {
        if block_type == BlockType::SeparateFile {
            return Err(CacheError::invalid_parameter("Separate files are not block addresses"));
        }
        if !(1..=4).contains(&num_blocks) {
            return Err(CacheError::invalid_parameter(format!("Invalid contiguous block count:{}", num_blocks)));
        }
        let raw = INITIALIZED_MASK
            | ((block_type as u32) << BLOCK_TYPE_OFFSET)
            | ((num_blocks - 1) << NUM_BLOCKS_OFFSET)
            | ((file_number as u32) << FILE_SELECTOR_OFFSET)
            | start_block as u32;
        Ok(Self { raw, block_type })
    }

    pub fn raw(&self) -> u32 {
        self.raw
    }

    pub fn block_type(&self) -> BlockType {
        self.block_type
    }

    pub fn is_separate_file(&self) -> bool {
        self.block_type == BlockType::SeparateFile
    }

    /// External file number for separate files, `data_N` number for block kinds.
    pub fn file_number(&self) -> u32 {
        match self.block_type {
            BlockType::SeparateFile => self.raw & FILE_NUMBER_MASK,
            _ => (self.raw & FILE_SELECTOR_MASK) >> FILE_SELECTOR_OFFSET,
        }
    }

    /// Index of the first block within the block file; 0 for separate files.
    pub fn block_number(&self) -> u32 {
        match self.block_type {
            BlockType::SeparateFile => 0,
            _ => self.raw & START_BLOCK_MASK,
        }
    }

    /// Number of adjacent slots the record occupies; 0 for separate files.
    pub fn num_blocks(&self) -> u32 {
        match self.block_type {
            BlockType::SeparateFile => 0,
            _ => ((self.raw & NUM_BLOCKS_MASK) >> NUM_BLOCKS_OFFSET) + 1,
        }
    }

    /// Slot size of the block kind; 0 for separate files, whose size is the file length.
    pub fn entry_size(&self) -> u32 {
        self.block_type.block_size().unwrap_or(0)
    }

    /// Name of the file that holds the record, relative to the cache directory.
    pub fn file_name(&self) -> String {
        match self.block_type {
            BlockType::SeparateFile => format!("f_{:06x}", self.file_number()),
            _ => format!("data_{}", self.file_number()),
        }
    }

    /// Byte offset of the record within [`CacheAddress::file_name`].
    pub fn file_offset(&self) -> u64 {
        match self.block_type {
            BlockType::SeparateFile => 0,
            _ => BLOCK_HEADER_SIZE + self.block_number() as u64 * self.entry_size() as u64,
        }
    }
}

impl fmt::Display for CacheAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.block_type {
            BlockType::SeparateFile => write!(f, "{}", self.file_name()),
            _ => write!(
                f,
                "{}[block {} x{} @{}]",
                self.file_name(),
                self.block_number(),
                self.num_blocks(),
                self.entry_size()
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_block_address() {
        // init | Block1024 | 3 blocks | data_2 | block 0x1234
        let addr = CacheAddress::decode(0xB202_1234).unwrap();
        assert_eq!(addr.block_type(), BlockType::Block1024);
        assert_eq!(addr.num_blocks(), 3);
        assert_eq!(addr.file_number(), 2);
        assert_eq!(addr.file_name(), "data_2");
        assert_eq!(addr.block_number(), 0x1234);
        assert_eq!(addr.entry_size(), 1024);
        assert_eq!(addr.file_offset(), 8192 + 0x1234 * 1024);
    }

    #[test]
    fn test_decode_separate_file() {
        let addr = CacheAddress::decode(0x8000_002a).unwrap();
        assert!(addr.is_separate_file());
        assert_eq!(addr.file_name(), "f_00002a");
        assert_eq!(addr.entry_size(), 0);
        assert_eq!(addr.file_offset(), 0);
        assert_eq!(addr.to_string(), "f_00002a");
    }

    #[test]
    fn test_decode_ranking_block() {
        let addr = CacheAddress::decode(0x9000_0005).unwrap();
        assert_eq!(addr.block_type(), BlockType::RankingBlock);
        assert_eq!(addr.file_name(), "data_0");
        assert_eq!(addr.entry_size(), 36);
        assert_eq!(addr.file_offset(), 8192 + 5 * 36);
    }

    #[test]
    fn test_null_address() {
        let err = CacheAddress::decode(0).unwrap_err();
        assert!(matches!(err, CacheError::NullAddress { .. }));
    }

    #[test]
    fn test_unknown_block_types_rejected() {
        for type_bits in 5u32..=7 {
            let raw = 0x8000_0000 | (type_bits << 28) | 0x0001_0001;
            let err = CacheAddress::decode(raw).unwrap_err();
            assert!(matches!(err, CacheError::InvalidAddress { .. }), "type {}", type_bits);
        }
    }

    #[test]
    fn test_uninitialized_rejected() {
        let err = CacheAddress::decode(0x2001_0001).unwrap_err();
        assert!(matches!(err, CacheError::InvalidAddress { .. }));
    }

    #[test]
    fn test_decode_is_deterministic_over_valid_space() {
        for type_bits in 0u32..=4 {
            for low in [0u32, 1, 0x00FF_FFFF, 0x0F00_0000, 0x0FFF_FFFF, 0x0301_ABCD] {
                let raw = 0x8000_0000 | (type_bits << 28) | low;
                let a = CacheAddress::decode(raw).unwrap();
                let b = CacheAddress::decode(raw).unwrap();
                assert_eq!(a, b);
                assert_eq!(a.raw(), raw);
                assert_eq!(a.block_type() as u32, type_bits);
            }
        }
    }

    #[test]
    fn test_packing_matches_decoding() {
        let packed = CacheAddress::block(BlockType::Block256, 2, 1, 17).unwrap();
        let decoded = CacheAddress::decode(packed.raw()).unwrap();
        assert_eq!(decoded.num_blocks(), 2);
        assert_eq!(decoded.file_name(), "data_1");
        assert_eq!(decoded.block_number(), 17);

        assert!(CacheAddress::block(BlockType::SeparateFile, 1, 0, 0).is_err());
        assert!(CacheAddress::block(BlockType::Block256, 5, 0, 0).is_err());
        assert!(CacheAddress::separate_file(0x1000_0000).is_err());
    }
}

//! Cache entry records.
//!
//! An entry is a fixed 96-byte record stored in a block file, optionally followed by its
//! key. It points at up to four data streams and at the next entry of its hash bucket.

use std::borrow::Cow;
use std::fs::File;
use std::io::{BufReader, Read, Seek, SeekFrom, Write};

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use chrono::{DateTime, Utc};
use log::{debug, trace, warn};

use crate::readers::CacheReader;
use crate::storage::address::CacheAddress;
use crate::storage::data_stream::{DataStream, HttpHeaderSet};
use crate::storage::reader_helper::{bytes_from_cstr, decode_ascii, skip_bytes, ticks_to_datetime};
use crate::{CacheError, Result};

/// Number of data streams an entry can reference.
pub const MAX_STREAMS: usize = 4;
/// Size of the fixed part of an entry record, up to the inline key.
pub const ENTRY_RECORD_SIZE: usize = 96;
const RESERVED_WORDS: usize = 5;

/// The fixed-layout fields of an entry, exactly as stored.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EntryRecord {
    /// Full hash of the key.
    pub hash: u32,
    /// Next entry with the same hash or bucket, 0 at the end of the chain.
    pub next: u32,
    pub rankings_node: u32,
    pub reuse_count: u32,
    pub refetch_count: u32,
    pub state: u32,
    /// 100-nanosecond ticks since 1601-01-01 UTC.
    pub creation_time: u64,
    pub key_len: u32,
    /// Address of the key when it is not stored inline, 0 otherwise.
    pub long_key: u32,
    pub data_size: [u32; MAX_STREAMS],
    pub data_addr: [u32; MAX_STREAMS],
    pub flags: u32,
}

impl EntryRecord {
    /// Reads the fixed fields and the reserved trailer, leaving the reader at the inline key.
    pub fn from_reader<R: Read>(reader: &mut R) -> Result<Self> {
        let hash = reader.read_u32::<LittleEndian>()?;
        let next = reader.read_u32::<LittleEndian>()?;
        let rankings_node = reader.read_u32::<LittleEndian>()?;
        let reuse_count = reader.read_u32::<LittleEndian>()?;
        let refetch_count = reader.read_u32::<LittleEndian>()?;
        let state = reader.read_u32::<LittleEndian>()?;
        let creation_time = reader.read_u64::<LittleEndian>()?;
        let key_len = reader.read_u32::<LittleEndian>()?;
        let long_key = reader.read_u32::<LittleEndian>()?;
        let mut data_size = [0u32; MAX_STREAMS];
        reader.read_u32_into::<LittleEndian>(&mut data_size)?;
        let mut data_addr = [0u32; MAX_STREAMS];
        reader.read_u32_into::<LittleEndian>(&mut data_addr)?;
        let flags = reader.read_u32::<LittleEndian>()?;
        skip_bytes(reader, (RESERVED_WORDS * 4) as u64)?;
        Ok(Self {
            hash,
            next,
            rankings_node,
            reuse_count,
            refetch_count,
            state,
            creation_time,
            key_len,
            long_key,
            data_size,
            data_addr,
            flags,
        })
    }

    pub fn to_writer<W: Write>(&self, writer: &mut W) -> Result<()> {
        writer.write_u32::<LittleEndian>(self.hash)?;
        writer.write_u32::<LittleEndian>(self.next)?;
        writer.write_u32::<LittleEndian>(self.rankings_node)?;
        writer.write_u32::<LittleEndian>(self.reuse_count)?;
        writer.write_u32::<LittleEndian>(self.refetch_count)?;
        writer.write_u32::<LittleEndian>(self.state)?;
        writer.write_u64::<LittleEndian>(self.creation_time)?;
        writer.write_u32::<LittleEndian>(self.key_len)?;
        writer.write_u32::<LittleEndian>(self.long_key)?;
        for size in self.data_size {
            writer.write_u32::<LittleEndian>(size)?;
        }
        for addr in self.data_addr {
            writer.write_u32::<LittleEndian>(addr)?;
        }
        writer.write_u32::<LittleEndian>(self.flags)?;
        writer.write_all(&[0u8; RESERVED_WORDS * 4])?;
        Ok(())
    }
}

/// The key of an entry, usually the URL of the cached resource.
#[derive(Debug, Clone)]
pub enum EntryKey {
    Inline(String),
    External(DataStream),
    /// The long-key address could not be resolved.
    Unavailable,
}

impl EntryKey {
    /// Key text; external keys are bounded by `key_len`.
    pub fn text(&self, key_len: u32) -> Option<Cow<'_, str>> {
        match self {
            EntryKey::Inline(key) => Some(Cow::Borrowed(key.as_str())),
            EntryKey::External(stream) => {
                let len = stream.data.len().min(key_len as usize);
                Some(Cow::Owned(decode_ascii(bytes_from_cstr(&stream.data[..len]))))
            }
            EntryKey::Unavailable => None,
        }
    }
}

/// A materialized cache entry with its key and resolved data streams.
#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub address: CacheAddress,
    pub record: EntryRecord,
    pub key: EntryKey,
    /// Resolved streams by slot; `None` where the slot is unused or unusable.
    pub streams: [Option<DataStream>; MAX_STREAMS],
    header_slot: Option<usize>,
}

impl CacheEntry {
    /// Reads the entry stored at `address` and resolves its streams and key.
    ///
    /// Unusable stream or key pointers are not errors; the slot is left empty. Only
    /// failures to read the record itself are returned.
    pub fn read(cache: &CacheReader, address: CacheAddress) -> Result<Self> {
        if !address.is_separate_file() {
            cache.validate_block_file(&address)?;
        }
        let mut reader = BufReader::new(File::open(cache.file_path(&address))?);
        reader.seek(SeekFrom::Start(address.file_offset()))?;
        let record = EntryRecord::from_reader(&mut reader)?;

        let mut streams: [Option<DataStream>; MAX_STREAMS] = Default::default();
        for (slot, stream) in streams.iter_mut().enumerate() {
            *stream = Self::resolve_stream(cache, &record, slot);
        }
        let header_slot = streams
            .iter()
            .position(|stream| stream.as_ref().is_some_and(DataStream::is_http_headers));

        let key = if record.long_key == 0 {
            let mut key_bytes = Vec::new();
            (&mut reader).take(record.key_len as u64).read_to_end(&mut key_bytes)?;
            if key_bytes.len() < record.key_len as usize {
                debug!("{}: inline key truncated, {} of {} bytes", address, key_bytes.len(), record.key_len);
            }
            EntryKey::Inline(decode_ascii(&key_bytes))
        } else {
            match CacheAddress::decode(record.long_key)
                .and_then(|key_addr| DataStream::read(cache, key_addr, record.key_len, false))
            {
                Ok(stream) => EntryKey::External(stream),
                Err(e) => {
                    warn!("{}: long key unavailable: {}", address, e);
                    EntryKey::Unavailable
                }
            }
        };

        trace!("{}: entry {:#x}, next {:#010x}", address, record.hash, record.next);
        Ok(Self { address, record, key, streams, header_slot })
    }

    fn resolve_stream(cache: &CacheReader, record: &EntryRecord, slot: usize) -> Option<DataStream> {
        let raw = record.data_addr[slot];
        let size = record.data_size[slot];
        let result = CacheAddress::decode(raw).and_then(|addr| DataStream::read(cache, addr, size, true));
        match result {
            Ok(stream) => Some(stream),
            Err(CacheError::NullAddress { .. }) => None,
            Err(e) => {
                debug!("Entry {:#x}: stream {} unavailable: {}", record.hash, slot, e);
                None
            }
        }
    }

    pub fn hash(&self) -> u32 {
        self.record.hash
    }

    /// Raw address of the next entry in the bucket chain, 0 at the end.
    pub fn next(&self) -> u32 {
        self.record.next
    }

    pub fn creation_time(&self) -> Option<DateTime<Utc>> {
        ticks_to_datetime(self.record.creation_time)
    }

    pub fn key_text(&self) -> Option<Cow<'_, str>> {
        self.key.text(self.record.key_len)
    }

    /// Slot of the designated header stream: the first stream recognized as HTTP headers.
    pub fn header_slot(&self) -> Option<usize> {
        self.header_slot
    }

    pub fn header_stream(&self) -> Option<&DataStream> {
        self.header_slot.and_then(|slot| self.streams[slot].as_ref())
    }

    pub fn headers(&self) -> Option<&HttpHeaderSet> {
        self.header_stream().and_then(DataStream::headers)
    }

    /// Resolved streams other than the designated header stream.
    ///
    /// Each stream comes with its position among all resolved streams of the entry, the
    /// header stream included; absent slots are not counted.
    pub fn payload_streams(&self) -> impl Iterator<Item = (usize, &DataStream)> {
        self.streams
            .iter()
            .enumerate()
            .filter_map(|(slot, stream)| stream.as_ref().map(|s| (slot, s)))
            .enumerate()
            .filter(move |(_, (slot, _))| Some(*slot) != self.header_slot)
            .map(|(index, (_, stream))| (index, stream))
    }
}

use serde::Serialize;

use crate::exporter::cache_exporter::content_type_bucket;
use crate::storage::entry::CacheEntry;

/// One line of the `--list` output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EntrySummary {
    pub hash: String,
    pub address: String,
    pub key: Option<String>,
    /// RFC 3339 creation time, absent when out of range.
    pub created: Option<String>,
    pub state: u32,
    pub reuse_count: u32,
    pub refetch_count: u32,
    pub content_type: String,
    pub header_slot: Option<usize>,
    /// Bytes read per slot, `None` for absent slots.
    pub stream_sizes: [Option<usize>; 4],
}

impl From<&CacheEntry> for EntrySummary {
    fn from(entry: &CacheEntry) -> Self {
        Self {
            hash: format!("{:#x}", entry.hash()),
            address: entry.address.to_string(),
            key: entry.key_text().map(|k| k.into_owned()),
            created: entry.creation_time().map(|t| t.to_rfc3339()),
            state: entry.record.state,
            reuse_count: entry.record.reuse_count,
            refetch_count: entry.record.refetch_count,
            content_type: content_type_bucket(entry.headers()).to_string(),
            header_slot: entry.header_slot(),
            stream_sizes: entry.streams.each_ref().map(|s| s.as_ref().map(|s| s.data.len())),
        }
    }
}

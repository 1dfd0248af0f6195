//! Helper functions for reading and decoding cache records.
//!
//! This module provides utility functions for:
//! - Skipping reserved gaps in fixed layouts
//! - C-string and ASCII key decoding
//! - Borrowed byte-pattern scanning
//! - 1601-epoch timestamp conversion

use std::io::{self, Read};

use chrono::{DateTime, Utc};
use log::debug;

/// Seconds between 1601-01-01 and 1970-01-01.
const EPOCH_1601_TO_UNIX_SECS: i64 = 11_644_473_600;
const TICKS_PER_SECOND: u64 = 10_000_000;

/// Skips `count` reserved bytes, failing if the reader ends first.
pub fn skip_bytes<R: Read>(reader: &mut R, count: u64) -> io::Result<()> {
    let skipped = io::copy(&mut reader.by_ref().take(count), &mut io::sink())?;
    if skipped != count {
        return Err(io::Error::new(
            io::ErrorKind::UnexpectedEof,
            format!("expected {} reserved bytes, found {}", count, skipped),
        ));
    }
    Ok(())
}

/// Strips a single trailing zero byte.
pub fn bytes_from_cstr(cstr: &[u8]) -> &[u8] {
    match cstr.split_last() {
        Some((0, rest)) => rest,
        _ => cstr,
    }
}

/// Decodes key bytes as ASCII text. Non-ASCII bytes become U+FFFD.
pub fn decode_ascii(bytes: &[u8]) -> String {
    let bytes = bytes_from_cstr(bytes);
    if bytes.is_ascii() {
        return bytes.iter().map(|&b| b as char).collect();
    }
    debug!("Non-ASCII bytes in key of length {}", bytes.len());
    bytes
        .iter()
        .map(|&b| if b.is_ascii() { b as char } else { char::REPLACEMENT_CHARACTER })
        .collect()
}

/// Position of the first occurrence of `needle` in `haystack`.
pub fn find_bytes(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    if needle.is_empty() {
        return Some(0);
    }
    haystack.windows(needle.len()).position(|window| window == needle)
}

/// Converts 100-nanosecond ticks since 1601-01-01 UTC to a calendar time.
///
/// Returns `None` for values outside the range chrono can represent.
pub fn ticks_to_datetime(ticks: u64) -> Option<DateTime<Utc>> {
    let secs = (ticks / TICKS_PER_SECOND) as i64 - EPOCH_1601_TO_UNIX_SECS;
    let nanos = ((ticks % TICKS_PER_SECOND) * 100) as u32;
    DateTime::from_timestamp(secs, nanos)
}

/// Inverse of [`ticks_to_datetime`]; `None` for times before 1601.
pub fn datetime_to_ticks(time: &DateTime<Utc>) -> Option<u64> {
    let secs = time.timestamp().checked_add(EPOCH_1601_TO_UNIX_SECS)?;
    let secs = u64::try_from(secs).ok()?;
    Some(secs * TICKS_PER_SECOND + (time.timestamp_subsec_nanos() / 100) as u64)
}

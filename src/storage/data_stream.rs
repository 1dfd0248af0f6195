//! Data streams of cache entries and embedded HTTP header blocks.
//!
//! A stream lives either inside a shared `data_N` block file or in a dedicated `f_XXXXXX`
//! file. Streams stored in blocks may carry the response headers the browser saved for
//! the entry, as NUL-separated lines starting at an `HTTP` status line and ending at a
//! double NUL.

use std::fs::File;
use std::io::{BufReader, Read, Seek, SeekFrom};

use indexmap::IndexMap;
use log::{debug, trace};

use crate::readers::CacheReader;
use crate::storage::address::CacheAddress;
use crate::storage::reader_helper::find_bytes;
use crate::utils::compression::ContentEncoding;
use crate::Result;

const HTTP_MARKER: &[u8] = b"HTTP";
const HEADER_TERMINATOR: &[u8] = b"\0\0";

/// Lower-cased header name to raw value, in first-seen order.
///
/// A repeated name keeps its first position and takes the last value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HttpHeaderSet {
    headers: IndexMap<String, String>,
}

impl HttpHeaderSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a header, lower-casing the name.
    pub fn insert<N: AsRef<str>, V: Into<String>>(&mut self, name: N, value: V) {
        self.headers.insert(name.as_ref().to_lowercase(), value.into());
    }

    /// Looks up a header by name, case-insensitively.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.headers.get(&name.to_lowercase()).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.headers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.headers.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.headers.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Media type of `content-type`, without parameters.
    pub fn content_type(&self) -> Option<&str> {
        let value = self.get("content-type")?;
        let media_type = value.split(';').next().unwrap_or_default().trim();
        if media_type.is_empty() { None } else { Some(media_type) }
    }

    pub fn content_encoding(&self) -> ContentEncoding {
        self.get("content-encoding").map(ContentEncoding::from_header).unwrap_or_default()
    }

    /// Renders one `name: value` line per header.
    pub fn to_text(&self) -> String {
        let mut text = String::new();
        for (name, value) in self.iter() {
            text.push_str(name);
            text.push_str(": ");
            text.push_str(value);
            text.push('\n');
        }
        text
    }
}

/// Scans `data` for an embedded HTTP header block.
///
/// Returns `None` when there is no `HTTP` marker or no double-NUL terminator after it.
/// The status line is dropped; each following segment is split at its first colon.
///
/// # Examples
///
/// ```
/// use webcache::storage::parse_http_header_block;
///
/// let raw = b"junkHTTP/1.1 200 OK\0Content-Type: text/html\0\0tail";
/// let headers = parse_http_header_block(raw).unwrap();
/// assert_eq!(headers.get("content-type"), Some("text/html"));
/// assert_eq!(headers.len(), 1);
/// ```
pub fn parse_http_header_block(data: &[u8]) -> Option<HttpHeaderSet> {
    let start = find_bytes(data, HTTP_MARKER)?;
    let data = &data[start..];
    let end = find_bytes(data, HEADER_TERMINATOR)?;
    let block = &data[..end];

    let mut headers = HttpHeaderSet::new();
    for line in block.split(|&b| b == 0).skip(1) {
        if line.is_empty() {
            continue;
        }
        let (name, value) = match line.iter().position(|&b| b == b':') {
            Some(colon) => (&line[..colon], &line[colon + 1..]),
            None => (line, &line[line.len()..]),
        };
        let name = String::from_utf8_lossy(name);
        let value = String::from_utf8_lossy(value);
        headers.insert(name.trim(), value.trim());
    }
    Some(headers)
}

/// How the bytes of a stream were recognized.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamKind {
    /// Generic payload.
    Payload,
    /// An HTTP header block.
    HttpHeaders(HttpHeaderSet),
}

/// Resolved bytes of one of an entry's data slots.
#[derive(Debug, Clone)]
pub struct DataStream {
    pub address: CacheAddress,
    /// Size recorded in the entry; separate files use their file length instead.
    pub declared_size: u32,
    pub data: Vec<u8>,
    pub kind: StreamKind,
}

impl DataStream {
    /// Reads the stream at `address`.
    ///
    /// With `detect_headers`, block-stored streams are scanned for an HTTP header block;
    /// separate files are never scanned.
    pub fn read(cache: &CacheReader, address: CacheAddress, size: u32, detect_headers: bool) -> Result<Self> {
        let data = if address.is_separate_file() {
            let mut reader = BufReader::new(File::open(cache.file_path(&address))?);
            let mut buffer = Vec::new();
            reader.read_to_end(&mut buffer)?;
            buffer
        } else {
            cache.validate_block_file(&address)?;
            let mut reader = BufReader::new(File::open(cache.file_path(&address))?);
            reader.seek(SeekFrom::Start(address.file_offset()))?;
            let mut buffer = Vec::new();
            reader.take(size as u64).read_to_end(&mut buffer)?;
            if buffer.len() < size as usize {
                debug!("{}: short read, {} of {} bytes", address, buffer.len(), size);
            }
            buffer
        };

        let kind = if detect_headers && !address.is_separate_file() {
            match parse_http_header_block(&data) {
                Some(headers) => {
                    trace!("{}: {} HTTP headers", address, headers.len());
                    StreamKind::HttpHeaders(headers)
                }
                None => StreamKind::Payload,
            }
        } else {
            StreamKind::Payload
        };
        Ok(Self { address, declared_size: size, data, kind })
    }

    pub fn headers(&self) -> Option<&HttpHeaderSet> {
        match &self.kind {
            StreamKind::HttpHeaders(headers) => Some(headers),
            StreamKind::Payload => None,
        }
    }

    pub fn is_http_headers(&self) -> bool {
        matches!(self.kind, StreamKind::HttpHeaders(_))
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::storage::address::BlockType;
    use crate::storage::test_fixtures::CacheFixture;

    #[test]
    fn test_parse_header_block() {
        let raw = b"...garbage...HTTP/1.1 200 OK\0Content-Type: text/html\0Content-Encoding: gzip\0\0more...";
        let headers = parse_http_header_block(raw).unwrap();
        let pairs: Vec<_> = headers.iter().collect();
        assert_eq!(pairs, vec![("content-type", "text/html"), ("content-encoding", "gzip")]);
        assert_eq!(headers.content_encoding(), ContentEncoding::Gzip);
    }

    #[test]
    fn test_parse_requires_marker_and_terminator() {
        assert!(parse_http_header_block(b"no marker here\0\0").is_none());
        assert!(parse_http_header_block(b"HTTP/1.1 200 OK\0Server: x\0").is_none());
        // A terminator that appears only before the marker does not count.
        assert!(parse_http_header_block(b"\0\0HTTP/1.1 200 OK\0Server: x").is_none());
    }

    #[test]
    fn test_value_keeps_later_colons() {
        let headers = parse_http_header_block(b"HTTP/1.1 301\0Location: https://a.example:8443/x\0\0").unwrap();
        assert_eq!(headers.get("location"), Some("https://a.example:8443/x"));
    }

    #[test]
    fn test_duplicate_names_last_value_first_position() {
        let headers =
            parse_http_header_block(b"HTTP/1.1 200\0Set-Cookie: a=1\0Date: x\0set-cookie: b=2\0\0").unwrap();
        let pairs: Vec<_> = headers.iter().collect();
        assert_eq!(pairs, vec![("set-cookie", "b=2"), ("date", "x")]);
    }

    #[test]
    fn test_content_type_bucket_strips_parameters() {
        let headers =
            parse_http_header_block(b"HTTP/1.1 200\0Content-Type: text/html; charset=utf-8\0\0").unwrap();
        assert_eq!(headers.content_type(), Some("text/html"));
        assert_eq!(headers.to_text(), "content-type: text/html; charset=utf-8\n");
    }

    #[test]
    fn test_read_block_stream_detects_headers() {
        let fixture = CacheFixture::new();
        let header_block = b"HTTP/1.1 200 OK\0Content-Type: image/png\0\0";
        let addr = fixture.put_block(BlockType::Block256, 1, 4, header_block);
        let cache = fixture.open();

        let stream = DataStream::read(&cache, addr, header_block.len() as u32, true).unwrap();
        assert_eq!(stream.data, header_block.to_vec());
        assert_eq!(stream.headers().and_then(|h| h.content_type()), Some("image/png"));

        let plain = DataStream::read(&cache, addr, header_block.len() as u32, false).unwrap();
        assert_eq!(plain.kind, StreamKind::Payload);
    }

    #[test]
    fn test_separate_file_reads_whole_file_and_is_never_typed() {
        let fixture = CacheFixture::new();
        let body = b"HTTP/1.1 200 OK\0Content-Type: text/plain\0\0body";
        let addr = fixture.put_separate_file(0x10, body);
        let cache = fixture.open();

        let stream = DataStream::read(&cache, addr, 3, true).unwrap();
        assert_eq!(stream.data, body.to_vec());
        assert_eq!(stream.kind, StreamKind::Payload);
    }

    #[test]
    fn test_block_file_with_bad_magic_is_unusable() {
        let fixture = CacheFixture::new();
        let addr = fixture.put_block(BlockType::Block1024, 2, 0, b"payload");
        fixture.corrupt_block_file_magic(2);
        let cache = fixture.open();

        let err = DataStream::read(&cache, addr, 7, true).unwrap_err();
        assert!(err.is_absent_pointer());
    }

    #[test]
    fn test_block_stream_past_end_of_file_returns_available_bytes() {
        let fixture = CacheFixture::new();
        let header_block = b"HTTP/1.1 200 OK\0Content-Type: text/plain\0\0";
        let addr = fixture.put_block(BlockType::Block256, 1, 0, header_block);
        let cache = fixture.open();

        let stream = DataStream::read(&cache, addr, 4096, true).unwrap();
        assert_eq!(stream.declared_size, 4096);
        assert_eq!(stream.data, header_block.to_vec());
        assert_eq!(stream.headers().and_then(|h| h.content_type()), Some("text/plain"));

        let stream = DataStream::read(&cache, addr, u32::MAX, false).unwrap();
        assert_eq!(stream.data.len(), header_block.len());
    }
}

//! Writes recovered entries to a content-type bucketed directory tree.
//!
//! For every entry, each resolved stream other than the header stream is written to
//! `<out>/<media-type>/<hash>_<index>`, decoded when the headers declare a supported
//! content encoding. `index` is the stream's position among the entry's resolved streams.
//! The headers themselves go to `<out>/<media-type>/<hash>.header`. Entries without
//! headers, or without a content type, land in `<out>/unknown`.
//!
//! A file that cannot be written is logged and counted; the export goes on with the
//! next file.

use std::path::{Path, PathBuf};

use log::{debug, info, warn};
use serde::Serialize;

use crate::exporter::export_config::ExportConfig;
use crate::readers::CacheReader;
use crate::storage::data_stream::HttpHeaderSet;
use crate::storage::entry::CacheEntry;
use crate::utils::compression::{get_decompressor, ContentEncoding};
use crate::utils::io_utils::{bucket_dir, write_file_creating_dirs, UNKNOWN_BUCKET};
use crate::utils::progress_report::{ProgressReportFn, ProgressState};
use crate::Result;

/// Counters of one export run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ExportReport {
    pub entries: u64,
    pub payload_files: u64,
    pub header_files: u64,
    pub decompressed: u64,
    /// Bodies that declared an encoding but failed to decode; written as stored.
    pub decompress_failures: u64,
    /// Output files that could not be written.
    pub write_failures: u64,
    /// Set when the progress reporter asked to stop.
    pub cancelled: bool,
}

/// Media type used to bucket an entry's files.
pub fn content_type_bucket(headers: Option<&HttpHeaderSet>) -> &str {
    headers.and_then(HttpHeaderSet::content_type).unwrap_or(UNKNOWN_BUCKET)
}

/// File name stem of an entry's outputs.
pub fn entry_file_stem(hash: u32) -> String {
    format!("{:#x}", hash)
}

pub struct CacheExporter {
    config: ExportConfig,
    progress_reporter: Option<ProgressReportFn>,
}

impl CacheExporter {
    pub fn new(config: ExportConfig) -> Self {
        Self { config, progress_reporter: None }
    }

    pub fn with_progress_reporter(mut self, reporter: ProgressReportFn) -> Self {
        self.progress_reporter = Some(reporter);
        self
    }

    pub fn config(&self) -> &ExportConfig {
        &self.config
    }

    /// Walks `cache` and exports every reachable entry.
    pub fn export_cache(&self, cache: &CacheReader) -> Result<ExportReport> {
        let total = cache.index_header().num_entries as u64;
        self.export(cache.walk()?, total)
    }

    /// Exports `entries`; `expected_total` only drives progress reporting.
    pub fn export<I: IntoIterator<Item = CacheEntry>>(&self, entries: I, expected_total: u64) -> Result<ExportReport> {
        let mut report = ExportReport::default();
        let mut progress = ProgressState::new("export", expected_total, 5, self.progress_reporter);
        for (index, entry) in entries.into_iter().enumerate() {
            self.export_entry(&entry, &mut report);
            report.entries += 1;
            if progress.report(index as u64) {
                report.cancelled = true;
                break;
            }
        }
        info!(
            "Exported {} entries: {} payload files, {} header files, {} decompressed, {} left compressed",
            report.entries, report.payload_files, report.header_files, report.decompressed, report.decompress_failures
        );
        if report.write_failures > 0 {
            warn!("{} output files could not be written", report.write_failures);
        }
        Ok(report)
    }

    /// Writes the payload streams and header sidecar of one entry.
    pub fn export_entry(&self, entry: &CacheEntry, report: &mut ExportReport) {
        let headers = entry.headers();
        let dir = bucket_dir(&self.config.output_dir, content_type_bucket(headers));
        let stem = entry_file_stem(entry.hash());
        let encoding = headers.map(HttpHeaderSet::content_encoding).unwrap_or_default();

        for (index, stream) in entry.payload_streams() {
            let path = dir.join(format!("{}_{}", stem, index));
            if !write_output(&path, &stream.data, report) {
                continue;
            }
            report.payload_files += 1;
            if self.config.decompress && encoding != ContentEncoding::Identity {
                decompress_in_place(&path, &stream.data, encoding, report);
            }
            debug!("{}: {} bytes from {}", path.display(), stream.data.len(), stream.address);
        }

        if let Some(headers) = headers {
            if self.config.write_headers {
                let path = dir.join(format!("{}.header", stem));
                if write_output(&path, headers.to_text().as_bytes(), report) {
                    report.header_files += 1;
                }
            }
        }
    }

    /// Path of the payload file at `index` for an entry with `hash` and `headers`.
    pub fn payload_path(&self, hash: u32, headers: Option<&HttpHeaderSet>, index: usize) -> PathBuf {
        bucket_dir(&self.config.output_dir, content_type_bucket(headers))
            .join(format!("{}_{}", entry_file_stem(hash), index))
    }
}

/// Writes one output file; a failure is logged and counted.
fn write_output(path: &Path, data: &[u8], report: &mut ExportReport) -> bool {
    match write_file_creating_dirs(path, data) {
        Ok(()) => true,
        Err(e) => {
            warn!("{}: write failed: {}", path.display(), e);
            report.write_failures += 1;
            false
        }
    }
}

fn decompress_in_place(path: &Path, stored: &[u8], encoding: ContentEncoding, report: &mut ExportReport) {
    match get_decompressor(encoding).decompress(stored) {
        Ok(decoded) => {
            if write_output(path, &decoded, report) {
                report.decompressed += 1;
            }
        }
        Err(e) => {
            warn!("{}: kept as stored: {}", path.display(), e);
            report.decompress_failures += 1;
        }
    }
}

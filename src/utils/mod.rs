// Utility functions and helpers
//
// This module provides body decompression, output-tree I/O helpers and progress
// reporting.

pub mod io_utils;
pub mod progress_report;
pub mod compression;

pub use io_utils::{bucket_dir, write_file_creating_dirs};
pub use progress_report::{ProgressState, ProgressReportFn};
pub use compression::{ContentEncoding, get_decompressor};

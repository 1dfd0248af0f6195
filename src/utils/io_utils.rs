//! I/O utility functions for the export tree.
//!
//! This module provides helper functions for:
//! - Writing files with their parent directories created on demand
//! - Turning untrusted header values into safe relative paths

use std::fs;
use std::path::{Path, PathBuf};

use crate::Result;

/// Bucket used when no usable content type is known.
pub const UNKNOWN_BUCKET: &str = "unknown";

/// Writes `data` to `path`, creating missing parent directories.
pub fn write_file_creating_dirs<P: AsRef<Path>>(path: P, data: &[u8]) -> Result<()> {
    let path = path.as_ref();
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, data)?;
    Ok(())
}

fn sanitize_component(component: &str) -> Option<String> {
    let component = component.trim();
    if component.is_empty() || component == "." || component == ".." {
        return None;
    }
    Some(
        component
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || "-+._".contains(c) { c } else { '_' })
            .collect(),
    )
}

/// Normalizes a media type such as `text/html` into relative path components.
///
/// Empty, `.` and `..` components are dropped and unusual characters replaced, so the
/// result always stays below the directory it is joined to. Falls back to
/// [`UNKNOWN_BUCKET`] when nothing is left.
pub fn bucket_components(media_type: &str) -> Vec<String> {
    let components: Vec<String> = media_type.split(['/', '\\']).filter_map(sanitize_component).collect();
    if components.is_empty() {
        vec![UNKNOWN_BUCKET.to_string()]
    } else {
        components
    }
}

/// Joins the components of [`bucket_components`] onto `base`.
pub fn bucket_dir<P: AsRef<Path>>(base: P, media_type: &str) -> PathBuf {
    let mut dir = base.as_ref().to_path_buf();
    dir.extend(bucket_components(media_type));
    dir
}

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::readers::cache_reader::DEFAULT_MAX_CHAIN_LENGTH;
use crate::Result;

/// Configuration for exporting a cache.
///
/// Can be loaded from a JSON file; missing fields take their defaults.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportConfig {
    /// Root of the output tree
    pub output_dir: PathBuf,
    /// Whether to undo a declared gzip/deflate content encoding
    pub decompress: bool,
    /// Whether to write `<hash>.header` sidecar files
    pub write_headers: bool,
    /// Bound on entries followed in one hash bucket chain
    pub max_chain_length: usize,
}

impl Default for ExportConfig {
    fn default() -> Self {
        ExportConfig {
            output_dir: PathBuf::from("out"),
            decompress: true,
            write_headers: true,
            max_chain_length: DEFAULT_MAX_CHAIN_LENGTH,
        }
    }
}

impl ExportConfig {
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let text = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&text)?)
    }
}

// Export of recovered entries
//
// This module writes materialized cache entries to a content-type bucketed output tree
// and renders entry summaries for listing.

pub mod cache_exporter;
pub mod export_config;
pub mod listing;

pub use cache_exporter::{CacheExporter, ExportReport, content_type_bucket};
pub use export_config::ExportConfig;
pub use listing::EntrySummary;

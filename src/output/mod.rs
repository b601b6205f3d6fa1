//! Output module for telemetry statistics and reports
//!
//! This module handles:
//! - Loading persisted telemetry and printing statistics
//! - Generating the markdown crawl report (overall stats, problem sites,
//!   strategy performance, success-rate trend)
//! - Exporting the monitor snapshot as JSON

mod markdown;
pub mod stats;

pub use markdown::{format_markdown_report, generate_markdown_report};
pub use stats::{load_statistics, print_crawling_stats, print_statistics, TelemetryStatistics};

use crate::monitor::MonitorSnapshot;
use crate::storage::StorageError;
use std::fs;
use std::path::Path;
use thiserror::Error;

/// Errors that can occur during output operations
#[derive(Debug, Error)]
pub enum OutputError {
    #[error("Failed to format output: {0}")]
    Format(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
}

/// Result type for output operations
pub type OutputResult<T> = Result<T, OutputError>;

/// Writes a monitor snapshot as pretty-printed JSON
///
/// # Arguments
///
/// * `snapshot` - The snapshot to export
/// * `output_path` - Destination file, overwritten if present
pub fn export_snapshot_json(snapshot: &MonitorSnapshot, output_path: &Path) -> OutputResult<()> {
    let json = snapshot
        .to_json()
        .map_err(|e| OutputError::Format(e.to_string()))?;
    fs::write(output_path, json)?;
    Ok(())
}

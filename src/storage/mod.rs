//! Storage module for persisting crawl telemetry
//!
//! This module handles all database operations for the crawler:
//! - SQLite database initialization and schema management
//! - Strategy performance persistence, so the ledger survives restarts
//! - Crawl attempt history with retention pruning

mod schema;
mod sqlite;
mod traits;

pub use sqlite::SqliteTelemetryStore;
pub use traits::{StorageError, StorageResult, TelemetryStore};

use std::path::Path;

/// Opens (creating if needed) a telemetry database
///
/// # Arguments
///
/// * `path` - Path to the SQLite database file
///
/// # Returns
///
/// * `Ok(SqliteTelemetryStore)` - Successfully initialized storage
/// * `Err(StorageError)` - Failed to open or initialize the database
pub fn open_store(path: &Path) -> StorageResult<SqliteTelemetryStore> {
    SqliteTelemetryStore::new(path)
}

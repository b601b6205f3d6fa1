//! Storage traits and error types

use crate::fetcher::ErrorCategory;
use crate::monitor::CrawlAttempt;
use crate::strategy::StrategyPerformanceRecord;
use chrono::{DateTime, Utc};
use thiserror::Error;

/// Errors that can occur during storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("Corrupt row in {table}: {message}")]
    CorruptRow { table: &'static str, message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Persistence for crawl telemetry
///
/// Extracted content is never stored; only the performance ledger and the
/// attempt history are.
pub trait TelemetryStore: Send {
    // ===== Strategy Performance =====

    /// Writes the full ledger, replacing rows for the same (domain, strategy)
    fn save_performance(&mut self, records: &[StrategyPerformanceRecord]) -> StorageResult<()>;

    /// Reads every persisted ledger row, sorted by domain then strategy
    fn load_performance(&self) -> StorageResult<Vec<StrategyPerformanceRecord>>;

    // ===== Attempt History =====

    /// Appends attempts
    ///
    /// # Returns
    ///
    /// Number of rows written
    fn append_attempts(&mut self, attempts: &[CrawlAttempt]) -> StorageResult<usize>;

    /// The `limit` most recent attempts, newest first
    fn recent_attempts(&self, limit: usize) -> StorageResult<Vec<CrawlAttempt>>;

    /// Deletes attempts recorded before `before`
    ///
    /// # Returns
    ///
    /// Number of rows deleted
    fn prune_attempts(&mut self, before: DateTime<Utc>) -> StorageResult<usize>;

    // ===== Statistics =====

    fn count_attempts(&self) -> StorageResult<u64>;

    fn count_successful_attempts(&self) -> StorageResult<u64>;

    /// Failure counts per category, most common first
    fn error_summary(&self) -> StorageResult<Vec<(ErrorCategory, u64)>>;
}

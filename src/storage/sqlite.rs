//! SQLite storage implementation
//!
//! This module provides a SQLite-based implementation of the TelemetryStore trait.

use crate::fetcher::ErrorCategory;
use crate::monitor::CrawlAttempt;
use crate::profile::Strategy;
use crate::storage::schema::initialize_schema;
use crate::storage::traits::{StorageError, StorageResult, TelemetryStore};
use crate::strategy::StrategyPerformanceRecord;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection};
use std::path::Path;

/// SQLite storage backend
pub struct SqliteTelemetryStore {
    conn: Connection,
}

impl SqliteTelemetryStore {
    /// Creates a new SqliteTelemetryStore instance
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the SQLite database file
    ///
    /// # Returns
    ///
    /// * `Ok(SqliteTelemetryStore)` - Successfully opened/created database
    /// * `Err(StorageError)` - Failed to open database
    pub fn new(path: &Path) -> StorageResult<Self> {
        let conn = Connection::open(path)?;

        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA temp_store = MEMORY;
        ",
        )?;

        initialize_schema(&conn)?;

        Ok(Self { conn })
    }

    /// Creates an in-memory database (for testing)
    #[cfg(test)]
    pub fn new_in_memory() -> StorageResult<Self> {
        let conn = Connection::open_in_memory()?;
        initialize_schema(&conn)?;
        Ok(Self { conn })
    }
}

fn parse_timestamp(table: &'static str, raw: &str) -> StorageResult<DateTime<Utc>> {
    raw.parse::<DateTime<Utc>>()
        .map_err(|e| StorageError::CorruptRow {
            table,
            message: format!("bad timestamp '{}': {}", raw, e),
        })
}

fn parse_strategy(table: &'static str, raw: &str) -> StorageResult<Strategy> {
    Strategy::from_db_string(raw).ok_or_else(|| StorageError::CorruptRow {
        table,
        message: format!("unknown strategy '{}'", raw),
    })
}

impl TelemetryStore for SqliteTelemetryStore {
    // ===== Strategy Performance =====

    fn save_performance(&mut self, records: &[StrategyPerformanceRecord]) -> StorageResult<()> {
        let now = Utc::now().to_rfc3339();
        let tx = self.conn.transaction()?;
        {
            let mut stmt = tx.prepare(
                "INSERT OR REPLACE INTO strategy_performance
                 (domain, strategy, total_attempts, successful_attempts, total_response_time,
                  total_content_length, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            )?;
            for record in records {
                stmt.execute(params![
                    record.domain,
                    record.strategy.as_str(),
                    record.total_attempts as i64,
                    record.successful_attempts as i64,
                    record.total_response_time,
                    record.total_content_length as i64,
                    now,
                ])?;
            }
        }
        tx.commit()?;
        Ok(())
    }

    fn load_performance(&self) -> StorageResult<Vec<StrategyPerformanceRecord>> {
        let mut stmt = self.conn.prepare(
            "SELECT domain, strategy, total_attempts, successful_attempts, total_response_time,
                    total_content_length
             FROM strategy_performance ORDER BY domain, strategy",
        )?;

        let rows = stmt.query_map([], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, i64>(2)?,
                row.get::<_, i64>(3)?,
                row.get::<_, f64>(4)?,
                row.get::<_, i64>(5)?,
            ))
        })?;

        let mut records = Vec::new();
        for row in rows {
            let (domain, strategy, total, successful, response_time, content_length) = row?;
            records.push(StrategyPerformanceRecord {
                domain,
                strategy: parse_strategy("strategy_performance", &strategy)?,
                total_attempts: total.max(0) as u64,
                successful_attempts: successful.max(0) as u64,
                total_response_time: response_time,
                total_content_length: content_length.max(0) as u64,
            });
        }
        records.sort_by(|a, b| a.domain.cmp(&b.domain).then(a.strategy.cmp(&b.strategy)));
        Ok(records)
    }

    // ===== Attempt History =====

    fn append_attempts(&mut self, attempts: &[CrawlAttempt]) -> StorageResult<usize> {
        let tx = self.conn.transaction()?;
        {
            let mut stmt = tx.prepare(
                "INSERT INTO crawl_attempts
                 (seq, url, domain, strategy, success, content_length, error, response_time, attempted_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            )?;
            for attempt in attempts {
                stmt.execute(params![
                    attempt.seq as i64,
                    attempt.url,
                    attempt.domain,
                    attempt.strategy.as_str(),
                    attempt.success,
                    attempt.content_length as i64,
                    attempt.error.map(|e| e.as_str()),
                    attempt.response_time,
                    attempt.timestamp.to_rfc3339(),
                ])?;
            }
        }
        tx.commit()?;
        Ok(attempts.len())
    }

    fn recent_attempts(&self, limit: usize) -> StorageResult<Vec<CrawlAttempt>> {
        let mut stmt = self.conn.prepare(
            "SELECT seq, url, domain, strategy, success, content_length, error, response_time, attempted_at
             FROM crawl_attempts ORDER BY attempted_at DESC, id DESC LIMIT ?1",
        )?;

        let rows = stmt.query_map(params![limit as i64], |row| {
            Ok((
                row.get::<_, i64>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, String>(3)?,
                row.get::<_, bool>(4)?,
                row.get::<_, i64>(5)?,
                row.get::<_, Option<String>>(6)?,
                row.get::<_, f64>(7)?,
                row.get::<_, String>(8)?,
            ))
        })?;

        let mut attempts = Vec::new();
        for row in rows {
            let (seq, url, domain, strategy, success, content_length, error, response_time, at) = row?;
            attempts.push(CrawlAttempt {
                seq: seq.max(0) as u64,
                url,
                domain,
                strategy: parse_strategy("crawl_attempts", &strategy)?,
                success,
                content_length: content_length.max(0) as usize,
                error: error.as_deref().and_then(ErrorCategory::from_db_string),
                response_time,
                timestamp: parse_timestamp("crawl_attempts", &at)?,
            });
        }
        Ok(attempts)
    }

    fn prune_attempts(&mut self, before: DateTime<Utc>) -> StorageResult<usize> {
        let deleted = self.conn.execute(
            "DELETE FROM crawl_attempts WHERE attempted_at < ?1",
            params![before.to_rfc3339()],
        )?;
        Ok(deleted)
    }

    // ===== Statistics =====

    fn count_attempts(&self) -> StorageResult<u64> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM crawl_attempts", [], |row| row.get(0))?;
        Ok(count as u64)
    }

    fn count_successful_attempts(&self) -> StorageResult<u64> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM crawl_attempts WHERE success = 1",
            [],
            |row| row.get(0),
        )?;
        Ok(count as u64)
    }

    fn error_summary(&self) -> StorageResult<Vec<(ErrorCategory, u64)>> {
        let mut stmt = self.conn.prepare(
            "SELECT error, COUNT(*) FROM crawl_attempts
             WHERE error IS NOT NULL GROUP BY error ORDER BY COUNT(*) DESC, error",
        )?;

        let rows = stmt.query_map([], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?))
        })?;

        let mut summary = Vec::new();
        for row in rows {
            let (error, count) = row?;
            match ErrorCategory::from_db_string(&error) {
                Some(category) => summary.push((category, count as u64)),
                None => tracing::warn!("Skipping unknown error category '{}' in database", error),
            }
        }
        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use std::time::Duration;

    fn record(domain: &str, strategy: Strategy, total: u64, successful: u64) -> StrategyPerformanceRecord {
        StrategyPerformanceRecord {
            domain: domain.to_string(),
            strategy,
            total_attempts: total,
            successful_attempts: successful,
            total_response_time: total as f64 * 1.5,
            total_content_length: successful * 800,
        }
    }

    fn at(day: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, day, 9, 0, 0).unwrap()
    }

    #[test]
    fn test_performance_roundtrip_and_replace() {
        let mut store = SqliteTelemetryStore::new_in_memory().unwrap();
        store
            .save_performance(&[
                record("b.com", Strategy::Rendering, 4, 3),
                record("a.com", Strategy::Lightweight, 2, 1),
            ])
            .unwrap();
        store
            .save_performance(&[record("a.com", Strategy::Lightweight, 5, 4)])
            .unwrap();

        let loaded = store.load_performance().unwrap();
        assert_eq!(loaded.len(), 2);
        assert_eq!(loaded[0], record("a.com", Strategy::Lightweight, 5, 4));
        assert_eq!(loaded[1], record("b.com", Strategy::Rendering, 4, 3));
    }

    #[test]
    fn test_attempts_append_prune_and_summarize() {
        let mut store = SqliteTelemetryStore::new_in_memory().unwrap();
        let mut old = CrawlAttempt::failed(
            "https://a.com/1",
            "a.com",
            Strategy::Lightweight,
            ErrorCategory::Timeout,
            Duration::from_secs(15),
            at(1),
        );
        old.seq = 1;
        let mut recent = CrawlAttempt::succeeded(
            "https://a.com/2",
            "a.com",
            Strategy::Hybrid,
            1200,
            Duration::from_millis(800),
            at(20),
        );
        recent.seq = 2;
        let mut failed = CrawlAttempt::failed(
            "https://b.com/1",
            "b.com",
            Strategy::Rendering,
            ErrorCategory::Timeout,
            Duration::from_secs(3),
            at(21),
        );
        failed.seq = 3;

        assert_eq!(
            store
                .append_attempts(&[old.clone(), recent.clone(), failed.clone()])
                .unwrap(),
            3
        );
        assert_eq!(store.count_attempts().unwrap(), 3);
        assert_eq!(store.count_successful_attempts().unwrap(), 1);
        assert_eq!(store.error_summary().unwrap(), vec![(ErrorCategory::Timeout, 2)]);

        let latest = store.recent_attempts(2).unwrap();
        assert_eq!(latest, vec![failed, recent]);

        assert_eq!(store.prune_attempts(at(10)).unwrap(), 1);
        assert_eq!(store.count_attempts().unwrap(), 2);
    }
}

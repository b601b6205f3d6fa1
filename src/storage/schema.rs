//! Database schema for persisted crawl telemetry

/// SQL schema for the database
pub const SCHEMA_SQL: &str = r#"
-- Aggregate outcome per (domain, strategy); mirrors the in-memory ledger
CREATE TABLE IF NOT EXISTS strategy_performance (
    domain TEXT NOT NULL,
    strategy TEXT NOT NULL,
    total_attempts INTEGER NOT NULL DEFAULT 0,
    successful_attempts INTEGER NOT NULL DEFAULT 0,
    total_response_time REAL NOT NULL DEFAULT 0,
    total_content_length INTEGER NOT NULL DEFAULT 0,
    updated_at TEXT NOT NULL,
    PRIMARY KEY (domain, strategy)
);

-- Individual attempts, appended by the maintenance task
CREATE TABLE IF NOT EXISTS crawl_attempts (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    seq INTEGER NOT NULL,
    url TEXT NOT NULL,
    domain TEXT NOT NULL,
    strategy TEXT NOT NULL,
    success INTEGER NOT NULL,
    content_length INTEGER NOT NULL DEFAULT 0,
    error TEXT,
    response_time REAL NOT NULL,
    attempted_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_attempts_domain ON crawl_attempts(domain);
CREATE INDEX IF NOT EXISTS idx_attempts_time ON crawl_attempts(attempted_at);
"#;

/// Initializes the database schema
///
/// # Arguments
///
/// * `conn` - The database connection
///
/// # Returns
///
/// * `Ok(())` - Schema initialized successfully
/// * `Err(rusqlite::Error)` - Failed to initialize schema
pub fn initialize_schema(conn: &rusqlite::Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(SCHEMA_SQL)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rusqlite::Connection;

    #[test]
    fn test_schema_is_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        initialize_schema(&conn).unwrap();
        assert!(initialize_schema(&conn).is_ok());
    }

    #[test]
    fn test_tables_exist_after_init() {
        let conn = Connection::open_in_memory().unwrap();
        initialize_schema(&conn).unwrap();

        for table in ["strategy_performance", "crawl_attempts"] {
            let count: i64 = conn
                .query_row(
                    "SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name=?1",
                    [table],
                    |row| row.get(0),
                )
                .unwrap();
            assert_eq!(count, 1, "Table {} should exist", table);
        }
    }
}

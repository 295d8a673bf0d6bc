//! Ledger schema definitions
//!
//! This module contains all SQL schema definitions for the progress ledger.

/// SQL schema for the ledger database
pub const SCHEMA_SQL: &str = r#"
-- Track harvest runs
CREATE TABLE IF NOT EXISTS runs (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    kind TEXT NOT NULL,
    started_at TEXT NOT NULL,
    finished_at TEXT,
    config_hash TEXT NOT NULL,
    status TEXT NOT NULL
);

-- Outer partitions (query x first filename character) that finished cleanly
CREATE TABLE IF NOT EXISTS completed_partitions (
    query TEXT NOT NULL,
    outer_key TEXT NOT NULL,
    run_id INTEGER NOT NULL REFERENCES runs(id),
    records_saved INTEGER NOT NULL DEFAULT 0,
    completed_at TEXT NOT NULL,
    PRIMARY KEY (query, outer_key)
);

-- Non-recoverable request failures
CREATE TABLE IF NOT EXISTS failures (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    run_id INTEGER NOT NULL REFERENCES runs(id),
    scope TEXT NOT NULL,
    page INTEGER,
    status_code INTEGER,
    message TEXT NOT NULL,
    occurred_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_failures_run ON failures(run_id);
"#;

/// Initializes the database schema
pub fn initialize_schema(conn: &rusqlite::Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(SCHEMA_SQL)?;
    Ok(())
}

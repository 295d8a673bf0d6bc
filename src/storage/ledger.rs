//! SQLite progress ledger
//!
//! This module provides a SQLite-based implementation of the Ledger trait.

use crate::storage::schema::initialize_schema;
use crate::storage::traits::{Ledger, StorageError, StorageResult};
use crate::storage::{FailureRecord, RunKind, RunRecord, RunStatus};
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::path::Path;

/// SQLite ledger backend
pub struct SqliteLedger {
    conn: Connection,
}

impl SqliteLedger {
    /// Opens (or creates) the ledger at `path`
    ///
    /// Parent directories are created as needed.
    pub fn new(path: &Path) -> StorageResult<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let conn = Connection::open(path)?;

        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA foreign_keys = ON;
        ",
        )?;

        initialize_schema(&conn)?;

        Ok(Self { conn })
    }

    /// Creates an in-memory ledger (for testing)
    pub fn new_in_memory() -> StorageResult<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        initialize_schema(&conn)?;
        Ok(Self { conn })
    }
}

const RUN_COLUMNS: &str = "id, kind, started_at, finished_at, config_hash, status";

fn run_from_row(row: &Row<'_>) -> rusqlite::Result<RunRecord> {
    Ok(RunRecord {
        id: row.get(0)?,
        kind: RunKind::from_db_string(&row.get::<_, String>(1)?).unwrap_or(RunKind::Crawl),
        started_at: row.get(2)?,
        finished_at: row.get(3)?,
        config_hash: row.get(4)?,
        status: RunStatus::from_db_string(&row.get::<_, String>(5)?)
            .unwrap_or(RunStatus::Interrupted),
    })
}

impl Ledger for SqliteLedger {
    // ===== Run Management =====

    fn create_run(&mut self, kind: RunKind, config_hash: &str) -> StorageResult<i64> {
        let now = Utc::now().to_rfc3339();
        self.conn.execute(
            "INSERT INTO runs (kind, started_at, config_hash, status) VALUES (?1, ?2, ?3, ?4)",
            params![
                kind.to_db_string(),
                now,
                config_hash,
                RunStatus::Running.to_db_string()
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    fn get_run(&self, run_id: i64) -> StorageResult<RunRecord> {
        let sql = format!("SELECT {} FROM runs WHERE id = ?1", RUN_COLUMNS);
        self.conn
            .query_row(&sql, params![run_id], run_from_row)
            .optional()?
            .ok_or(StorageError::RunNotFound(run_id))
    }

    fn get_latest_run(&self) -> StorageResult<Option<RunRecord>> {
        let sql = format!("SELECT {} FROM runs ORDER BY id DESC LIMIT 1", RUN_COLUMNS);
        Ok(self.conn.query_row(&sql, [], run_from_row).optional()?)
    }

    fn list_runs(&self) -> StorageResult<Vec<RunRecord>> {
        let sql = format!("SELECT {} FROM runs ORDER BY id DESC", RUN_COLUMNS);
        let mut stmt = self.conn.prepare(&sql)?;
        let runs = stmt
            .query_map([], run_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(runs)
    }

    fn finish_run(&mut self, run_id: i64, status: RunStatus) -> StorageResult<()> {
        let now = Utc::now().to_rfc3339();
        let updated = self.conn.execute(
            "UPDATE runs SET status = ?1, finished_at = ?2 WHERE id = ?3",
            params![status.to_db_string(), now, run_id],
        )?;
        if updated == 0 {
            return Err(StorageError::RunNotFound(run_id));
        }
        Ok(())
    }

    fn mark_stale_runs_interrupted(&mut self) -> StorageResult<usize> {
        let updated = self.conn.execute(
            "UPDATE runs SET status = ?1 WHERE status = ?2",
            params![
                RunStatus::Interrupted.to_db_string(),
                RunStatus::Running.to_db_string()
            ],
        )?;
        Ok(updated)
    }

    // ===== Partition Progress =====

    fn is_partition_complete(&self, query: &str, outer: &str) -> StorageResult<bool> {
        let found: Option<i64> = self
            .conn
            .query_row(
                "SELECT 1 FROM completed_partitions WHERE query = ?1 AND outer_key = ?2",
                params![query, outer],
                |row| row.get(0),
            )
            .optional()?;
        Ok(found.is_some())
    }

    fn mark_partition_complete(
        &mut self,
        run_id: i64,
        query: &str,
        outer: &str,
        records_saved: usize,
    ) -> StorageResult<()> {
        let now = Utc::now().to_rfc3339();
        self.conn.execute(
            "INSERT OR REPLACE INTO completed_partitions (query, outer_key, run_id, records_saved, completed_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![query, outer, run_id, records_saved as i64, now],
        )?;
        Ok(())
    }

    fn count_completed_partitions(&self) -> StorageResult<u64> {
        let count: i64 =
            self.conn
                .query_row("SELECT COUNT(*) FROM completed_partitions", [], |row| {
                    row.get(0)
                })?;
        Ok(count as u64)
    }

    fn clear_progress(&mut self) -> StorageResult<()> {
        self.conn.execute("DELETE FROM completed_partitions", [])?;
        Ok(())
    }

    // ===== Failures =====

    fn record_failure(&mut self, run_id: i64, failure: &FailureRecord) -> StorageResult<()> {
        let now = Utc::now().to_rfc3339();
        self.conn.execute(
            "INSERT INTO failures (run_id, scope, page, status_code, message, occurred_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                run_id,
                failure.scope,
                failure.page,
                failure.status_code,
                failure.message,
                now
            ],
        )?;
        Ok(())
    }

    fn count_failures(&self, run_id: i64) -> StorageResult<u64> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM failures WHERE run_id = ?1",
            params![run_id],
            |row| row.get(0),
        )?;
        Ok(count as u64)
    }
}

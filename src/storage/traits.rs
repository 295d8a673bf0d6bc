//! Storage traits and error types
//!
//! This module defines the trait interfaces for the record store and the
//! progress ledger, and their shared error type.

use crate::storage::{FailureRecord, Record, RunKind, RunRecord, RunStatus};
use std::collections::HashSet;
use std::path::Path;
use thiserror::Error;

/// Errors that can occur during storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parquet error: {0}")]
    Parquet(#[from] parquet::errors::ParquetError),

    #[error("Arrow error: {0}")]
    Arrow(#[from] arrow_schema::ArrowError),

    #[error("Schema error in {path}: {message}")]
    Schema { path: String, message: String },

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Run not found: {0}")]
    RunNotFound(i64),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Append-only partitioned record storage
///
/// Every partition is one file addressed by its path. Records are normalized
/// before they are written, and records whose key already exists in the
/// partition are silently skipped.
pub trait RecordStore {
    /// Reads every record of a partition; a missing partition is empty
    fn read_all(&self, path: &Path) -> StorageResult<Vec<Record>>;

    /// Appends one record
    ///
    /// # Returns
    ///
    /// * `Ok(true)` - The record was written
    /// * `Ok(false)` - A record with the same key was already present
    fn append(&self, path: &Path, record: &Record) -> StorageResult<bool> {
        Ok(self.append_all(path, std::slice::from_ref(record))? == 1)
    }

    /// Appends a batch of records with a single rewrite
    ///
    /// Returns how many records were actually written after dedup.
    fn append_all(&self, path: &Path, records: &[Record]) -> StorageResult<usize>;

    /// All key values present in a partition
    fn keys(&self, path: &Path) -> StorageResult<HashSet<String>>;
}

/// Durable record of run progress
pub trait Ledger {
    // ===== Run Management =====

    /// Creates a new run with status `Running`
    fn create_run(&mut self, kind: RunKind, config_hash: &str) -> StorageResult<i64>;

    /// Gets a run by ID
    fn get_run(&self, run_id: i64) -> StorageResult<RunRecord>;

    /// Gets the most recent run of any kind
    fn get_latest_run(&self) -> StorageResult<Option<RunRecord>>;

    /// Lists all runs, newest first
    fn list_runs(&self) -> StorageResult<Vec<RunRecord>>;

    /// Sets a run's final status and finish time
    fn finish_run(&mut self, run_id: i64, status: RunStatus) -> StorageResult<()>;

    /// Marks runs left `Running` by a crash as `Interrupted`
    ///
    /// Returns the number of runs updated.
    fn mark_stale_runs_interrupted(&mut self) -> StorageResult<usize>;

    // ===== Partition Progress =====

    /// Whether an outer partition finished in an earlier run
    fn is_partition_complete(&self, query: &str, outer: &str) -> StorageResult<bool>;

    /// Records that an outer partition finished
    fn mark_partition_complete(
        &mut self,
        run_id: i64,
        query: &str,
        outer: &str,
        records_saved: usize,
    ) -> StorageResult<()>;

    /// Number of outer partitions recorded as complete
    fn count_completed_partitions(&self) -> StorageResult<u64>;

    /// Forgets every completed partition (for `--fresh`)
    fn clear_progress(&mut self) -> StorageResult<()>;

    // ===== Failures =====

    /// Stores a request failure against a run
    fn record_failure(&mut self, run_id: i64, failure: &FailureRecord) -> StorageResult<()>;

    /// Number of failures recorded for a run
    fn count_failures(&self, run_id: i64) -> StorageResult<u64>;
}

//! Statistics over harvested data
//!
//! This module provides functionality for summarizing what is on disk
//! (partition files and repositories) together with the run history kept in
//! the progress ledger.

use crate::output::inspect::count_unique_repositories;
use crate::storage::{
    item_partitions, metadata_partitions, Ledger, ParquetStore, RunRecord, StorageResult,
    ITEM_KEY_COLUMN,
};
use std::path::{Path, PathBuf};

/// Row count of one partition file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileStatistics {
    pub path: PathBuf,
    pub rows: u64,
}

/// Harvest statistics summary
#[derive(Debug, Clone)]
pub struct HarvestStatistics {
    /// Search item partitions
    pub item_files: Vec<FileStatistics>,

    /// Repository metadata partitions
    pub metadata_files: Vec<FileStatistics>,

    /// Distinct repositories across all item partitions
    pub unique_repositories: usize,

    /// Distinct repositories with metadata
    pub enriched_repositories: usize,

    /// Outer partitions the ledger records as complete
    pub completed_partitions: u64,

    /// Every run, newest first
    pub runs: Vec<RunRecord>,

    /// Failures recorded by the newest run
    pub latest_run_failures: u64,
}

impl HarvestStatistics {
    pub fn item_rows(&self) -> u64 {
        self.item_files.iter().map(|f| f.rows).sum()
    }

    pub fn metadata_rows(&self) -> u64 {
        self.metadata_files.iter().map(|f| f.rows).sum()
    }
}

fn file_statistics(paths: &[PathBuf]) -> StorageResult<Vec<FileStatistics>> {
    let counter = ParquetStore::new(ITEM_KEY_COLUMN);
    paths
        .iter()
        .map(|path| {
            Ok(FileStatistics {
                path: path.clone(),
                rows: counter.count_rows(path)?,
            })
        })
        .collect()
}

/// Collects statistics from the data directory and the ledger
///
/// # Arguments
///
/// * `data_dir` - Root of the Parquet output
/// * `ledger` - The progress ledger to query
pub fn collect_statistics(data_dir: &Path, ledger: &dyn Ledger) -> StorageResult<HarvestStatistics> {
    let items = item_partitions(data_dir);
    let metadata = metadata_partitions(data_dir);

    let runs = ledger.list_runs()?;
    let latest_run_failures = match runs.first() {
        Some(run) => ledger.count_failures(run.id)?,
        None => 0,
    };

    Ok(HarvestStatistics {
        item_files: file_statistics(&items)?,
        metadata_files: file_statistics(&metadata)?,
        unique_repositories: count_unique_repositories(&items)?,
        enriched_repositories: count_unique_repositories(&metadata)?,
        completed_partitions: ledger.count_completed_partitions()?,
        runs,
        latest_run_failures,
    })
}

/// Prints statistics to stdout in a formatted manner
pub fn print_statistics(stats: &HarvestStatistics) {
    println!("=== Harvest Statistics ===\n");

    println!("Overview:");
    println!(
        "  Item files: {} ({} rows)",
        stats.item_files.len(),
        stats.item_rows()
    );
    println!("  Unique repositories: {}", stats.unique_repositories);
    println!(
        "  Metadata files: {} ({} rows)",
        stats.metadata_files.len(),
        stats.metadata_rows()
    );
    println!("  Enriched repositories: {}", stats.enriched_repositories);
    println!("  Completed partitions: {}", stats.completed_partitions);
    println!();

    if !stats.item_files.is_empty() {
        println!("Rows per File:");
        for file in stats.item_files.iter().chain(&stats.metadata_files) {
            println!("  {}: {}", file.path.display(), file.rows);
        }
        println!();
    }

    if stats.runs.is_empty() {
        println!("No runs recorded yet");
        return;
    }

    println!("Runs ({}):", stats.runs.len());
    for run in &stats.runs {
        println!(
            "  #{} {} {} started {} finished {}",
            run.id,
            run.kind.to_db_string(),
            run.status.to_db_string(),
            run.started_at,
            run.finished_at.as_deref().unwrap_or("-")
        );
    }
    println!();
    println!(
        "Failures in latest run: {}",
        stats.latest_run_failures
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{
        FailureRecord, RecordStore, RunKind, RunStatus, SqliteLedger, REPO_KEY_COLUMN,
    };
    use serde_json::json;
    use tempfile::TempDir;

    #[test]
    fn test_collect_statistics() {
        let dir = TempDir::new().unwrap();
        let items = dir.path().join("mtls/v1/mtls_strict_v1_a.parquet");
        let records: Vec<_> = ["o/a", "o/b", "o/c"]
            .iter()
            .map(|name| {
                json!({"repository": {"full_name": name}})
                    .as_object()
                    .cloned()
                    .unwrap()
            })
            .collect();
        ParquetStore::new(ITEM_KEY_COLUMN)
            .append_all(&items, &records)
            .unwrap();
        ParquetStore::new(REPO_KEY_COLUMN)
            .append(
                &dir.path().join("v1_repos.parquet"),
                json!({"full_name": "o/a"}).as_object().unwrap(),
            )
            .unwrap();

        let mut ledger = SqliteLedger::new_in_memory().unwrap();
        let run = ledger.create_run(RunKind::Crawl, "hash").unwrap();
        ledger
            .mark_partition_complete(run, "mtls_strict_v1", "a", 3)
            .unwrap();
        ledger
            .record_failure(
                run,
                &FailureRecord {
                    scope: "mtls_strict_v1/ab".to_string(),
                    page: Some(1),
                    status_code: Some(500),
                    message: "boom".to_string(),
                },
            )
            .unwrap();
        ledger.finish_run(run, RunStatus::Completed).unwrap();

        let stats = collect_statistics(dir.path(), &ledger).unwrap();
        assert_eq!(stats.item_files.len(), 1);
        assert_eq!(stats.item_rows(), 3);
        assert_eq!(stats.metadata_rows(), 1);
        assert_eq!(stats.unique_repositories, 3);
        assert_eq!(stats.enriched_repositories, 1);
        assert_eq!(stats.completed_partitions, 1);
        assert_eq!(stats.runs.len(), 1);
        assert_eq!(stats.latest_run_failures, 1);
    }

    #[test]
    fn test_empty_data_dir() {
        let dir = TempDir::new().unwrap();
        let ledger = SqliteLedger::new_in_memory().unwrap();
        let stats = collect_statistics(dir.path(), &ledger).unwrap();
        assert!(stats.item_files.is_empty());
        assert_eq!(stats.unique_repositories, 0);
        assert!(stats.runs.is_empty());
    }
}

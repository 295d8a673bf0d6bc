//! Quick looks at Parquet partitions

use crate::storage::{
    is_metadata_partition, ParquetStore, Record, RecordStore, StorageResult, ITEM_KEY_COLUMN,
    REPO_KEY_COLUMN,
};
use std::collections::HashSet;
use std::path::{Path, PathBuf};

/// Store matching the key column of a partition file
fn store_for(path: &Path) -> ParquetStore {
    if is_metadata_partition(path) {
        ParquetStore::new(REPO_KEY_COLUMN)
    } else {
        ParquetStore::new(ITEM_KEY_COLUMN)
    }
}

/// Counts distinct repository names across partition files
///
/// Item partitions contribute `repository_full_name`, metadata partitions
/// `full_name`. Missing files count as empty.
pub fn count_unique_repositories<P: AsRef<Path>>(paths: &[P]) -> StorageResult<usize> {
    let mut names = HashSet::new();
    for path in paths {
        let path = path.as_ref();
        names.extend(store_for(path).keys(path)?);
    }
    Ok(names.len())
}

/// Head of a partition file
#[derive(Debug, Clone)]
pub struct FileInspection {
    pub path: PathBuf,
    pub total_rows: u64,
    pub columns: Vec<String>,
    pub rows: Vec<Record>,
}

/// Reads the row count, the column names and the first `rows` rows of a file
pub fn inspect_file(path: &Path, rows: usize) -> StorageResult<FileInspection> {
    let store = store_for(path);
    let total_rows = store.count_rows(path)?;
    let head: Vec<Record> = store.read_all(path)?.into_iter().take(rows).collect();

    let mut columns: Vec<String> = Vec::new();
    for record in &head {
        for key in record.keys() {
            if !columns.contains(key) {
                columns.push(key.clone());
            }
        }
    }

    Ok(FileInspection {
        path: path.to_path_buf(),
        total_rows,
        columns,
        rows: head,
    })
}

/// Prints an inspection to stdout, one JSON document per row
pub fn print_inspection(inspection: &FileInspection) {
    println!("=== {} ===\n", inspection.path.display());
    println!("Rows: {}", inspection.total_rows);
    println!("Columns ({}):", inspection.columns.len());
    for column in &inspection.columns {
        println!("  - {}", column);
    }
    println!();

    println!("First {} row(s):", inspection.rows.len());
    for record in &inspection.rows {
        match serde_json::to_string(record) {
            Ok(line) => println!("{}", line),
            Err(e) => println!("<unprintable row: {}>", e),
        }
    }
}

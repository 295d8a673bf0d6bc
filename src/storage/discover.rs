//! Locating partitions under a data directory

use crate::storage::REPOS_FILE_SUFFIX;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Whether a path holds repository metadata rather than search items
pub fn is_metadata_partition(path: &Path) -> bool {
    path.file_name()
        .and_then(|name| name.to_str())
        .is_some_and(|name| name.ends_with(REPOS_FILE_SUFFIX))
}

fn parquet_files(data_dir: &Path) -> Vec<PathBuf> {
    let mut files: Vec<PathBuf> = WalkDir::new(data_dir)
        .into_iter()
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_file())
        .map(|entry| entry.into_path())
        .filter(|path| path.extension().is_some_and(|ext| ext == "parquet"))
        .collect();
    files.sort();
    files
}

/// Every search item partition below `data_dir`, sorted
///
/// A missing directory yields nothing.
pub fn item_partitions(data_dir: &Path) -> Vec<PathBuf> {
    parquet_files(data_dir)
        .into_iter()
        .filter(|path| !is_metadata_partition(path))
        .collect()
}

/// Every repository metadata partition below `data_dir`, sorted
pub fn metadata_partitions(data_dir: &Path) -> Vec<PathBuf> {
    parquet_files(data_dir)
        .into_iter()
        .filter(|path| is_metadata_partition(path))
        .collect()
}

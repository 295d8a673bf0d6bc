use crate::storage::{RecordStore, StorageResult};
use std::collections::HashSet;
use std::path::Path;

/// Repository names already discovered or enriched
///
/// The set is global to a run and is seeded from what is already on disk, so
/// resuming a run never persists or fetches the same repository twice.
/// `has_seen` must be consulted before any expensive per-repository request.
#[derive(Debug, Clone, Default)]
pub struct SeenSet {
    names: HashSet<String>,
}

impl SeenSet {
    /// Creates an empty set
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds a set from the key column of every given partition
    ///
    /// Missing partitions contribute nothing.
    pub fn seed_from_store<S, P>(store: &S, paths: &[P]) -> StorageResult<Self>
    where
        S: RecordStore + ?Sized,
        P: AsRef<Path>,
    {
        let mut seen = Self::new();
        for path in paths {
            seen.names.extend(store.keys(path.as_ref())?);
        }
        Ok(seen)
    }

    /// Whether a repository has already been recorded
    pub fn has_seen(&self, full_name: &str) -> bool {
        self.names.contains(full_name)
    }

    /// Records a repository; returns `false` if it was already present
    pub fn mark_seen(&mut self, full_name: impl Into<String>) -> bool {
        self.names.insert(full_name.into())
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn contains_all<'a>(&self, names: impl IntoIterator<Item = &'a str>) -> bool {
        names.into_iter().all(|name| self.has_seen(name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::ParquetStore;
    use serde_json::json;
    use tempfile::TempDir;

    #[test]
    fn test_mark_and_query() {
        let mut seen = SeenSet::new();
        assert!(seen.is_empty());
        assert!(!seen.has_seen("octo/mesh"));

        assert!(seen.mark_seen("octo/mesh"));
        assert!(!seen.mark_seen("octo/mesh"));

        assert!(seen.has_seen("octo/mesh"));
        assert_eq!(seen.len(), 1);
        assert!(seen.contains_all(["octo/mesh"]));
        assert!(!seen.contains_all(["octo/mesh", "octo/other"]));
    }

    #[test]
    fn test_seed_from_store() {
        let dir = TempDir::new().unwrap();
        let store = ParquetStore::new("repository_full_name");
        let first = dir.path().join("a.parquet");
        let second = dir.path().join("b.parquet");
        let missing = dir.path().join("missing.parquet");

        for (path, name) in [(&first, "a/one"), (&second, "b/two"), (&second, "a/one")] {
            let record = json!({"repository": {"full_name": name}});
            store.append(path, record.as_object().unwrap()).unwrap();
        }

        let seen = SeenSet::seed_from_store(&store, &[first, second, missing]).unwrap();
        assert_eq!(seen.len(), 2);
        assert!(seen.has_seen("a/one"));
        assert!(seen.has_seen("b/two"));
    }
}

//! Parquet-backed record store
//!
//! Each partition is a single Parquet file holding every record that belongs
//! to it. Appending reads the file, adds the new rows, and rewrites the whole
//! file under a temporary name before renaming it into place, so a reader
//! never observes a half-written partition. This read-modify-write cycle is
//! only sound with a single writer.

use crate::storage::normalize::normalize_record;
use crate::storage::traits::{RecordStore, StorageError, StorageResult};
use crate::storage::Record;
use arrow_array::{
    Array, ArrayRef, BooleanArray, Float32Array, Float64Array, Int32Array, Int64Array,
    LargeStringArray, RecordBatch, StringArray,
};
use arrow_schema::{DataType, Field, Schema};
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use parquet::arrow::ArrowWriter;
use parquet::basic::Compression;
use parquet::file::properties::WriterProperties;
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Parquet record store with dedup on a single key column
#[derive(Debug, Clone)]
pub struct ParquetStore {
    key_column: String,
}

impl ParquetStore {
    /// Creates a store that dedups on `key_column`
    pub fn new(key_column: impl Into<String>) -> Self {
        Self {
            key_column: key_column.into(),
        }
    }

    /// Number of rows in a partition without decoding values
    pub fn count_rows(&self, path: &Path) -> StorageResult<u64> {
        if !path.exists() {
            return Ok(0);
        }
        let file = File::open(path)?;
        let builder = ParquetRecordBatchReaderBuilder::try_new(file)?;
        Ok(builder.metadata().file_metadata().num_rows().max(0) as u64)
    }

    fn key_of(&self, record: &Record) -> Option<String> {
        record
            .get(&self.key_column)
            .and_then(Value::as_str)
            .map(str::to_string)
    }
}

impl RecordStore for ParquetStore {
    fn read_all(&self, path: &Path) -> StorageResult<Vec<Record>> {
        if !path.exists() {
            return Ok(Vec::new());
        }

        let file = File::open(path)?;
        let reader = ParquetRecordBatchReaderBuilder::try_new(file)?.build()?;

        let mut records = Vec::new();
        for batch in reader {
            let batch = batch?;
            decode_batch(&batch, &mut records).map_err(|message| StorageError::Schema {
                path: path.display().to_string(),
                message,
            })?;
        }

        Ok(records)
    }

    fn append_all(&self, path: &Path, records: &[Record]) -> StorageResult<usize> {
        let mut rows = self.read_all(path)?;
        let mut keys: HashSet<String> = rows.iter().filter_map(|r| self.key_of(r)).collect();

        let mut written = 0;
        for record in records {
            let normalized = normalize_record(record);
            if let Some(key) = self.key_of(&normalized) {
                if !keys.insert(key) {
                    continue;
                }
            }
            rows.push(normalized);
            written += 1;
        }

        if written == 0 {
            return Ok(0);
        }

        let batch = encode_records(&rows).map_err(|message| StorageError::Schema {
            path: path.display().to_string(),
            message,
        })?;
        write_atomic(path, &batch)?;

        tracing::debug!(
            "Appended {} record(s) to {} ({} total)",
            written,
            path.display(),
            rows.len()
        );
        Ok(written)
    }

    fn keys(&self, path: &Path) -> StorageResult<HashSet<String>> {
        Ok(self
            .read_all(path)?
            .iter()
            .filter_map(|r| self.key_of(r))
            .collect())
    }
}

/// Column type inferred from the values of one column across all rows
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ColumnKind {
    Boolean,
    Int64,
    Float64,
    Utf8,
}

impl ColumnKind {
    /// `None` for nulls, which fit any column
    fn of(value: &Value) -> Option<Self> {
        match value {
            Value::Null => None,
            Value::Bool(_) => Some(Self::Boolean),
            Value::Number(n) if n.is_i64() => Some(Self::Int64),
            // Above i64::MAX; a float would drop digits
            Value::Number(n) if n.is_u64() => Some(Self::Utf8),
            Value::Number(_) => Some(Self::Float64),
            _ => Some(Self::Utf8),
        }
    }

    fn merge(self, other: Self) -> Self {
        match (self, other) {
            (a, b) if a == b => a,
            (Self::Int64, Self::Float64) | (Self::Float64, Self::Int64) => Self::Float64,
            _ => Self::Utf8,
        }
    }

    fn data_type(self) -> DataType {
        match self {
            Self::Boolean => DataType::Boolean,
            Self::Int64 => DataType::Int64,
            Self::Float64 => DataType::Float64,
            Self::Utf8 => DataType::Utf8,
        }
    }
}

/// Builds a record batch, inferring a nullable column per distinct key
fn encode_records(records: &[Record]) -> Result<RecordBatch, String> {
    // Columns keep first-seen order
    let mut columns: Vec<(String, Option<ColumnKind>)> = Vec::new();
    let mut index: HashMap<String, usize> = HashMap::new();

    for record in records {
        for (key, value) in record {
            let slot = match index.get(key) {
                Some(&i) => i,
                None => {
                    index.insert(key.clone(), columns.len());
                    columns.push((key.clone(), None));
                    columns.len() - 1
                }
            };
            if let Some(kind) = ColumnKind::of(value) {
                let current = &mut columns[slot].1;
                *current = Some(match *current {
                    Some(existing) => existing.merge(kind),
                    None => kind,
                });
            }
        }
    }

    if columns.is_empty() {
        return Err("records have no fields to write".to_string());
    }

    let mut fields = Vec::with_capacity(columns.len());
    let mut arrays: Vec<ArrayRef> = Vec::with_capacity(columns.len());
    for (name, kind) in &columns {
        // All-null columns are typed as text
        let kind = kind.unwrap_or(ColumnKind::Utf8);
        fields.push(Field::new(name.as_str(), kind.data_type(), true));
        arrays.push(build_column(kind, name, records));
    }

    RecordBatch::try_new(Arc::new(Schema::new(fields)), arrays).map_err(|e| e.to_string())
}

fn build_column(kind: ColumnKind, name: &str, records: &[Record]) -> ArrayRef {
    let values = records.iter().map(|r| r.get(name));
    match kind {
        ColumnKind::Boolean => Arc::new(BooleanArray::from(
            values
                .map(|v| v.and_then(Value::as_bool))
                .collect::<Vec<_>>(),
        )),
        ColumnKind::Int64 => Arc::new(Int64Array::from(
            values.map(|v| v.and_then(Value::as_i64)).collect::<Vec<_>>(),
        )),
        ColumnKind::Float64 => Arc::new(Float64Array::from(
            values.map(|v| v.and_then(Value::as_f64)).collect::<Vec<_>>(),
        )),
        ColumnKind::Utf8 => Arc::new(StringArray::from(
            values.map(|v| v.and_then(text_of)).collect::<Vec<_>>(),
        )),
    }
}

/// Text form of a value; strings stay raw, everything else becomes JSON
fn text_of(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

/// Converts a record batch back into JSON records, appending to `out`
fn decode_batch(batch: &RecordBatch, out: &mut Vec<Record>) -> Result<(), String> {
    let schema = batch.schema();
    let start = out.len();
    out.extend((0..batch.num_rows()).map(|_| Record::new()));

    for (field, column) in schema.fields().iter().zip(batch.columns()) {
        let values = decode_column(column)
            .ok_or_else(|| format!("unsupported column type {} for {}", field.data_type(), field.name()))?;
        for (row, value) in values.into_iter().enumerate() {
            out[start + row].insert(field.name().clone(), value);
        }
    }

    Ok(())
}

macro_rules! decode_as {
    ($column:expr, $array:ty, $convert:expr) => {{
        let array = $column.as_any().downcast_ref::<$array>()?;
        Some(
            (0..array.len())
                .map(|i| {
                    if array.is_null(i) {
                        Value::Null
                    } else {
                        $convert(array.value(i))
                    }
                })
                .collect(),
        )
    }};
}

fn decode_column(column: &ArrayRef) -> Option<Vec<Value>> {
    match column.data_type() {
        DataType::Null => Some(vec![Value::Null; column.len()]),
        DataType::Boolean => decode_as!(column, BooleanArray, Value::Bool),
        DataType::Int32 => decode_as!(column, Int32Array, |v: i32| Value::from(v)),
        DataType::Int64 => decode_as!(column, Int64Array, |v: i64| Value::from(v)),
        DataType::Float32 => decode_as!(column, Float32Array, |v: f32| Value::from(v as f64)),
        DataType::Float64 => decode_as!(column, Float64Array, |v: f64| Value::from(v)),
        DataType::Utf8 => decode_as!(column, StringArray, |v: &str| Value::from(v)),
        DataType::LargeUtf8 => decode_as!(column, LargeStringArray, |v: &str| Value::from(v)),
        _ => None,
    }
}

/// Writes a batch next to `path` and renames it into place
fn write_atomic(path: &Path, batch: &RecordBatch) -> StorageResult<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }

    let tmp = temp_path(path);
    let result = write_file(&tmp, batch).and_then(|()| Ok(fs::rename(&tmp, path)?));
    if result.is_err() {
        let _ = fs::remove_file(&tmp);
    }
    result
}

fn write_file(path: &Path, batch: &RecordBatch) -> StorageResult<()> {
    let file = File::create(path)?;
    let props = WriterProperties::builder()
        .set_compression(Compression::SNAPPY)
        .build();
    let mut writer = ArrowWriter::try_new(file, batch.schema(), Some(props))?;
    writer.write(batch)?;
    let file = writer.into_inner()?;
    file.sync_all()?;
    Ok(())
}

fn temp_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(".tmp");
    path.with_file_name(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    fn record(value: Value) -> Record {
        value.as_object().unwrap().clone()
    }

    fn item(full_name: &str, path: &str) -> Record {
        record(json!({
            "name": "policy.yaml",
            "path": path,
            "score": 1.0,
            "repository": {"full_name": full_name, "private": false, "id": 42}
        }))
    }

    #[test]
    fn test_missing_partition_reads_empty() {
        let dir = TempDir::new().unwrap();
        let store = ParquetStore::new("repository_full_name");
        let path = dir.path().join("nope.parquet");

        assert!(store.read_all(&path).unwrap().is_empty());
        assert!(store.keys(&path).unwrap().is_empty());
        assert_eq!(store.count_rows(&path).unwrap(), 0);
    }

    #[test]
    fn test_append_creates_directories_and_flattens() {
        let dir = TempDir::new().unwrap();
        let store = ParquetStore::new("repository_full_name");
        let path = dir.path().join("mtls").join("v1").join("mtls_strict_v1_a.parquet");

        assert!(store.append(&path, &item("octo/mesh", "a.yaml")).unwrap());

        let rows = store.read_all(&path).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0]["repository_full_name"], json!("octo/mesh"));
        assert_eq!(rows[0]["repository_private"], json!(false));
        assert_eq!(rows[0]["repository_id"], json!(42));
        assert_eq!(rows[0]["score"], json!(1.0));
        assert!(!temp_path(&path).exists());
    }

    #[test]
    fn test_append_skips_duplicate_keys() {
        let dir = TempDir::new().unwrap();
        let store = ParquetStore::new("repository_full_name");
        let path = dir.path().join("p.parquet");

        assert!(store.append(&path, &item("octo/mesh", "a.yaml")).unwrap());
        assert!(!store.append(&path, &item("octo/mesh", "b.yaml")).unwrap());
        assert!(store.append(&path, &item("octo/other", "c.yaml")).unwrap());

        let keys = store.keys(&path).unwrap();
        assert_eq!(keys.len(), 2);
        assert_eq!(store.count_rows(&path).unwrap(), 2);
    }

    #[test]
    fn test_append_all_dedups_within_batch() {
        let dir = TempDir::new().unwrap();
        let store = ParquetStore::new("repository_full_name");
        let path = dir.path().join("p.parquet");

        let written = store
            .append_all(
                &path,
                &[
                    item("a/one", "x.yaml"),
                    item("a/one", "y.yaml"),
                    item("b/two", "z.yaml"),
                ],
            )
            .unwrap();

        assert_eq!(written, 2);
        assert_eq!(store.read_all(&path).unwrap().len(), 2);
    }

    #[test]
    fn test_empty_structures_write_without_error() {
        let dir = TempDir::new().unwrap();
        let store = ParquetStore::new("full_name");
        let path = dir.path().join("v1_repos.parquet");

        let metadata = record(json!({
            "full_name": "octo/mesh",
            "a": {},
            "b": [],
            "c": {"x": 1},
            "topics": ["istio"]
        }));
        assert!(store.append(&path, &metadata).unwrap());

        let rows = store.read_all(&path).unwrap();
        assert_eq!(rows[0]["a"], Value::Null);
        assert_eq!(rows[0]["b"], Value::Null);
        assert_eq!(rows[0]["c_x"], json!(1));
        assert_eq!(rows[0]["topics"], json!("[\"istio\"]"));
    }

    #[test]
    fn test_schema_widens_across_appends() {
        let dir = TempDir::new().unwrap();
        let store = ParquetStore::new("full_name");
        let path = dir.path().join("p.parquet");

        store
            .append(&path, &record(json!({"full_name": "a/a", "size": 10, "homepage": null})))
            .unwrap();
        store
            .append(&path, &record(json!({"full_name": "b/b", "size": 2.5, "homepage": "https://b"})))
            .unwrap();
        store
            .append(&path, &record(json!({"full_name": "c/c", "size": "huge", "extra": true})))
            .unwrap();

        let rows = store.read_all(&path).unwrap();
        assert_eq!(rows.len(), 3);
        assert!(rows[0]["size"].is_string());
        assert_eq!(rows[2]["size"], json!("huge"));
        assert_eq!(rows[1]["homepage"], json!("https://b"));
        assert_eq!(rows[0]["extra"], Value::Null);
        assert_eq!(rows[2]["extra"], json!(true));
    }

    #[test]
    fn test_unsigned_beyond_i64_kept_exact() {
        let dir = TempDir::new().unwrap();
        let store = ParquetStore::new("full_name");
        let path = dir.path().join("p.parquet");

        store
            .append_all(
                &path,
                &[
                    record(json!({"full_name": "a/a", "id": u64::MAX})),
                    record(json!({"full_name": "b/b", "id": 7})),
                ],
            )
            .unwrap();

        let rows = store.read_all(&path).unwrap();
        assert_eq!(rows[0]["id"], json!("18446744073709551615"));
        assert_eq!(rows[1]["id"], json!("7"));
        assert_eq!(ColumnKind::of(&json!(u64::MAX)), Some(ColumnKind::Utf8));
        assert_eq!(ColumnKind::of(&json!(42)), Some(ColumnKind::Int64));
    }

    #[test]
    fn test_record_without_fields_is_schema_error() {
        let dir = TempDir::new().unwrap();
        let store = ParquetStore::new("full_name");
        let path = dir.path().join("p.parquet");

        let result = store.append(&path, &Record::new());
        assert!(matches!(result, Err(StorageError::Schema { .. })));
        assert!(!path.exists());
    }

    #[test]
    fn test_column_kind_merge() {
        use ColumnKind::*;
        assert_eq!(Int64.merge(Int64), Int64);
        assert_eq!(Int64.merge(Float64), Float64);
        assert_eq!(Boolean.merge(Int64), Utf8);
        assert_eq!(Utf8.merge(Boolean), Utf8);
    }
}

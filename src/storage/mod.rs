//! Storage module for persisting harvest data
//!
//! This module handles everything that touches disk:
//! - Record normalization ahead of columnar encoding
//! - Append-only Parquet partitions with key-based dedup
//! - Discovery of item and metadata partitions under the data directory
//! - The SQLite progress ledger (runs, completed partitions, failures)

mod columnar;
mod discover;
mod ledger;
mod normalize;
mod schema;
mod traits;

pub use columnar::ParquetStore;
pub use discover::{is_metadata_partition, item_partitions, metadata_partitions};
pub use ledger::SqliteLedger;
pub use normalize::normalize_record;
pub use traits::{Ledger, RecordStore, StorageError, StorageResult};

/// A single result item or metadata row, as decoded from the API
pub type Record = serde_json::Map<String, serde_json::Value>;

/// Key column of discovered search items after flattening
pub const ITEM_KEY_COLUMN: &str = "repository_full_name";

/// Key column of repository metadata rows
pub const REPO_KEY_COLUMN: &str = "full_name";

/// Name a metadata row was requested under, which differs from
/// `full_name` once a repository has been renamed or transferred
pub const REQUESTED_KEY_COLUMN: &str = "requested_full_name";

/// File suffix that marks a repository metadata file
pub const REPOS_FILE_SUFFIX: &str = "_repos.parquet";

/// Represents a harvest run in the ledger
#[derive(Debug, Clone)]
pub struct RunRecord {
    pub id: i64,
    pub kind: RunKind,
    pub started_at: String,
    pub finished_at: Option<String>,
    pub config_hash: String,
    pub status: RunStatus,
}

/// What a run was doing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunKind {
    Crawl,
    Enrich,
}

impl RunKind {
    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::Crawl => "crawl",
            Self::Enrich => "enrich",
        }
    }

    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "crawl" => Some(Self::Crawl),
            "enrich" => Some(Self::Enrich),
            _ => None,
        }
    }
}

/// Status of a harvest run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    /// Still going, or crashed before it could say otherwise
    Running,
    /// Every partition was processed
    Completed,
    /// Stopped early because the failure budget ran out
    Aborted,
    /// Found still `Running` when a later run started
    Interrupted,
}

impl RunStatus {
    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Aborted => "aborted",
            Self::Interrupted => "interrupted",
        }
    }

    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "running" => Some(Self::Running),
            "completed" => Some(Self::Completed),
            "aborted" => Some(Self::Aborted),
            "interrupted" => Some(Self::Interrupted),
            _ => None,
        }
    }
}

/// A non-recoverable request failure, kept for post-mortem
#[derive(Debug, Clone)]
pub struct FailureRecord {
    /// Partition or repository the request belonged to
    pub scope: String,
    /// Page number for search requests
    pub page: Option<u32>,
    /// HTTP status, when the failure came from a response
    pub status_code: Option<u16>,
    pub message: String,
}

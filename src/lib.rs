//! gh-harvest: a resumable code-search harvester
//!
//! This crate walks a code-hosting platform's code search API over a grid of
//! query × filename-prefix partitions, deduplicates the repositories it finds,
//! enriches them with repository metadata, and persists everything
//! incrementally to Parquet files. Progress is tracked in a SQLite ledger so an
//! interrupted or rate-limited run can be resumed without redoing work.

pub mod config;
pub mod crawler;
pub mod output;
pub mod state;
pub mod storage;

use thiserror::Error;

/// Main error type for harvest operations
#[derive(Debug, Error)]
pub enum HarvestError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("HTTP error for {url}: {source}")]
    Http { url: String, source: reqwest::Error },

    #[error("Upstream request for {scope} failed with status {status}: {message}")]
    Upstream {
        scope: String,
        status: u16,
        message: String,
    },

    #[error("Rate limit persisted for {scope} after {attempts} attempts")]
    MaxRetriesExceeded { scope: String, attempts: u32 },

    #[error("Malformed response for {scope}: {message}")]
    MalformedResponse { scope: String, message: String },

    #[error("Storage error: {0}")]
    Storage(#[from] storage::StorageError),

    #[error("URL parse error: {0}")]
    UrlParse(#[from] ::url::ParseError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl HarvestError {
    /// Returns the HTTP status carried by an upstream failure, if any
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Upstream { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("At least 2 credentials are required, found {found}")]
    InsufficientCredentials { found: usize },
}

/// Result type alias for harvest operations
pub type Result<T> = std::result::Result<T, HarvestError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

// Re-export commonly used types
pub use config::Config;
pub use crawler::{Coordinator, CredentialRotator, Enricher, RateLimitGovernor, Verdict};
pub use storage::{normalize_record, ParquetStore, Record, RecordStore, SqliteLedger};

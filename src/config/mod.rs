//! Configuration module for gh-harvest
//!
//! This module handles loading, parsing, and validating TOML configuration files.
//!
//! # Example
//!
//! ```no_run
//! use gh_harvest::config::load_config;
//! use std::path::Path;
//!
//! let config = load_config(Path::new("harvest.toml")).unwrap();
//! println!("Walking at most {} pages per partition", config.crawler.max_pages);
//! ```

mod parser;
mod types;
mod validation;

// Re-export types
pub use types::{
    ApiConfig, Config, CrawlerConfig, CredentialsConfig, EnrichmentConfig, OutputConfig,
    QueryEntry,
};

// Re-export parser functions
pub use parser::{compute_config_hash, load_config, load_config_with_hash, parse_config};
pub use validation::validate;

use std::path::PathBuf;

impl Config {
    /// Root directory of all Parquet output
    pub fn data_dir(&self) -> PathBuf {
        PathBuf::from(&self.output.data_dir)
    }

    /// Location of the SQLite progress ledger
    pub fn ledger_path(&self) -> PathBuf {
        let path = PathBuf::from(&self.output.ledger_path);
        if path.is_absolute() {
            path
        } else {
            self.data_dir().join(path)
        }
    }
}

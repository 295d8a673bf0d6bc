//! Search partitions
//!
//! The code search API caps every query at 1000 results, so each logical
//! query is split by a two-character filename prefix. The first character
//! picks the outer partition (one output file, one unit of resumption); the
//! second character picks the inner partition that is paginated on its own.

use crate::config::{CrawlerConfig, QueryEntry};
use crate::crawler::client::SearchRequest;
use std::fmt;
use std::path::{Path, PathBuf};

/// One query restricted to one first filename character
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OuterPartition {
    pub query_name: String,
    pub query_text: String,
    pub outer: char,
}

impl OuterPartition {
    pub fn new(query: &QueryEntry, outer: char) -> Self {
        Self {
            query_name: query.name.clone(),
            query_text: query.text.clone(),
            outer,
        }
    }

    /// Ledger key for the outer character
    pub fn outer_key(&self) -> String {
        self.outer.to_string()
    }

    /// Leading `_`-separated segment of the query name ("mtls" in "mtls_strict_v1")
    pub fn category(&self) -> &str {
        self.query_name.split('_').next().unwrap_or(&self.query_name)
    }

    /// Trailing `_`-separated segment of the query name ("v1" in "mtls_strict_v1")
    pub fn version(&self) -> &str {
        self.query_name.rsplit('_').next().unwrap_or(&self.query_name)
    }

    /// Renders the output path of this partition under `data_dir`
    ///
    /// Placeholders: `{query}`, `{category}`, `{version}`, `{outer}`.
    pub fn output_path(&self, data_dir: &Path, template: &str) -> PathBuf {
        let relative = template
            .replace("{query}", &self.query_name)
            .replace("{category}", self.category())
            .replace("{version}", self.version())
            .replace("{outer}", &self.outer_key());
        data_dir.join(relative)
    }

    /// The inner partitions, one per character of `inner_alphabet`
    pub fn search_partitions(&self, inner_alphabet: &str) -> Vec<SearchPartition> {
        inner_alphabet
            .chars()
            .map(|inner| SearchPartition {
                query_name: self.query_name.clone(),
                query_text: self.query_text.clone(),
                prefix: format!("{}{}", self.outer, inner),
            })
            .collect()
    }
}

impl fmt::Display for OuterPartition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.query_name, self.outer)
    }
}

/// One independently paginated search: a query plus a filename prefix
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchPartition {
    pub query_name: String,
    pub query_text: String,
    pub prefix: String,
}

impl SearchPartition {
    /// Request for one page of this partition
    pub fn request(&self, page: u32) -> SearchRequest {
        SearchRequest {
            query: self.query_text.clone(),
            filename_prefix: self.prefix.clone(),
            page,
        }
    }
}

impl fmt::Display for SearchPartition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.query_name, self.prefix)
    }
}

/// Every outer partition in crawl order: queries first, then outer characters
pub fn outer_partitions(queries: &[QueryEntry], config: &CrawlerConfig) -> Vec<OuterPartition> {
    queries
        .iter()
        .flat_map(|query| {
            config
                .outer_alphabet
                .chars()
                .map(move |outer| OuterPartition::new(query, outer))
        })
        .collect()
}

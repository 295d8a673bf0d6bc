//! Crawler module for code search harvesting
//!
//! This module contains the core crawling logic, including:
//! - Credential rotation and rate-limit handling
//! - The HTTP transport for the search and repository endpoints
//! - Partitioning queries by filename prefix and walking their pages
//! - Overall crawl coordination and metadata enrichment

mod client;
mod coordinator;
mod credentials;
mod enricher;
mod governor;
mod partition;
mod session;
#[cfg(test)]
mod testing;
mod walker;

pub use client::{build_http_client, GitHubClient, ResponseOutcome, SearchRequest, Transport};
pub use coordinator::{Coordinator, CrawlReport};
pub use credentials::{Credential, CredentialRotator};
pub use enricher::{enrichment_targets, EnrichReport, Enricher, EnrichmentTarget};
pub use governor::{RateLimitGovernor, Verdict};
pub use partition::{outer_partitions, OuterPartition, SearchPartition};
pub use session::{ApiSession, SessionSettings};
pub use walker::{repository_full_name, QueryWalker, DEFAULT_MAX_PAGES};

use crate::config::Config;
use crate::HarvestError;

/// Runs a complete crawl against the configured API
///
/// Credentials are read from the environment variables named in the
/// configuration; at least two must be set.
///
/// # Arguments
///
/// * `config` - The harvest configuration
/// * `fresh` - Walk every partition again, ignoring recorded progress
/// * `config_hash` - Hash of the configuration file, stored with the run
pub async fn crawl(
    config: Config,
    fresh: bool,
    config_hash: &str,
) -> Result<CrawlReport, HarvestError> {
    let rotator = CredentialRotator::from_env(&config.credentials)?;
    let client = GitHubClient::new(&config.api)?;
    tracing::info!("Loaded {} credentials", rotator.len());

    let mut coordinator =
        Coordinator::new(config, client, rotator, fresh)?.with_config_hash(config_hash);
    coordinator.run().await
}

/// Runs metadata enrichment over everything crawled so far
pub async fn enrich(config: Config, config_hash: &str) -> Result<EnrichReport, HarvestError> {
    let rotator = CredentialRotator::from_env(&config.credentials)?;
    let client = GitHubClient::new(&config.api)?;
    tracing::info!("Loaded {} credentials", rotator.len());

    let mut enricher = Enricher::new(config, client, rotator)?.with_config_hash(config_hash);
    enricher.run().await
}

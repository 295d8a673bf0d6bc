//! A rate-limit-aware API session
//!
//! The session owns the transport, the credential rotator and the governor,
//! and is the only place that sleeps. Every request goes through
//! `execute`, which retries throttled requests with the same credential
//! until the governor clears them or the retry bound is hit.

use crate::config::{Config, CrawlerConfig};
use crate::crawler::client::{ResponseOutcome, SearchRequest, Transport};
use crate::crawler::credentials::CredentialRotator;
use crate::crawler::governor::{RateLimitGovernor, Verdict};
use crate::crawler::partition::SearchPartition;
use crate::HarvestError;
use std::time::Duration;

/// Longest body excerpt kept in an upstream error
const MAX_ERROR_BODY: usize = 200;

/// Pacing knobs for a session
#[derive(Debug, Clone)]
pub struct SessionSettings {
    /// Pause taken by `pause()` between successful requests
    pub politeness_delay: Duration,
    /// Rate-limit waits allowed for one request
    pub max_rate_limit_retries: u32,
}

impl SessionSettings {
    /// Settings for walking search partitions
    pub fn for_crawl(config: &CrawlerConfig) -> Self {
        Self {
            politeness_delay: Duration::from_millis(config.politeness_delay_ms),
            max_rate_limit_retries: config.max_rate_limit_retries,
        }
    }

    /// Settings for repository metadata lookups
    pub fn for_enrichment(config: &Config) -> Self {
        Self {
            politeness_delay: Duration::from_millis(config.enrichment.politeness_delay_ms),
            max_rate_limit_retries: config.crawler.max_rate_limit_retries,
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum Call<'a> {
    Search(&'a SearchRequest),
    Repository(&'a str),
}

/// Transport plus credentials, governor and pacing
pub struct ApiSession<T: Transport> {
    transport: T,
    rotator: CredentialRotator,
    governor: RateLimitGovernor,
    settings: SessionSettings,
    requests_sent: u64,
    rate_limit_waits: u64,
}

impl<T: Transport> ApiSession<T> {
    pub fn new(
        transport: T,
        rotator: CredentialRotator,
        governor: RateLimitGovernor,
        settings: SessionSettings,
    ) -> Self {
        Self {
            transport,
            rotator,
            governor,
            settings,
            requests_sent: 0,
            rate_limit_waits: 0,
        }
    }

    /// Fetches one page of a search partition
    pub async fn search(
        &mut self,
        partition: &SearchPartition,
        page: u32,
    ) -> Result<ResponseOutcome, HarvestError> {
        let request = partition.request(page);
        let scope = format!("{} page {}", partition, page);
        self.execute(&scope, Call::Search(&request)).await
    }

    /// Fetches one repository's metadata
    pub async fn repository(&mut self, full_name: &str) -> Result<ResponseOutcome, HarvestError> {
        self.execute(full_name, Call::Repository(full_name)).await
    }

    /// Moves on to the next credential
    pub fn rotate(&mut self) {
        self.rotator.advance();
    }

    /// Sleeps for the politeness delay
    pub async fn pause(&self) {
        if !self.settings.politeness_delay.is_zero() {
            tokio::time::sleep(self.settings.politeness_delay).await;
        }
    }

    /// Requests issued so far, retries included
    pub fn requests_sent(&self) -> u64 {
        self.requests_sent
    }

    /// Rate-limit waits taken so far
    pub fn rate_limit_waits(&self) -> u64 {
        self.rate_limit_waits
    }

    pub fn rotator(&self) -> &CredentialRotator {
        &self.rotator
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    async fn execute(&mut self, scope: &str, call: Call<'_>) -> Result<ResponseOutcome, HarvestError> {
        let mut waits = 0u32;

        loop {
            let credential = self.rotator.current();
            self.requests_sent += 1;

            let outcome = match call {
                Call::Search(request) => self.transport.search(credential, request).await?,
                Call::Repository(full_name) => {
                    self.transport.repository(credential, full_name).await?
                }
            };

            match self.governor.classify(&outcome) {
                Verdict::Ok => return Ok(outcome),
                Verdict::RetryAfter(wait) => {
                    if waits >= self.settings.max_rate_limit_retries {
                        return Err(HarvestError::MaxRetriesExceeded {
                            scope: scope.to_string(),
                            attempts: waits + 1,
                        });
                    }
                    waits += 1;
                    self.rate_limit_waits += 1;
                    tracing::warn!(
                        "Rate limit hit for {}. Waiting {}s (wait {}/{})",
                        scope,
                        wait.as_secs(),
                        waits,
                        self.settings.max_rate_limit_retries
                    );
                    tokio::time::sleep(wait).await;
                }
                Verdict::Fatal => {
                    let message = outcome
                        .message()
                        .unwrap_or_else(|| outcome.body.chars().take(MAX_ERROR_BODY).collect());
                    return Err(HarvestError::Upstream {
                        scope: scope.to_string(),
                        status: outcome.status,
                        message,
                    });
                }
            }
        }
    }
}

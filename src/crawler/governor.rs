//! Rate-limit classification
//!
//! The governor looks at a response and decides whether the caller should
//! carry on, wait and retry, or give up on the request. It never sleeps
//! itself.
//!
//! # Wait computation
//!
//! | Source | Wait |
//! |--------|------|
//! | `Retry-After: N` | N seconds |
//! | `X-RateLimit-Reset: T` | `T - now`, at least 1 second |
//! | neither | fallback (60 seconds by default) |
//!
//! Header-derived waits are capped at one hour, the longest window of the
//! primary rate limit. The safety margin is added to whichever applies.

use crate::config::CrawlerConfig;
use crate::crawler::client::ResponseOutcome;
use std::time::Duration;

/// Upper bound on a wait taken from response headers
const MAX_HEADER_WAIT: Duration = Duration::from_secs(3600);

/// What to do with a response
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    /// Success; use the body
    Ok,
    /// Throttled; sleep this long and retry the same request
    RetryAfter(Duration),
    /// Any other failure; do not retry
    Fatal,
}

/// Classifies responses into success, throttling or failure
#[derive(Debug, Clone)]
pub struct RateLimitGovernor {
    fallback: Duration,
    margin: Duration,
}

impl RateLimitGovernor {
    pub fn new(fallback: Duration, margin: Duration) -> Self {
        Self { fallback, margin }
    }

    pub fn from_config(config: &CrawlerConfig) -> Self {
        Self::new(
            Duration::from_secs(config.rate_limit_fallback_secs),
            Duration::from_secs(config.rate_limit_margin_secs),
        )
    }

    /// Classifies a response against the current wall clock
    pub fn classify(&self, outcome: &ResponseOutcome) -> Verdict {
        self.classify_at(outcome, chrono::Utc::now().timestamp())
    }

    /// Classifies a response as if the time were `now` (Unix seconds)
    pub fn classify_at(&self, outcome: &ResponseOutcome, now: i64) -> Verdict {
        match outcome.status {
            200 => Verdict::Ok,
            403 | 429 if is_rate_limited(outcome) => {
                Verdict::RetryAfter(self.wait_for(outcome, now).saturating_add(self.margin))
            }
            _ => Verdict::Fatal,
        }
    }

    fn wait_for(&self, outcome: &ResponseOutcome, now: i64) -> Duration {
        if let Some(secs) = outcome
            .header("retry-after")
            .and_then(|v| v.trim().parse::<u64>().ok())
        {
            return Duration::from_secs(secs).min(MAX_HEADER_WAIT);
        }

        if let Some(reset) = outcome
            .header("x-ratelimit-reset")
            .and_then(|v| v.trim().parse::<i64>().ok())
        {
            let secs = reset.saturating_sub(now).max(1) as u64;
            return Duration::from_secs(secs).min(MAX_HEADER_WAIT);
        }

        self.fallback
    }
}

/// Primary and secondary limits both mention "rate limit" in the message
fn is_rate_limited(outcome: &ResponseOutcome) -> bool {
    let text = outcome.message().unwrap_or_else(|| outcome.body.clone());
    text.to_ascii_lowercase().contains("rate limit")
}

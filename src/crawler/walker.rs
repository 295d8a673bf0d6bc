//! Paginated walk over one search partition
//!
//! The walker fetches pages 1, 2, ... of a single partition and hands each
//! page's items back to the caller. It stops when:
//!
//! | Condition | Result |
//! |-----------|--------|
//! | A page comes back empty | `Ok(None)` (natural exhaustion) |
//! | The page ceiling is reached | `Ok(None)` |
//! | A request fails for good | `Err(..)`, then `Ok(None)` forever |
//!
//! Throttled requests are retried inside the session and never advance the
//! page counter or the credential. A walk cannot be resumed mid-way: a new
//! walker starts at page 1 and relies on dedup downstream.

use crate::crawler::client::Transport;
use crate::crawler::partition::SearchPartition;
use crate::crawler::session::ApiSession;
use crate::storage::Record;
use crate::HarvestError;
use serde_json::Value;

/// Default page ceiling per partition
pub const DEFAULT_MAX_PAGES: u32 = 10;

/// Lazy page-by-page walk over one search partition
#[derive(Debug)]
pub struct QueryWalker {
    partition: SearchPartition,
    max_pages: u32,
    next_page: u32,
    finished: bool,
}

impl QueryWalker {
    pub fn new(partition: SearchPartition, max_pages: u32) -> Self {
        Self {
            partition,
            max_pages,
            next_page: 1,
            finished: false,
        }
    }

    pub fn partition(&self) -> &SearchPartition {
        &self.partition
    }

    /// The page the next call will request
    pub fn next_page_number(&self) -> u32 {
        self.next_page
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Fetches the next non-empty page
    ///
    /// # Returns
    ///
    /// * `Ok(Some(items))` - Items of the page just fetched
    /// * `Ok(None)` - The walk is over
    /// * `Err(HarvestError)` - The page failed; the walk is abandoned
    pub async fn next_page<T: Transport>(
        &mut self,
        session: &mut ApiSession<T>,
    ) -> Result<Option<Vec<Record>>, HarvestError> {
        if self.finished || self.next_page > self.max_pages {
            self.finished = true;
            return Ok(None);
        }

        let page = self.next_page;
        let result = session.search(&self.partition, page).await;
        let items = match result.and_then(|outcome| self.parse_items(&outcome.body, page)) {
            Ok(items) => items,
            Err(e) => {
                self.finished = true;
                return Err(e);
            }
        };

        if items.is_empty() {
            tracing::debug!(
                "No more results for {}, stopping at page {}",
                self.partition,
                page
            );
            self.finished = true;
            return Ok(None);
        }

        tracing::trace!(
            "{} page {}: {} item(s)",
            self.partition,
            page,
            items.len()
        );

        self.next_page += 1;
        session.rotate();
        session.pause().await;

        Ok(Some(items))
    }

    fn parse_items(&self, body: &str, page: u32) -> Result<Vec<Record>, HarvestError> {
        let malformed = |message: String| HarvestError::MalformedResponse {
            scope: format!("{} page {}", self.partition, page),
            message,
        };

        let document: Value = serde_json::from_str(body).map_err(|e| malformed(e.to_string()))?;
        let items = match document.get("items") {
            Some(Value::Array(items)) => items,
            Some(_) => return Err(malformed("`items` is not an array".to_string())),
            None => return Ok(Vec::new()),
        };

        Ok(items
            .iter()
            .filter_map(|item| item.as_object().cloned())
            .collect())
    }
}

/// Repository full name of a search item (`repository.full_name`)
pub fn repository_full_name(item: &Record) -> Option<&str> {
    item.get("repository")?.get("full_name")?.as_str()
}

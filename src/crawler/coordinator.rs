//! Crawler coordinator - main crawl orchestration logic
//!
//! The coordinator walks every outer partition (query × first filename
//! character) in order, and inside each one every search partition (second
//! filename character) page by page. It is responsible for:
//! - Seeding the seen set from partitions already on disk
//! - Skipping outer partitions the ledger records as complete
//! - Buffering new items and flushing them once per outer partition
//! - Charging the failure budget and stopping the run when it runs out

use crate::config::Config;
use crate::crawler::client::Transport;
use crate::crawler::credentials::CredentialRotator;
use crate::crawler::governor::RateLimitGovernor;
use crate::crawler::partition::{outer_partitions, OuterPartition, SearchPartition};
use crate::crawler::session::{ApiSession, SessionSettings};
use crate::crawler::walker::{repository_full_name, QueryWalker};
use crate::state::{FailureBudget, SeenSet};
use crate::storage::{
    item_partitions, FailureRecord, Ledger, ParquetStore, Record, RecordStore, RunKind,
    RunStatus, SqliteLedger, ITEM_KEY_COLUMN,
};
use crate::HarvestError;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Instant;

/// Summary of one crawl run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CrawlReport {
    pub run_id: i64,
    pub status: RunStatus,
    pub partitions_completed: usize,
    pub partitions_skipped: usize,
    pub records_saved: usize,
    pub failures: u32,
    pub requests: u64,
}

/// Main crawler coordinator structure
pub struct Coordinator<T: Transport> {
    config: Config,
    session: ApiSession<T>,
    ledger: SqliteLedger,
    store: ParquetStore,
    seen: SeenSet,
    budget: FailureBudget,
    config_hash: String,
}

impl<T: Transport> Coordinator<T> {
    /// Creates a new coordinator instance
    ///
    /// # Arguments
    ///
    /// * `config` - The harvest configuration
    /// * `transport` - Transport used for every API request
    /// * `rotator` - The credential pool
    /// * `fresh` - Forget completed partitions and walk everything again
    ///
    /// # Returns
    ///
    /// * `Ok(Coordinator)` - Ledger opened and seen set seeded
    /// * `Err(HarvestError)` - Failed to open the ledger or read existing partitions
    pub fn new(
        config: Config,
        transport: T,
        rotator: CredentialRotator,
        fresh: bool,
    ) -> Result<Self, HarvestError> {
        let mut ledger = SqliteLedger::new(&config.ledger_path())?;

        let interrupted = ledger.mark_stale_runs_interrupted()?;
        if interrupted > 0 {
            tracing::warn!("Marked {} stale run(s) as interrupted", interrupted);
        }

        if fresh {
            tracing::info!("Fresh crawl requested, clearing partition progress");
            ledger.clear_progress()?;
        }

        let store = ParquetStore::new(ITEM_KEY_COLUMN);
        let existing = item_partitions(&config.data_dir());
        let seen = SeenSet::seed_from_store(&store, &existing)?;
        tracing::info!(
            "Seeded {} known repositories from {} partition file(s)",
            seen.len(),
            existing.len()
        );

        let session = ApiSession::new(
            transport,
            rotator,
            RateLimitGovernor::from_config(&config.crawler),
            SessionSettings::for_crawl(&config.crawler),
        );
        let budget = FailureBudget::new(config.crawler.failure_budget);

        Ok(Self {
            config,
            session,
            ledger,
            store,
            seen,
            budget,
            config_hash: String::new(),
        })
    }

    /// Sets the configuration hash recorded with the run
    pub fn with_config_hash(mut self, hash: impl Into<String>) -> Self {
        self.config_hash = hash.into();
        self
    }

    /// Repositories discovered so far, seeded ones included
    pub fn seen(&self) -> &SeenSet {
        &self.seen
    }

    pub fn ledger(&self) -> &SqliteLedger {
        &self.ledger
    }

    pub fn session(&self) -> &ApiSession<T> {
        &self.session
    }

    /// Runs the crawl over every outer partition
    ///
    /// Returns a report once every partition is done or the failure budget is
    /// exhausted. Request, persistence and progress-recording failures never
    /// end the run early on their own; only opening the run is fatal.
    pub async fn run(&mut self) -> Result<CrawlReport, HarvestError> {
        let run_id = self.ledger.create_run(RunKind::Crawl, &self.config_hash)?;
        let partitions = outer_partitions(&self.config.queries, &self.config.crawler);
        tracing::info!(
            "Starting crawl run {} over {} outer partition(s)",
            run_id,
            partitions.len()
        );

        let start_time = Instant::now();
        let mut report = CrawlReport {
            run_id,
            status: RunStatus::Running,
            partitions_completed: 0,
            partitions_skipped: 0,
            records_saved: 0,
            failures: 0,
            requests: 0,
        };

        for outer in &partitions {
            let complete = self
                .ledger
                .is_partition_complete(&outer.query_name, &outer.outer_key())
                .unwrap_or_else(|e| {
                    tracing::error!("Failed to read progress for {}: {}", outer, e);
                    false
                });
            if complete {
                tracing::debug!("Skipping completed partition {}", outer);
                report.partitions_skipped += 1;
                continue;
            }

            let saved = self.crawl_outer(run_id, outer).await;
            report.records_saved += saved.unwrap_or(0);

            if self.budget.is_exhausted() {
                break;
            }

            if let Some(saved) = saved {
                if let Err(e) = self.ledger.mark_partition_complete(
                    run_id,
                    &outer.query_name,
                    &outer.outer_key(),
                    saved,
                ) {
                    tracing::error!("Failed to record {} as complete: {}", outer, e);
                    continue;
                }
                report.partitions_completed += 1;
                tracing::info!("Completed {} ({} new repositories)", outer, saved);
            }
        }

        let status = if self.budget.is_exhausted() {
            RunStatus::Aborted
        } else {
            RunStatus::Completed
        };
        self.ledger.finish_run(run_id, status)?;

        report.status = status;
        report.failures = self.budget.failures();
        report.requests = self.session.requests_sent();

        match status {
            RunStatus::Aborted => tracing::warn!(
                "Crawl run {} aborted after {} failure(s): {} partition(s) completed, {} record(s) saved in {:?}",
                run_id,
                report.failures,
                report.partitions_completed,
                report.records_saved,
                start_time.elapsed()
            ),
            _ => tracing::info!(
                "Crawl run {} completed: {} partition(s) completed, {} skipped, {} record(s) saved in {:?}",
                run_id,
                report.partitions_completed,
                report.partitions_skipped,
                report.records_saved,
                start_time.elapsed()
            ),
        }

        Ok(report)
    }

    /// Walks one outer partition and flushes what it found
    ///
    /// Returns the number of records written, or `None` if the flush failed
    /// and the partition must not be marked complete.
    async fn crawl_outer(
        &mut self,
        run_id: i64,
        outer: &OuterPartition,
    ) -> Option<usize> {
        let path = self.output_path(outer);
        let mut pending: Vec<Record> = Vec::new();
        let mut pending_names: HashSet<String> = HashSet::new();

        tracing::info!("Crawling {} into {}", outer, path.display());

        for search in outer.search_partitions(&self.config.crawler.inner_alphabet) {
            if self.budget.is_exhausted() {
                break;
            }

            let mut walker = QueryWalker::new(search, self.config.crawler.max_pages);
            loop {
                match walker.next_page(&mut self.session).await {
                    Ok(Some(items)) => {
                        for item in items {
                            let Some(name) = repository_full_name(&item).map(str::to_string)
                            else {
                                tracing::debug!("Skipping item without a repository name");
                                continue;
                            };
                            if self.seen.has_seen(&name) || !pending_names.insert(name) {
                                continue;
                            }
                            pending.push(item);
                        }
                    }
                    Ok(None) => break,
                    Err(e) => {
                        let page = walker.next_page_number();
                        self.charge_failure(run_id, walker.partition(), page, &e);
                        break;
                    }
                }
            }
        }

        self.flush(&path, pending, pending_names)
    }

    fn charge_failure(
        &mut self,
        run_id: i64,
        partition: &SearchPartition,
        page: u32,
        error: &HarvestError,
    ) {
        let exhausted = self.budget.record_failure();
        tracing::warn!(
            "Abandoning {} at page {}: {} ({} failure(s) left)",
            partition,
            page,
            error,
            self.budget.remaining()
        );

        if let Err(e) = self.ledger.record_failure(
            run_id,
            &FailureRecord {
                scope: partition.to_string(),
                page: Some(page),
                status_code: error.status(),
                message: error.to_string(),
            },
        ) {
            tracing::error!("Failed to record failure for {}: {}", partition, e);
        }

        if exhausted {
            tracing::error!(
                "Failure budget of {} exhausted, stopping crawl",
                self.budget.ceiling()
            );
        }
    }

    fn flush(
        &mut self,
        path: &Path,
        pending: Vec<Record>,
        names: HashSet<String>,
    ) -> Option<usize> {
        if pending.is_empty() {
            return Some(0);
        }

        match self.store.append_all(path, &pending) {
            Ok(written) => {
                for name in names {
                    self.seen.mark_seen(name);
                }
                Some(written)
            }
            Err(e) => {
                tracing::error!(
                    "Failed to persist {} record(s) to {}: {}",
                    pending.len(),
                    path.display(),
                    e
                );
                None
            }
        }
    }

    /// Output path of an outer partition under the configured data directory
    pub fn output_path(&self, outer: &OuterPartition) -> PathBuf {
        outer.output_path(&self.config.data_dir(), &self.config.output.path_template)
    }
}

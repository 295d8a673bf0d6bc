//! Repository metadata enrichment
//!
//! Every directory holding item partitions gets one metadata partition named
//! after it, `<data-dir>/<dir name>_repos.parquet`, with one row per
//! repository mentioned in those items. Repositories already present in the
//! metadata partition are never fetched again. Each row also keeps the name it
//! was requested under, so a renamed repository is skipped on later runs.

use crate::config::Config;
use crate::crawler::client::Transport;
use crate::crawler::credentials::CredentialRotator;
use crate::crawler::governor::RateLimitGovernor;
use crate::crawler::session::{ApiSession, SessionSettings};
use crate::state::{FailureBudget, SeenSet};
use crate::storage::{
    item_partitions, FailureRecord, Ledger, ParquetStore, Record, RecordStore, RunKind,
    RunStatus, SqliteLedger, ITEM_KEY_COLUMN, REPOS_FILE_SUFFIX, REPO_KEY_COLUMN,
    REQUESTED_KEY_COLUMN,
};
use crate::HarvestError;
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

/// Summary of one enrichment run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnrichReport {
    pub run_id: i64,
    pub status: RunStatus,
    pub repositories_saved: usize,
    pub repositories_skipped: usize,
    pub not_found: usize,
    pub failures: u32,
}

/// Item partitions grouped by the metadata partition they feed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnrichmentTarget {
    pub output: PathBuf,
    pub sources: Vec<PathBuf>,
}

/// Groups the item partitions below `data_dir` by parent directory name
pub fn enrichment_targets(data_dir: &Path) -> Vec<EnrichmentTarget> {
    let mut groups: BTreeMap<String, Vec<PathBuf>> = BTreeMap::new();
    for path in item_partitions(data_dir) {
        let Some(dir_name) = path
            .parent()
            .and_then(Path::file_name)
            .and_then(|name| name.to_str())
        else {
            continue;
        };
        groups.entry(dir_name.to_string()).or_default().push(path);
    }

    groups
        .into_iter()
        .map(|(dir_name, sources)| EnrichmentTarget {
            output: data_dir.join(format!("{}{}", dir_name, REPOS_FILE_SUFFIX)),
            sources,
        })
        .collect()
}

/// Fetches repository metadata for every discovered repository
pub struct Enricher<T: Transport> {
    config: Config,
    session: ApiSession<T>,
    ledger: SqliteLedger,
    items: ParquetStore,
    repos: ParquetStore,
    requested: ParquetStore,
    budget: FailureBudget,
    config_hash: String,
}

impl<T: Transport> Enricher<T> {
    pub fn new(
        config: Config,
        transport: T,
        rotator: CredentialRotator,
    ) -> Result<Self, HarvestError> {
        let mut ledger = SqliteLedger::new(&config.ledger_path())?;
        ledger.mark_stale_runs_interrupted()?;

        let session = ApiSession::new(
            transport,
            rotator,
            RateLimitGovernor::from_config(&config.crawler),
            SessionSettings::for_enrichment(&config),
        );
        let budget = FailureBudget::new(config.crawler.failure_budget);

        Ok(Self {
            config,
            session,
            ledger,
            items: ParquetStore::new(ITEM_KEY_COLUMN),
            repos: ParquetStore::new(REPO_KEY_COLUMN),
            requested: ParquetStore::new(REQUESTED_KEY_COLUMN),
            budget,
            config_hash: String::new(),
        })
    }

    pub fn with_config_hash(mut self, hash: impl Into<String>) -> Self {
        self.config_hash = hash.into();
        self
    }

    pub fn ledger(&self) -> &SqliteLedger {
        &self.ledger
    }

    pub fn session(&self) -> &ApiSession<T> {
        &self.session
    }

    /// Enriches every target, stopping early only when the budget runs out
    pub async fn run(&mut self) -> Result<EnrichReport, HarvestError> {
        let run_id = self.ledger.create_run(RunKind::Enrich, &self.config_hash)?;
        let targets = enrichment_targets(&self.config.data_dir());
        tracing::info!(
            "Starting enrichment run {} over {} target(s)",
            run_id,
            targets.len()
        );

        let mut report = EnrichReport {
            run_id,
            status: RunStatus::Running,
            repositories_saved: 0,
            repositories_skipped: 0,
            not_found: 0,
            failures: 0,
        };

        for target in &targets {
            if self.budget.is_exhausted() {
                break;
            }
            if let Err(e) = self.enrich_target(run_id, target, &mut report).await {
                tracing::error!("Skipping {}: {}", target.output.display(), e);
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

        tracing::info!(
            "Enrichment run {} {}: {} saved, {} already present, {} not found, {} failure(s)",
            run_id,
            status.to_db_string(),
            report.repositories_saved,
            report.repositories_skipped,
            report.not_found,
            report.failures
        );

        Ok(report)
    }

    async fn enrich_target(
        &mut self,
        run_id: i64,
        target: &EnrichmentTarget,
        report: &mut EnrichReport,
    ) -> Result<(), HarvestError> {
        let mut names: BTreeSet<String> = BTreeSet::new();
        for source in &target.sources {
            names.extend(self.items.keys(source)?);
        }

        let mut seen = SeenSet::seed_from_store(&self.repos, &[&target.output])?;
        let present = seen.len();
        for requested in self.requested.keys(&target.output)? {
            seen.mark_seen(requested);
        }
        tracing::info!(
            "Enriching {} repositories into {} ({} already present)",
            names.len(),
            target.output.display(),
            present
        );

        for name in names {
            if self.budget.is_exhausted() {
                break;
            }
            if seen.has_seen(&name) {
                report.repositories_skipped += 1;
                continue;
            }

            match self.fetch(&name).await {
                Ok(mut record) => {
                    record.insert(
                        REQUESTED_KEY_COLUMN.to_string(),
                        Value::String(name.clone()),
                    );
                    match self.repos.append(&target.output, &record) {
                        Ok(true) => {
                            seen.mark_seen(name);
                            report.repositories_saved += 1;
                        }
                        Ok(false) => {
                            tracing::debug!("{} is already stored under its current name", name);
                            seen.mark_seen(name);
                            report.repositories_skipped += 1;
                        }
                        Err(e) => {
                            tracing::error!("Failed to persist metadata for {}: {}", name, e)
                        }
                    }
                }
                Err(e) if e.status() == Some(404) => {
                    tracing::info!("Repository {} no longer exists, skipping", name);
                    report.not_found += 1;
                }
                Err(e) => self.charge_failure(run_id, &name, &e),
            }

            self.session.rotate();
            self.session.pause().await;
        }

        Ok(())
    }

    async fn fetch(&mut self, full_name: &str) -> Result<Record, HarvestError> {
        let outcome = self.session.repository(full_name).await?;
        match serde_json::from_str::<Value>(&outcome.body)? {
            Value::Object(record) => Ok(record),
            _ => Err(HarvestError::MalformedResponse {
                scope: full_name.to_string(),
                message: "repository document is not an object".to_string(),
            }),
        }
    }

    fn charge_failure(
        &mut self,
        run_id: i64,
        full_name: &str,
        error: &HarvestError,
    ) {
        let exhausted = self.budget.record_failure();
        tracing::warn!(
            "Failed to enrich {}: {} ({} failure(s) left)",
            full_name,
            error,
            self.budget.remaining()
        );
        if let Err(e) = self.ledger.record_failure(
            run_id,
            &FailureRecord {
                scope: full_name.to_string(),
                page: None,
                status_code: error.status(),
                message: error.to_string(),
            },
        ) {
            tracing::error!("Failed to record failure for {}: {}", full_name, e);
        }
        if exhausted {
            tracing::error!(
                "Failure budget of {} exhausted, stopping enrichment",
                self.budget.ceiling()
            );
        }
    }
}

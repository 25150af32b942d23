//! Reconciliation batch runner.
//!
//! ```text
//!   scope ──▶ partitions ──▶ population sizes (fatal on failure)
//!                                 │
//!                                 ▼
//!                 ┌──── page 0..ceil(size / page_size) ────┐
//!                 │  population_page   (error: page-error) │
//!                 │  counts(source) ┐                      │
//!                 │  counts(target) ┘ batch, or per key    │
//!                 │                   (error: mismatch-error)
//!                 │  sort ▶ diff ▶ detail ▶ policy         │
//!                 └────────────────────────────────────────┘
//!                                 │
//!                                 ▼
//!                   per-mismatch events + summary event
//! ```
//!
//! A report run never mutates either system. Page and key failures are
//! recorded and skipped so the summary covers everything that could be
//! checked.

use std::sync::Arc;

use chrono::Utc;
use futures_util::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

use syncbridge_connector::{
    ComparisonKey, ConnectorError, CountClient, CountRecord, DetailClient, PopulationClient,
};
use syncbridge_events::{TelemetryEvent, TelemetrySink};

use super::diff::{diff, sorted, Mismatch};
use super::policy::ReconciliationKind;
use super::report::{ReconciliationSummary, ReportedMismatch};
use super::statistics::StatisticsTracker;

/// Reconciliation run errors. Only failures before paging starts abort a run.
#[derive(Debug, Error)]
pub enum ReconciliationError {
    #[error("Failed to list active partitions: {0}")]
    Partitions(#[source] ConnectorError),

    #[error("Failed to establish population size for partition {partition}: {source}")]
    PopulationSize {
        partition: String,
        #[source]
        source: ConnectorError,
    },

    #[error("Invalid reconciliation configuration: {0}")]
    InvalidConfig(String),

    #[error("Reconciliation run aborted: {0}")]
    Aborted(String),
}

/// Result type for reconciliation runs.
pub type ReconciliationResult<T> = Result<T, ReconciliationError>;

/// What a run covers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "partition", rename_all = "snake_case")]
pub enum ReconciliationScope {
    /// A single partition, e.g. one prison.
    Partition(String),
    /// Every partition reported by the population client.
    AllActive,
}

impl std::fmt::Display for ReconciliationScope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Partition(partition) => write!(f, "{partition}"),
            Self::AllActive => write!(f, "all-active"),
        }
    }
}

/// Paging and concurrency settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconciliationConfig {
    /// Keys per population page.
    pub page_size: u64,
    /// Concurrent per-key and detail calls within a page.
    pub concurrency: usize,
}

impl Default for ReconciliationConfig {
    fn default() -> Self {
        Self {
            page_size: 10,
            concurrency: 4,
        }
    }
}

/// Clients a run reads from.
#[derive(Clone)]
pub struct ReconciliationClients {
    pub population: Arc<dyn PopulationClient>,
    pub source_counts: Arc<dyn CountClient>,
    pub target_counts: Arc<dyn CountClient>,
    pub details: Arc<dyn DetailClient>,
}

/// Runs one kind of reconciliation report.
pub struct ReconciliationRunner {
    kind: ReconciliationKind,
    clients: ReconciliationClients,
    telemetry: Arc<dyn TelemetrySink>,
    config: ReconciliationConfig,
}

impl ReconciliationRunner {
    pub fn new(
        kind: ReconciliationKind,
        clients: ReconciliationClients,
        telemetry: Arc<dyn TelemetrySink>,
        config: ReconciliationConfig,
    ) -> Self {
        Self {
            kind,
            clients,
            telemetry,
            config,
        }
    }

    #[must_use]
    pub fn kind(&self) -> &ReconciliationKind {
        &self.kind
    }

    #[must_use]
    pub fn config(&self) -> &ReconciliationConfig {
        &self.config
    }

    /// Run a report with a fresh run id.
    pub async fn run_report(
        &self,
        scope: &ReconciliationScope,
    ) -> ReconciliationResult<ReconciliationSummary> {
        self.execute(Uuid::new_v4(), scope).await
    }

    /// Run a report under a caller-assigned run id.
    #[instrument(skip(self), fields(reconciliation = %self.kind.name(), scope = %scope))]
    pub async fn execute(
        &self,
        run_id: Uuid,
        scope: &ReconciliationScope,
    ) -> ReconciliationResult<ReconciliationSummary> {
        let started_at = Utc::now();
        let tracker = StatisticsTracker::new();

        let populations = match self.establish_population(scope).await {
            Ok(populations) => populations,
            Err(e) => {
                error!(run_id = %run_id, error = %e, "Reconciliation run failed before paging");
                self.telemetry.track(
                    TelemetryEvent::new(format!(
                        "{}-reconciliation-report-failed",
                        self.kind.name()
                    ))
                    .with("runId", run_id)
                    .with("scope", scope)
                    .with("error", &e),
                );
                return Err(e);
            }
        };

        tracker.set_total(populations.iter().map(|(_, size)| size).sum());
        info!(
            run_id = %run_id,
            partitions = populations.len(),
            keys_total = tracker.total_count(),
            "Starting reconciliation run"
        );

        let mut mismatches = Vec::new();
        for (partition, size) in &populations {
            mismatches.extend(self.reconcile_partition(partition, *size, &tracker).await);
        }
        mismatches.sort_by(|a, b| {
            (a.partition.as_str(), a.mismatch.key).cmp(&(b.partition.as_str(), b.mismatch.key))
        });

        let summary = ReconciliationSummary {
            run_id,
            reconciliation: self.kind.name().to_string(),
            scope: scope.clone(),
            partitions: populations.into_iter().map(|(partition, _)| partition).collect(),
            started_at,
            finished_at: Utc::now(),
            statistics: tracker.snapshot(),
            mismatches,
        };

        for mismatch in &summary.mismatches {
            self.telemetry
                .track(mismatch.telemetry_event(self.kind.name()));
        }
        self.telemetry.track(summary.telemetry_event());

        info!(
            run_id = %run_id,
            keys_checked = summary.statistics.keys_checked,
            mismatches = summary.mismatch_count(),
            failures = summary.failure_count(),
            page_errors = summary.statistics.page_errors,
            key_errors = summary.statistics.key_errors,
            "Reconciliation run completed"
        );

        Ok(summary)
    }

    async fn establish_population(
        &self,
        scope: &ReconciliationScope,
    ) -> ReconciliationResult<Vec<(String, u64)>> {
        if self.config.page_size == 0 {
            return Err(ReconciliationError::InvalidConfig(
                "page_size must be greater than zero".to_string(),
            ));
        }

        let partitions = match scope {
            ReconciliationScope::Partition(partition) => vec![partition.clone()],
            ReconciliationScope::AllActive => self
                .clients
                .population
                .active_partitions()
                .await
                .map_err(ReconciliationError::Partitions)?,
        };

        let mut populations = Vec::with_capacity(partitions.len());
        for partition in partitions {
            let size = self
                .clients
                .population
                .population_size(&partition)
                .await
                .map_err(|source| ReconciliationError::PopulationSize {
                    partition: partition.clone(),
                    source,
                })?;
            populations.push((partition, size));
        }
        Ok(populations)
    }

    async fn reconcile_partition(
        &self,
        partition: &str,
        size: u64,
        tracker: &StatisticsTracker,
    ) -> Vec<ReportedMismatch> {
        let page_size = self.config.page_size;
        let pages = size.div_ceil(page_size);
        let mut found = Vec::new();

        for page in 0..pages {
            let keys = match self
                .clients
                .population
                .population_page(partition, page, page_size)
                .await
            {
                Ok(keys) => keys,
                Err(e) => {
                    tracker.record_page_error();
                    warn!(partition = %partition, page, error = %e, "Failed to fetch population page");
                    self.telemetry.track(
                        TelemetryEvent::new(format!("{}-mismatch-page-error", self.kind.name()))
                            .with("partition", partition)
                            .with("page", page)
                            .with("error", &e),
                    );
                    continue;
                }
            };

            if keys.is_empty() {
                debug!(partition = %partition, page, "Population exhausted early");
                break;
            }

            found.extend(self.reconcile_page(partition, &keys, tracker).await);
        }

        found
    }

    async fn reconcile_page(
        &self,
        partition: &str,
        keys: &[ComparisonKey],
        tracker: &StatisticsTracker,
    ) -> Vec<ReportedMismatch> {
        let batch = tokio::try_join!(
            self.clients.source_counts.counts(partition, keys),
            self.clients.target_counts.counts(partition, keys)
        );

        let (source, target) = match batch {
            Ok((source, target)) => {
                tracker.increment_checked(keys.len() as u64);
                (source, target)
            }
            Err(e) => {
                debug!(partition = %partition, error = %e, "Batch count failed, falling back to per-key counts");
                self.per_key_counts(partition, keys, tracker).await
            }
        };

        let mismatches = diff(&sorted(source), &sorted(target));
        if mismatches.is_empty() {
            return Vec::new();
        }

        // Details only for mismatched keys.
        let concurrency = self.config.concurrency.max(1);
        stream::iter(mismatches)
            .map(|mismatch| self.classify(partition, mismatch, tracker))
            .buffered(concurrency)
            .collect()
            .await
    }

    async fn per_key_counts(
        &self,
        partition: &str,
        keys: &[ComparisonKey],
        tracker: &StatisticsTracker,
    ) -> (Vec<CountRecord>, Vec<CountRecord>) {
        let source_counts = &self.clients.source_counts;
        let target_counts = &self.clients.target_counts;

        let results: Vec<_> = stream::iter(keys.iter().copied())
            .map(|key| async move {
                let counts = tokio::try_join!(
                    source_counts.count(partition, key),
                    target_counts.count(partition, key)
                );
                (key, counts)
            })
            .buffer_unordered(self.config.concurrency.max(1))
            .collect()
            .await;

        let mut source = Vec::new();
        let mut target = Vec::new();
        for (key, counts) in results {
            match counts {
                Ok((source_record, target_record)) => {
                    tracker.increment_checked(1);
                    source.extend(source_record);
                    target.extend(target_record);
                }
                Err(e) => {
                    tracker.record_key_error();
                    warn!(partition = %partition, key, error = %e, "Failed to compare key");
                    self.telemetry.track(
                        TelemetryEvent::new(format!("{}-mismatch-error", self.kind.name()))
                            .with("partition", partition)
                            .with("key", key)
                            .with("error", &e),
                    );
                }
            }
        }
        (source, target)
    }

    async fn classify(
        &self,
        partition: &str,
        mut mismatch: Mismatch,
        tracker: &StatisticsTracker,
    ) -> ReportedMismatch {
        let detail = match self.clients.details.subject_detail(mismatch.key).await {
            Ok(detail) => {
                mismatch
                    .context
                    .insert("subjectRef".to_string(), detail.subject_ref.clone());
                if let Some(location) = &detail.location {
                    mismatch
                        .context
                        .insert("location".to_string(), location.clone());
                }
                Some(detail)
            }
            Err(e) => {
                warn!(partition = %partition, key = mismatch.key, error = %e, "Failed to fetch mismatch detail");
                mismatch
                    .context
                    .insert("detailError".to_string(), e.to_string());
                None
            }
        };

        let is_failure = self
            .kind
            .policy()
            .is_failure(&mismatch, detail.as_ref(), partition);
        tracker.record_mismatch(mismatch.kind, is_failure);
        if !is_failure {
            debug!(partition = %partition, key = mismatch.key, "Mismatch suppressed by policy");
        }

        ReportedMismatch {
            partition: partition.to_string(),
            mismatch,
            is_failure,
        }
    }
}

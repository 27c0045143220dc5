//! One worker's poll → claim → process → sleep loop.

use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::future::join_all;
use opentelemetry::KeyValue;
use tokio::sync::watch;
use tracing::{Instrument, error, info, warn};

use super::commit::RowUpdater;
use super::pipeline::ItemPipeline;
use crate::error::{Error, Result};
use crate::lease::LeaseManager;
use crate::model::{WorkItem, WorkerIdentity};
use crate::telemetry::metrics;
use crate::telemetry::work::{record_outcome, start_work_span};

/// When a worker stops on its own.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopMode {
    /// Exit after `max_empty_polls` consecutive polls that claimed nothing.
    Bounded { max_empty_polls: u32 },
    /// Poll until shut down.
    Continuous,
}

/// Configuration for a worker loop.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Rows claimed per poll.
    ///
    /// Leases are not renewed while a claim is processed. With
    /// `claim_limit > batch_size` the later chunks wait on the earlier ones
    /// while their leases age, so `chunks_per_claim()` times the slowest
    /// item must stay well under the lease TTL or those items can be
    /// reclaimed and generated twice.
    pub claim_limit: usize,
    /// Items processed concurrently; a larger claim is processed in chunks.
    pub batch_size: usize,
    /// Sleep after a poll that claimed nothing.
    pub empty_delay: Duration,
    /// Sleep after a processed batch.
    pub inter_batch_delay: Duration,
    /// Sleep after a failed poll cycle.
    pub error_backoff: Duration,
    pub mode: LoopMode,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            claim_limit: 4,
            batch_size: 4,
            empty_delay: Duration::from_secs(5),
            inter_batch_delay: Duration::from_millis(500),
            error_backoff: Duration::from_secs(10),
            mode: LoopMode::Continuous,
        }
    }
}

impl WorkerConfig {
    /// Sequential chunks a full claim is split into.
    pub fn chunks_per_claim(&self) -> usize {
        self.claim_limit.div_ceil(self.batch_size.max(1))
    }
}

/// How one claimed item ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemOutcome {
    /// Result committed.
    Succeeded,
    /// Failure committed.
    Failed,
    /// The commit itself failed; the lease was released or left for TTL.
    Uncommitted,
}

/// Counts for one poll cycle.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchReport {
    pub claimed: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub uncommitted: usize,
}

impl BatchReport {
    fn record(&mut self, outcome: ItemOutcome) {
        match outcome {
            ItemOutcome::Succeeded => self.succeeded += 1,
            ItemOutcome::Failed => self.failed += 1,
            ItemOutcome::Uncommitted => self.uncommitted += 1,
        }
    }
}

/// Totals for one worker's whole run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerSummary {
    pub identity: WorkerIdentity,
    pub polls: u64,
    pub empty_polls: u64,
    pub succeeded: u64,
    pub failed: u64,
    pub uncommitted: u64,
    /// Poll cycles that failed at the infrastructure level.
    pub errors: u64,
}

impl WorkerSummary {
    fn new(identity: WorkerIdentity) -> Self {
        Self {
            identity,
            polls: 0,
            empty_polls: 0,
            succeeded: 0,
            failed: 0,
            uncommitted: 0,
            errors: 0,
        }
    }

    fn add(&mut self, report: &BatchReport) {
        self.succeeded += report.succeeded as u64;
        self.failed += report.failed as u64;
        self.uncommitted += report.uncommitted as u64;
    }
}

/// A single worker. Shares nothing in-process with other workers except the
/// read-only pipeline; all coordination happens through the lease store.
pub struct WorkerLoop {
    lease: LeaseManager,
    updater: RowUpdater,
    pipeline: Arc<ItemPipeline>,
    config: WorkerConfig,
    shutdown: watch::Receiver<bool>,
}

impl WorkerLoop {
    pub fn new(lease: LeaseManager, pipeline: Arc<ItemPipeline>, config: WorkerConfig) -> Self {
        // No sender: this loop only stops through its lifecycle mode unless
        // `with_shutdown` installs a real signal.
        let (_, shutdown) = watch::channel(false);
        Self {
            updater: RowUpdater::new(Arc::clone(lease.store())),
            lease,
            pipeline,
            config,
            shutdown,
        }
    }

    /// Stop taking new claims once `shutdown` turns true.
    pub fn with_shutdown(mut self, shutdown: watch::Receiver<bool>) -> Self {
        self.shutdown = shutdown;
        self
    }

    pub fn identity(&self) -> &WorkerIdentity {
        self.lease.owner()
    }

    /// Run until the lifecycle mode says stop or shutdown is signalled.
    pub async fn run(mut self) -> WorkerSummary {
        let worker = self.identity().clone();
        let mut summary = WorkerSummary::new(worker.clone());
        let mut consecutive_empty: u32 = 0;

        info!(%worker, mode = ?self.config.mode, "worker started");
        let chunks = self.config.chunks_per_claim();
        if chunks > 1 {
            warn!(
                %worker,
                chunks,
                claim_limit = self.config.claim_limit,
                batch_size = self.config.batch_size,
                "claims span several chunks; later chunks' leases age unrenewed"
            );
        }

        while !self.stopping() {
            summary.polls += 1;

            let pause = match self.run_once().await {
                Ok(report) if report.claimed == 0 => {
                    summary.empty_polls += 1;
                    consecutive_empty = consecutive_empty.saturating_add(1);
                    if let LoopMode::Bounded { max_empty_polls } = self.config.mode
                        && consecutive_empty >= max_empty_polls
                    {
                        info!(%worker, consecutive_empty, "queue drained, worker exiting");
                        break;
                    }
                    self.config.empty_delay
                }
                Ok(report) => {
                    consecutive_empty = 0;
                    summary.add(&report);
                    info!(
                        %worker,
                        claimed = report.claimed,
                        succeeded = report.succeeded,
                        failed = report.failed,
                        uncommitted = report.uncommitted,
                        "batch processed"
                    );
                    self.config.inter_batch_delay
                }
                Err(e) => {
                    summary.errors += 1;
                    error!(
                        %worker,
                        error = %e,
                        backoff_ms = self.config.error_backoff.as_millis() as u64,
                        "poll cycle failed, backing off"
                    );
                    self.config.error_backoff
                }
            };

            if !self.pause(pause).await {
                break;
            }
        }

        info!(
            %worker,
            polls = summary.polls,
            succeeded = summary.succeeded,
            failed = summary.failed,
            "worker stopped"
        );
        summary
    }

    /// One poll cycle: claim, then process every claimed item.
    ///
    /// Only a failed claim is an error here; per-item failures are committed
    /// and counted in the report.
    pub async fn run_once(&self) -> Result<BatchReport> {
        let batch = self.lease.claim(self.config.claim_limit).await?;

        let mut report = BatchReport {
            claimed: batch.len(),
            ..BatchReport::default()
        };

        for chunk in batch.chunks(self.config.batch_size.max(1)) {
            let outcomes = join_all(chunk.iter().map(|item| self.process_item(item))).await;
            for outcome in outcomes {
                report.record(outcome);
            }
        }

        Ok(report)
    }

    async fn process_item(&self, item: &WorkItem) -> ItemOutcome {
        let span = start_work_span(self.identity(), item.id);

        async {
            let start = Instant::now();
            let outcome = match self.pipeline.run(item).await {
                Ok(result) => match self.updater.commit_success(item, &result).await {
                    Ok(()) => ItemOutcome::Succeeded,
                    Err(e) => self.commit_failed(item, &e).await,
                },
                Err(e) => {
                    warn!(work_id = %item.id, error = %e, "work item failed");
                    match self.updater.commit_failure(item, &e.to_string()).await {
                        Ok(()) => ItemOutcome::Failed,
                        Err(e) => self.commit_failed(item, &e).await,
                    }
                }
            };

            metrics::operation_duration_ms().record(
                start.elapsed().as_millis() as f64,
                &[KeyValue::new("operation", "work.execute")],
            );
            record_outcome(&span, outcome_label(outcome));
            outcome
        }
        .instrument(span.clone())
        .await
    }

    /// The store rejected a commit. Hand the lease back so another poll can
    /// retry the item without waiting out the TTL.
    async fn commit_failed(&self, item: &WorkItem, e: &Error) -> ItemOutcome {
        error!(
            work_id = %item.id,
            error = %e,
            persistence = e.is_persistence(),
            "commit failed, releasing lease"
        );
        self.lease.release_all(&[item.id]).await;
        ItemOutcome::Uncommitted
    }

    fn stopping(&self) -> bool {
        *self.shutdown.borrow()
    }

    /// Sleep for `duration` or until shutdown. Returns false when stopping.
    async fn pause(&mut self, duration: Duration) -> bool {
        tokio::select! {
            _ = tokio::time::sleep(duration) => {}
            Ok(()) = self.shutdown.changed() => {}
        }
        !self.stopping()
    }
}

fn outcome_label(outcome: ItemOutcome) -> &'static str {
    match outcome {
        ItemOutcome::Succeeded => "done",
        ItemOutcome::Failed => "failed",
        ItemOutcome::Uncommitted => "uncommitted",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(claim_limit: usize, batch_size: usize) -> WorkerConfig {
        WorkerConfig {
            claim_limit,
            batch_size,
            ..WorkerConfig::default()
        }
    }

    #[test]
    fn chunks_per_claim_rounds_up() {
        assert_eq!(config(4, 4).chunks_per_claim(), 1);
        assert_eq!(config(10, 3).chunks_per_claim(), 4);
        assert_eq!(config(2, 8).chunks_per_claim(), 1);
    }

    #[test]
    fn zero_batch_size_is_treated_as_one() {
        assert_eq!(config(5, 0).chunks_per_claim(), 5);
    }
}

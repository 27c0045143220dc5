//! Fixed-size pool of independent worker loops.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{error, info};

use super::pipeline::ItemPipeline;
use super::runner::{WorkerConfig, WorkerLoop, WorkerSummary};
use crate::lease::{LeaseManager, LeaseStore};
use crate::model::WorkerIdentity;

/// Signals every worker of a pool to stop taking new claims.
#[derive(Clone)]
pub struct ShutdownHandle(Arc<watch::Sender<bool>>);

impl ShutdownHandle {
    pub fn shutdown(&self) {
        // send_replace stores the value even if every worker already exited.
        self.0.send_replace(true);
    }
}

/// Aggregate of a finished pool run.
#[derive(Debug, Clone, Default)]
pub struct PoolSummary {
    pub workers: Vec<WorkerSummary>,
    /// Workers whose task panicked. Their siblings ran to completion.
    pub crashed: usize,
}

impl PoolSummary {
    pub fn succeeded(&self) -> u64 {
        self.workers.iter().map(|w| w.succeeded).sum()
    }

    pub fn failed(&self) -> u64 {
        self.workers.iter().map(|w| w.failed).sum()
    }

    pub fn uncommitted(&self) -> u64 {
        self.workers.iter().map(|w| w.uncommitted).sum()
    }

    pub fn polls(&self) -> u64 {
        self.workers.iter().map(|w| w.polls).sum()
    }
}

/// Launches `n` worker loops, each with its own identity, against one store.
pub struct WorkerPool {
    store: Arc<dyn LeaseStore>,
    pipeline: Arc<ItemPipeline>,
    config: WorkerConfig,
    lease_ttl: Duration,
    base_id: Option<String>,
    shutdown: Arc<watch::Sender<bool>>,
}

impl WorkerPool {
    pub fn new(
        store: Arc<dyn LeaseStore>,
        pipeline: Arc<ItemPipeline>,
        config: WorkerConfig,
        lease_ttl: Duration,
    ) -> Self {
        let (shutdown, _) = watch::channel(false);
        Self {
            store,
            pipeline,
            config,
            lease_ttl,
            base_id: None,
            shutdown: Arc::new(shutdown),
        }
    }

    /// Derive worker identities as `{base_id}-{index}` instead of generating them.
    pub fn base_id(mut self, base_id: impl Into<String>) -> Self {
        self.base_id = Some(base_id.into());
        self
    }

    pub fn shutdown_handle(&self) -> ShutdownHandle {
        ShutdownHandle(Arc::clone(&self.shutdown))
    }

    fn identity(&self, index: usize) -> WorkerIdentity {
        match self.base_id {
            Some(ref base) => WorkerIdentity::new(format!("{base}-{index}")),
            None => WorkerIdentity::generate("worker"),
        }
    }

    /// Run `worker_count` workers to completion and aggregate their summaries.
    ///
    /// In continuous mode this returns only after a shutdown signal.
    pub async fn run(&self, worker_count: usize) -> PoolSummary {
        let mut joins: Vec<(WorkerIdentity, JoinHandle<WorkerSummary>)> =
            Vec::with_capacity(worker_count);

        for index in 0..worker_count {
            let identity = self.identity(index);
            let lease = LeaseManager::new(Arc::clone(&self.store), identity.clone(), self.lease_ttl);
            let worker = WorkerLoop::new(lease, Arc::clone(&self.pipeline), self.config.clone())
                .with_shutdown(self.shutdown.subscribe());
            joins.push((identity, tokio::spawn(worker.run())));
        }

        info!(workers = worker_count, "worker pool started");

        let mut summary = PoolSummary::default();
        for (identity, join) in joins {
            match join.await {
                Ok(worker) => summary.workers.push(worker),
                Err(e) => {
                    error!(worker = %identity, error = %e, "worker task crashed");
                    summary.crashed += 1;
                }
            }
        }

        info!(
            succeeded = summary.succeeded(),
            failed = summary.failed(),
            uncommitted = summary.uncommitted(),
            crashed = summary.crashed,
            "worker pool finished"
        );
        summary
    }
}

//! Test doubles shared by the integration tests.

#![allow(dead_code)]

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use leasegen::error::{Error, Result};
use leasegen::lease::{LeaseStore, MemoryStore};
use leasegen::llm::{
    GenerationInvoker, GenerationProvider, GenerationRequest, PromptTemplate, ProviderError,
    RetryPolicy,
};
use leasegen::model::{WorkId, WorkItem, WorkerIdentity};
use leasegen::worker::{ItemPipeline, LoopMode, WorkerConfig};

type Responder = dyn Fn(&GenerationRequest) -> std::result::Result<String, ProviderError> + Send + Sync;

/// Provider whose reply is computed from the request. Counts calls.
pub struct ScriptedProvider {
    respond: Box<Responder>,
    calls: AtomicUsize,
}

impl ScriptedProvider {
    pub fn new<F>(respond: F) -> Arc<Self>
    where
        F: Fn(&GenerationRequest) -> std::result::Result<String, ProviderError> + Send + Sync + 'static,
    {
        Arc::new(Self {
            respond: Box::new(respond),
            calls: AtomicUsize::new(0),
        })
    }

    /// Always reply with `text`.
    pub fn always(text: &str) -> Arc<Self> {
        let text = text.to_string();
        Self::new(move |_| Ok(text.clone()))
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl GenerationProvider for ScriptedProvider {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn generate(
        &self,
        request: &GenerationRequest,
    ) -> std::result::Result<String, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        (self.respond)(request)
    }
}

/// Template that makes the prompt exactly the payload text.
pub fn echo_template() -> PromptTemplate {
    PromptTemplate {
        system: None,
        template: "{payload}".to_string(),
    }
}

pub fn fast_retry() -> RetryPolicy {
    RetryPolicy {
        max_attempts: 3,
        base_delay: Duration::from_millis(1),
    }
}

pub fn pipeline(provider: Arc<ScriptedProvider>) -> Arc<ItemPipeline> {
    let invoker = GenerationInvoker::new(provider, fast_retry());
    Arc::new(ItemPipeline::new(invoker, "test-model").template(echo_template()))
}

pub fn fast_config(mode: LoopMode) -> WorkerConfig {
    WorkerConfig {
        claim_limit: 4,
        batch_size: 4,
        empty_delay: Duration::from_millis(5),
        inter_batch_delay: Duration::from_millis(1),
        error_backoff: Duration::from_millis(5),
        mode,
    }
}

pub const QA_FENCED: &str = "```json\n{\"Question\":\"Q\",\"Answer\":\"A\"}\n```";

/// Wraps a [`MemoryStore`], counting polls and optionally failing some
/// operations.
pub struct InstrumentedStore {
    pub inner: Arc<MemoryStore>,
    selects: AtomicUsize,
    failing_selects: AtomicUsize,
    fail_commits: bool,
}

impl InstrumentedStore {
    pub fn new(inner: Arc<MemoryStore>) -> Self {
        Self {
            inner,
            selects: AtomicUsize::new(0),
            failing_selects: AtomicUsize::new(0),
            fail_commits: false,
        }
    }

    /// The next `n` selects fail as if the store were unreachable.
    pub fn fail_next_selects(self, n: usize) -> Self {
        self.failing_selects.store(n, Ordering::SeqCst);
        self
    }

    pub fn fail_commits(mut self) -> Self {
        self.fail_commits = true;
        self
    }

    pub fn selects(&self) -> usize {
        self.selects.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl LeaseStore for InstrumentedStore {
    async fn clear_stale_leases(&self, cutoff: DateTime<Utc>) -> Result<u64> {
        self.inner.clear_stale_leases(cutoff).await
    }

    async fn select_claimable(&self, limit: usize) -> Result<Vec<WorkId>> {
        self.selects.fetch_add(1, Ordering::SeqCst);
        let remaining = self.failing_selects.load(Ordering::SeqCst);
        if remaining > 0 {
            self.failing_selects.store(remaining - 1, Ordering::SeqCst);
            return Err(Error::Store("connection refused".into()));
        }
        self.inner.select_claimable(limit).await
    }

    async fn acquire_leases(
        &self,
        ids: &[WorkId],
        owner: &WorkerIdentity,
        acquired_at: DateTime<Utc>,
    ) -> Result<Vec<WorkItem>> {
        self.inner.acquire_leases(ids, owner, acquired_at).await
    }

    async fn commit_success(&self, id: WorkId, result: &serde_json::Value) -> Result<()> {
        if self.fail_commits {
            return Err(Error::Store("write rejected".into()));
        }
        self.inner.commit_success(id, result).await
    }

    async fn commit_failure(&self, id: WorkId, error: &str) -> Result<()> {
        if self.fail_commits {
            return Err(Error::Store("write rejected".into()));
        }
        self.inner.commit_failure(id, error).await
    }

    async fn release_leases(&self, ids: &[WorkId], owner: &WorkerIdentity) -> Result<u64> {
        self.inner.release_leases(ids, owner).await
    }
}

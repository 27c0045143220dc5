//! The minimal store capability the leasing core depends on.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::Result;
use crate::model::{WorkId, WorkItem, WorkerIdentity};

/// Shared persistent store holding leasable work items.
///
/// Every method is a single atomic operation against the store. Workers share
/// nothing else, so these are the only coordination points between them.
#[async_trait]
pub trait LeaseStore: Send + Sync {
    /// Clear lease fields on every item leased before `cutoff` that still has
    /// no result. Returns how many rows were cleared.
    async fn clear_stale_leases(&self, cutoff: DateTime<Utc>) -> Result<u64>;

    /// Up to `limit` ids with no result, no lease and pending status,
    /// ascending.
    async fn select_claimable(&self, limit: usize) -> Result<Vec<WorkId>>;

    /// Set the lease on those of `ids` that are still claimable at update
    /// time. The returned rows are the ones actually updated; the caller owns
    /// exactly those and nothing else.
    async fn acquire_leases(
        &self,
        ids: &[WorkId],
        owner: &WorkerIdentity,
        acquired_at: DateTime<Utc>,
    ) -> Result<Vec<WorkItem>>;

    /// Store the result, mark done, clear the lease.
    async fn commit_success(&self, id: WorkId, result: &serde_json::Value) -> Result<()>;

    /// Mark failed with `error`, clear the lease. A no-op when the item
    /// already has a result; `NotFound` only when the id does not exist.
    async fn commit_failure(&self, id: WorkId, error: &str) -> Result<()>;

    /// Clear leases on `ids` still held by `owner`. Returns rows cleared.
    async fn release_leases(&self, ids: &[WorkId], owner: &WorkerIdentity) -> Result<u64>;
}

//! Lease acquisition, stale-lease reclamation, and compensating release.
//!
//! The store's lease fields act as a distributed mutex with TTL-based
//! failure recovery. A claim is a single conditional update whose affected
//! rows are authoritative; a prior select is only a candidate list.

pub mod memory;
pub mod store;

pub use memory::MemoryStore;
pub use store::LeaseStore;

use std::sync::Arc;
use std::time::Duration;

use chrono::{TimeDelta, Utc};
use tracing::{debug, warn};

use crate::error::Result;
use crate::model::{Batch, WorkId, WorkerIdentity};
use crate::telemetry::metrics;

/// Claims and releases leases on behalf of one worker identity.
#[derive(Clone)]
pub struct LeaseManager {
    store: Arc<dyn LeaseStore>,
    owner: WorkerIdentity,
    ttl: Duration,
}

impl LeaseManager {
    pub fn new(store: Arc<dyn LeaseStore>, owner: WorkerIdentity, ttl: Duration) -> Self {
        Self { store, owner, ttl }
    }

    pub fn owner(&self) -> &WorkerIdentity {
        &self.owner
    }

    pub fn store(&self) -> &Arc<dyn LeaseStore> {
        &self.store
    }

    /// Clear every lease older than the TTL on items that still have no result.
    ///
    /// Safe to run from any number of workers at once; clearing an already
    /// clear lease is a no-op.
    pub async fn reclaim_stale(&self) -> Result<u64> {
        let ttl = TimeDelta::from_std(self.ttl).unwrap_or(TimeDelta::MAX);
        let cutoff = Utc::now()
            .checked_sub_signed(ttl)
            .unwrap_or(chrono::DateTime::<Utc>::MIN_UTC);
        let cleared = self.store.clear_stale_leases(cutoff).await?;
        if cleared > 0 {
            warn!(worker = %self.owner, cleared, "reclaimed stale leases");
            metrics::leases_reclaimed().add(cleared, &[]);
        }
        Ok(cleared)
    }

    /// Claim up to `limit` eligible items, lowest ids first.
    ///
    /// Returns only the rows this worker actually leased. A short batch means
    /// another worker won some of the candidates; that is not an error.
    pub async fn claim(&self, limit: usize) -> Result<Batch> {
        if limit == 0 {
            return Ok(Vec::new());
        }

        self.reclaim_stale().await?;

        let candidates = self.store.select_claimable(limit).await?;
        if candidates.is_empty() {
            return Ok(Vec::new());
        }

        let claimed = self
            .store
            .acquire_leases(&candidates, &self.owner, Utc::now())
            .await?;

        let lost = candidates.len().saturating_sub(claimed.len());
        if lost > 0 {
            debug!(worker = %self.owner, lost, "lost claim race");
            metrics::lease_races_lost().add(lost as u64, &[]);
        }
        metrics::leases_claimed().add(claimed.len() as u64, &[]);

        Ok(claimed)
    }

    /// Best-effort release of leases this worker still holds on `ids`.
    ///
    /// Used after a commit failed so the items don't wait out a full TTL.
    /// Failures are logged only; TTL reclamation remains the safety net.
    pub async fn release_all(&self, ids: &[WorkId]) -> u64 {
        if ids.is_empty() {
            return 0;
        }
        match self.store.release_leases(ids, &self.owner).await {
            Ok(released) => {
                debug!(worker = %self.owner, released, "released leases");
                released
            }
            Err(e) => {
                warn!(worker = %self.owner, error = %e, "lease release failed, leaving for TTL");
                0
            }
        }
    }
}

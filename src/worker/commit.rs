//! Terminal commits. Each writes the outcome and clears the lease in one
//! store update.

use std::sync::Arc;

use opentelemetry::KeyValue;

use crate::error::Result;
use crate::lease::LeaseStore;
use crate::model::WorkItem;
use crate::telemetry::metrics;

/// Applies terminal results to leased rows.
///
/// Failures are terminal: the item is marked failed with the error recorded
/// and stays out of the claim pool until an operator requeues it.
#[derive(Clone)]
pub struct RowUpdater {
    store: Arc<dyn LeaseStore>,
}

impl RowUpdater {
    pub fn new(store: Arc<dyn LeaseStore>) -> Self {
        Self { store }
    }

    /// Store `result`, mark done, release the lease.
    pub async fn commit_success(&self, item: &WorkItem, result: &serde_json::Value) -> Result<()> {
        self.store.commit_success(item.id, result).await?;
        metrics::work_committed().add(1, &[KeyValue::new("status", "done")]);
        Ok(())
    }

    /// Mark failed with `message`, release the lease.
    pub async fn commit_failure(&self, item: &WorkItem, message: &str) -> Result<()> {
        self.store.commit_failure(item.id, message).await?;
        metrics::work_committed().add(1, &[KeyValue::new("status", "failed")]);
        Ok(())
    }
}

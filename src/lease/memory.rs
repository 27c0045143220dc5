//! In-process lease store.
//!
//! Holds all rows behind one mutex, so every trait method is trivially atomic.
//! Used for tests and local dry runs.

use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::Mutex;

use super::LeaseStore;
use crate::error::{Error, Result};
use crate::model::{Lease, Status, WorkId, WorkItem, WorkerIdentity};

struct MemoryState {
    rows: BTreeMap<WorkId, WorkItem>,
    next_id: i64,
}

/// Lease store backed by an ordered in-memory map.
pub struct MemoryStore {
    state: Mutex<MemoryState>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(MemoryState {
                rows: BTreeMap::new(),
                next_id: 1,
            }),
        }
    }

    /// Insert a pending item and return its id. Ids are assigned ascending.
    pub async fn insert(&self, payload: serde_json::Value) -> WorkId {
        let mut state = self.state.lock().await;
        let id = WorkId(state.next_id);
        state.next_id += 1;
        let now = Utc::now();
        state.rows.insert(
            id,
            WorkItem {
                id,
                payload,
                result: None,
                lease: None,
                status: Status::Pending,
                error: None,
                created_at: now,
                updated_at: now,
            },
        );
        id
    }

    /// Insert an item exactly as given, keeping its id.
    pub async fn insert_item(&self, item: WorkItem) {
        let mut state = self.state.lock().await;
        state.next_id = state.next_id.max(item.id.0 + 1);
        state.rows.insert(item.id, item);
    }

    pub async fn get(&self, id: WorkId) -> Result<WorkItem> {
        self.state
            .lock()
            .await
            .rows
            .get(&id)
            .cloned()
            .ok_or_else(|| Error::NotFound(format!("work item {id}")))
    }

    /// All rows, ascending by id.
    pub async fn snapshot(&self) -> Vec<WorkItem> {
        self.state.lock().await.rows.values().cloned().collect()
    }

    async fn update<F>(&self, id: WorkId, f: F) -> Result<()>
    where
        F: FnOnce(&mut WorkItem),
    {
        let mut state = self.state.lock().await;
        let row = state
            .rows
            .get_mut(&id)
            .ok_or_else(|| Error::NotFound(format!("work item {id}")))?;
        f(row);
        row.updated_at = Utc::now();
        Ok(())
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl LeaseStore for MemoryStore {
    async fn clear_stale_leases(&self, cutoff: DateTime<Utc>) -> Result<u64> {
        let mut state = self.state.lock().await;
        let mut cleared = 0;
        for row in state.rows.values_mut() {
            let stale = row
                .lease
                .as_ref()
                .is_some_and(|lease| lease.acquired_at < cutoff);
            if stale && row.result.is_none() {
                row.lease = None;
                cleared += 1;
            }
        }
        Ok(cleared)
    }

    async fn select_claimable(&self, limit: usize) -> Result<Vec<WorkId>> {
        let state = self.state.lock().await;
        Ok(state
            .rows
            .values()
            .filter(|row| row.is_claimable())
            .take(limit)
            .map(|row| row.id)
            .collect())
    }

    async fn acquire_leases(
        &self,
        ids: &[WorkId],
        owner: &WorkerIdentity,
        acquired_at: DateTime<Utc>,
    ) -> Result<Vec<WorkItem>> {
        let mut state = self.state.lock().await;
        let mut acquired = Vec::with_capacity(ids.len());
        for id in ids {
            if let Some(row) = state.rows.get_mut(id)
                && row.is_claimable()
            {
                row.lease = Some(Lease {
                    owner: owner.clone(),
                    acquired_at,
                });
                row.updated_at = acquired_at;
                acquired.push(row.clone());
            }
        }
        acquired.sort_by_key(|row| row.id);
        Ok(acquired)
    }

    async fn commit_success(&self, id: WorkId, result: &serde_json::Value) -> Result<()> {
        self.update(id, |row| {
            row.result = Some(result.clone());
            row.status = Status::Done;
            row.error = None;
            row.lease = None;
        })
        .await
    }

    async fn commit_failure(&self, id: WorkId, error: &str) -> Result<()> {
        let mut state = self.state.lock().await;
        let row = state
            .rows
            .get_mut(&id)
            .ok_or_else(|| Error::NotFound(format!("work item {id}")))?;
        if row.result.is_some() {
            return Ok(());
        }
        row.status = Status::Failed;
        row.error = Some(error.to_string());
        row.lease = None;
        row.updated_at = Utc::now();
        Ok(())
    }

    async fn release_leases(&self, ids: &[WorkId], owner: &WorkerIdentity) -> Result<u64> {
        let mut state = self.state.lock().await;
        let mut released = 0;
        for id in ids {
            if let Some(row) = state.rows.get_mut(id)
                && row.lease.as_ref().is_some_and(|lease| &lease.owner == owner)
            {
                row.lease = None;
                released += 1;
            }
        }
        Ok(released)
    }
}

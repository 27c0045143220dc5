//! Postgres implementation of [`LeaseStore`].
//!
//! Every operation is one statement. The claim relies on Postgres re-checking
//! the `WHERE` clause of a concurrent `UPDATE` against the committed row, so
//! two workers racing for the same id cannot both see it as unleased.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::Db;
use crate::error::{Error, Result};
use crate::lease::LeaseStore;
use crate::model::{Lease, WorkId, WorkItem, WorkerIdentity};

#[async_trait]
impl LeaseStore for Db {
    async fn clear_stale_leases(&self, cutoff: DateTime<Utc>) -> Result<u64> {
        let t = &self.table;
        let sql = format!(
            "UPDATE {table} SET {owner} = NULL, {at} = NULL, {updated} = now()
             WHERE {at} IS NOT NULL AND {at} < $1 AND {result} IS NULL",
            table = t.table,
            owner = t.lease_owner,
            at = t.lease_at,
            updated = t.updated_at,
            result = t.result,
        );
        let cleared = sqlx::query(&sql)
            .bind(cutoff)
            .execute(&self.pool)
            .await?
            .rows_affected();
        Ok(cleared)
    }

    async fn select_claimable(&self, limit: usize) -> Result<Vec<WorkId>> {
        let t = &self.table;
        let sql = format!(
            "SELECT {id} FROM {table}
             WHERE {result} IS NULL AND {owner} IS NULL AND {status} = 'pending'
             ORDER BY {id} ASC
             LIMIT $1",
            id = t.id,
            table = t.table,
            result = t.result,
            owner = t.lease_owner,
            status = t.status,
        );
        let rows: Vec<(i64,)> = sqlx::query_as(&sql)
            .bind(limit as i64)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.into_iter().map(|(id,)| WorkId(id)).collect())
    }

    async fn acquire_leases(
        &self,
        ids: &[WorkId],
        owner: &WorkerIdentity,
        acquired_at: DateTime<Utc>,
    ) -> Result<Vec<WorkItem>> {
        let t = &self.table;
        let sql = format!(
            "UPDATE {table} SET {owner} = $1, {at} = $2, {updated} = $2
             WHERE {id} = ANY($3) AND {owner} IS NULL AND {result} IS NULL AND {status} = 'pending'
             RETURNING {columns}",
            table = t.table,
            owner = t.lease_owner,
            at = t.lease_at,
            updated = t.updated_at,
            id = t.id,
            result = t.result,
            status = t.status,
            columns = t.select_list(),
        );
        let raw_ids: Vec<i64> = ids.iter().map(|id| id.0).collect();
        let rows: Vec<WorkItemRow> = sqlx::query_as(&sql)
            .bind(owner.as_str())
            .bind(acquired_at)
            .bind(raw_ids)
            .fetch_all(&self.pool)
            .await?;

        // RETURNING order is unspecified.
        let mut items = rows
            .into_iter()
            .map(WorkItemRow::try_into_work_item)
            .collect::<Result<Vec<_>>>()?;
        items.sort_by_key(|item| item.id);
        Ok(items)
    }

    async fn commit_success(&self, id: WorkId, result: &serde_json::Value) -> Result<()> {
        let t = &self.table;
        let sql = format!(
            "UPDATE {table} SET {result} = $1, {status} = 'done', {error} = NULL,
                 {owner} = NULL, {at} = NULL, {updated} = now()
             WHERE {id} = $2",
            table = t.table,
            result = t.result,
            status = t.status,
            error = t.error,
            owner = t.lease_owner,
            at = t.lease_at,
            updated = t.updated_at,
            id = t.id,
        );
        let rows_affected = sqlx::query(&sql)
            .bind(result)
            .bind(id.0)
            .execute(&self.pool)
            .await?
            .rows_affected();
        ensure_found(rows_affected, id)
    }

    async fn commit_failure(&self, id: WorkId, error: &str) -> Result<()> {
        let t = &self.table;
        let sql = format!(
            "UPDATE {table} SET {status} = 'failed', {error} = $1,
                 {owner} = NULL, {at} = NULL, {updated} = now()
             WHERE {id} = $2 AND {result} IS NULL",
            table = t.table,
            status = t.status,
            error = t.error,
            owner = t.lease_owner,
            at = t.lease_at,
            updated = t.updated_at,
            id = t.id,
            result = t.result,
        );
        let rows_affected = sqlx::query(&sql)
            .bind(error)
            .bind(id.0)
            .execute(&self.pool)
            .await?
            .rows_affected();
        if rows_affected > 0 {
            return Ok(());
        }

        // Another worker already committed a result; a late failure is dropped.
        let exists = format!(
            "SELECT 1 FROM {table} WHERE {id} = $1",
            table = t.table,
            id = t.id,
        );
        let found: Option<(i32,)> = sqlx::query_as(&exists)
            .bind(id.0)
            .fetch_optional(&self.pool)
            .await?;
        ensure_found(found.map_or(0, |_| 1), id)
    }

    async fn release_leases(&self, ids: &[WorkId], owner: &WorkerIdentity) -> Result<u64> {
        let t = &self.table;
        let sql = format!(
            "UPDATE {table} SET {owner} = NULL, {at} = NULL, {updated} = now()
             WHERE {id} = ANY($1) AND {owner} = $2",
            table = t.table,
            owner = t.lease_owner,
            at = t.lease_at,
            updated = t.updated_at,
            id = t.id,
        );
        let raw_ids: Vec<i64> = ids.iter().map(|id| id.0).collect();
        let released = sqlx::query(&sql)
            .bind(raw_ids)
            .bind(owner.as_str())
            .execute(&self.pool)
            .await?
            .rows_affected();
        Ok(released)
    }
}

fn ensure_found(rows_affected: u64, id: WorkId) -> Result<()> {
    if rows_affected == 0 {
        return Err(Error::NotFound(format!("work item {id}")));
    }
    Ok(())
}

/// Internal row type for sqlx::FromRow. Columns arrive aliased to these
/// names via [`LeaseTable::select_list`](super::LeaseTable).
#[derive(sqlx::FromRow)]
pub(crate) struct WorkItemRow {
    id: i64,
    payload: serde_json::Value,
    result: Option<serde_json::Value>,
    lease_owner: Option<String>,
    lease_at: Option<DateTime<Utc>>,
    status: String,
    error: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl WorkItemRow {
    pub(crate) fn try_into_work_item(self) -> Result<WorkItem> {
        // A half-set lease (owner without timestamp or vice versa) is treated
        // as no lease.
        let lease = match (self.lease_owner, self.lease_at) {
            (Some(owner), Some(acquired_at)) => Some(Lease {
                owner: WorkerIdentity::new(owner),
                acquired_at,
            }),
            _ => None,
        };

        Ok(WorkItem {
            id: WorkId(self.id),
            payload: self.payload,
            result: self.result,
            lease,
            status: self.status.parse()?,
            error: self.error,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

//! Operator-side work item operations: submit, inspect, requeue.

use super::lease::WorkItemRow;
use crate::error::{Error, Result};
use crate::model::{Status, WorkId, WorkItem};

impl super::Db {
    /// Insert a new pending work item.
    pub async fn submit_work(&self, payload: serde_json::Value) -> Result<WorkItem> {
        let t = &self.table;
        let sql = format!(
            "INSERT INTO {table} ({payload}, {status}) VALUES ($1, 'pending') RETURNING {columns}",
            table = t.table,
            payload = t.payload,
            status = t.status,
            columns = t.select_list(),
        );
        let row: WorkItemRow = sqlx::query_as(&sql)
            .bind(&payload)
            .fetch_one(&self.pool)
            .await?;
        row.try_into_work_item()
    }

    /// Get a work item by ID.
    pub async fn get_work_item(&self, id: WorkId) -> Result<WorkItem> {
        let t = &self.table;
        let sql = format!(
            "SELECT {columns} FROM {table} WHERE {id} = $1",
            columns = t.select_list(),
            table = t.table,
            id = t.id,
        );
        let row: Option<WorkItemRow> = sqlx::query_as(&sql)
            .bind(id.0)
            .fetch_optional(&self.pool)
            .await?;

        row.ok_or_else(|| Error::NotFound(format!("work item {id}")))?
            .try_into_work_item()
    }

    /// List work items, optionally filtered by status, ascending by id.
    pub async fn list_work_items(&self, status: Option<Status>, limit: i64) -> Result<Vec<WorkItem>> {
        let t = &self.table;
        let sql = format!(
            "SELECT {columns} FROM {table}
             WHERE ($1::text IS NULL OR {status} = $1)
             ORDER BY {id} ASC
             LIMIT $2",
            columns = t.select_list(),
            table = t.table,
            status = t.status,
            id = t.id,
        );
        let rows: Vec<WorkItemRow> = sqlx::query_as(&sql)
            .bind(status.map(Status::as_str))
            .bind(limit)
            .fetch_all(&self.pool)
            .await?;

        rows.into_iter()
            .map(WorkItemRow::try_into_work_item)
            .collect()
    }

    /// Return a failed item to the queue: failed → pending, error cleared.
    pub async fn requeue_failed(&self, id: WorkId) -> Result<WorkItem> {
        let t = &self.table;
        let sql = format!(
            "UPDATE {table} SET {status} = 'pending', {error} = NULL, {updated} = now()
             WHERE {id} = $1 AND {status} = 'failed' AND {result} IS NULL",
            table = t.table,
            status = t.status,
            error = t.error,
            updated = t.updated_at,
            id = t.id,
            result = t.result,
        );
        let rows_affected = sqlx::query(&sql)
            .bind(id.0)
            .execute(&self.pool)
            .await?
            .rows_affected();

        if rows_affected == 0 {
            let item = self.get_work_item(id).await?;
            return Err(Error::Other(format!(
                "work item {id} is {}, only failed items can be requeued",
                item.status
            )));
        }

        self.get_work_item(id).await
    }
}

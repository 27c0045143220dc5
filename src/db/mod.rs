//! Database connection pool, migrations, and health check.
//!
//! [`Db`] is the Postgres [`LeaseStore`](crate::lease::LeaseStore). Which
//! table and columns it leases is described by a [`LeaseTable`], so one
//! implementation serves any table that carries the lease columns.

pub mod lease;
pub mod work;

use crate::error::{Error, Result};
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;

/// Database handle. Owns the connection pool shared across all workers.
pub struct Db {
    pool: PgPool,
    table: LeaseTable,
}

impl Db {
    /// Connect to Postgres and create a connection pool for the default table.
    pub async fn connect(url: &str) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(10)
            .connect(url)
            .await?;
        Ok(Self {
            pool,
            table: LeaseTable::default(),
        })
    }

    /// Lease a different table (or the same table under other column names).
    pub fn with_table(mut self, table: LeaseTable) -> Result<Self> {
        table.validate()?;
        self.table = table;
        Ok(self)
    }

    /// Run all pending migrations.
    ///
    /// The bundled migrations only create `work_items`. A custom
    /// [`LeaseTable`] must already exist with all its columns; for one,
    /// this is a no-op.
    pub async fn migrate(&self) -> Result<()> {
        if !self.table.is_bundled() {
            tracing::info!(table = %self.table.table, "custom work table, skipping migrations");
            return Ok(());
        }
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| Error::Other(format!("migration failed: {e}")))?;
        Ok(())
    }

    /// Simple health check: run a SELECT 1.
    pub async fn health_check(&self) -> Result<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    pub fn table(&self) -> &LeaseTable {
        &self.table
    }
}

/// Table and column names of a leasable table.
///
/// Names are interpolated into SQL, so they are restricted to plain
/// identifiers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LeaseTable {
    pub table: String,
    pub id: String,
    pub payload: String,
    pub result: String,
    pub lease_owner: String,
    pub lease_at: String,
    pub status: String,
    pub error: String,
    pub created_at: String,
    pub updated_at: String,
}

impl Default for LeaseTable {
    fn default() -> Self {
        Self::named("work_items")
    }
}

impl LeaseTable {
    /// A table using the standard column names.
    pub fn named(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            id: "id".into(),
            payload: "payload".into(),
            result: "result".into(),
            lease_owner: "lease_owner".into(),
            lease_at: "lease_at".into(),
            status: "status".into(),
            error: "error".into(),
            created_at: "created_at".into(),
            updated_at: "updated_at".into(),
        }
    }

    /// Whether this is the table the bundled migrations create.
    pub fn is_bundled(&self) -> bool {
        *self == Self::default()
    }

    /// Reject any name that is not a plain SQL identifier.
    pub fn validate(&self) -> Result<()> {
        let names = [
            &self.table,
            &self.id,
            &self.payload,
            &self.result,
            &self.lease_owner,
            &self.lease_at,
            &self.status,
            &self.error,
            &self.created_at,
            &self.updated_at,
        ];
        for name in names {
            if !is_identifier(name) {
                return Err(Error::Config(format!("invalid SQL identifier: {name:?}")));
            }
        }
        Ok(())
    }

    /// Select list aliasing every column to its standard name, for
    /// [`WorkItemRow`](lease::WorkItemRow).
    pub(crate) fn select_list(&self) -> String {
        format!(
            "{} AS id, {} AS payload, {} AS result, {} AS lease_owner, {} AS lease_at, \
             {} AS status, {} AS error, {} AS created_at, {} AS updated_at",
            self.id,
            self.payload,
            self.result,
            self.lease_owner,
            self.lease_at,
            self.status,
            self.error,
            self.created_at,
            self.updated_at,
        )
    }
}

fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

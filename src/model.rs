//! Core data model.
//!
//! A work item is a row in the shared store waiting for generated content.
//! Workers coordinate over it only through its lease fields.

use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::Error;

// ---------------------------------------------------------------------------
// Work Item
// ---------------------------------------------------------------------------

/// A unit of pending work.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkItem {
    /// Unique, sortable identifier. Claims are issued in ascending id order.
    pub id: WorkId,

    /// Input to be transformed. Opaque to the leasing core.
    pub payload: serde_json::Value,

    /// Structured output once processed.
    pub result: Option<serde_json::Value>,

    /// Current exclusivity claim, if any.
    pub lease: Option<Lease>,

    pub status: Status,

    /// Error recorded by the last failed attempt.
    pub error: Option<String>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl WorkItem {
    /// Eligible for a fresh claim: no result, no lease, still pending.
    pub fn is_claimable(&self) -> bool {
        self.result.is_none() && self.lease.is_none() && self.status == Status::Pending
    }
}

/// Newtype for work item IDs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct WorkId(pub i64);

impl std::fmt::Display for WorkId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for WorkId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.parse::<i64>()
            .map(WorkId)
            .map_err(|_| Error::Other(format!("invalid work id: {s}")))
    }
}

/// An ordered set of items claimed together in one poll, ascending by id.
pub type Batch = Vec<WorkItem>;

// ---------------------------------------------------------------------------
// Lease
// ---------------------------------------------------------------------------

/// A time-bounded exclusivity claim on a work item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Lease {
    pub owner: WorkerIdentity,
    pub acquired_at: DateTime<Utc>,
}

impl Lease {
    /// A lease is stale once its age exceeds `ttl`, regardless of owner liveness.
    pub fn is_stale(&self, ttl: TimeDelta, now: DateTime<Utc>) -> bool {
        now - self.acquired_at > ttl
    }
}

/// Identity of one running worker. Only ever used as a lease owner token.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WorkerIdentity(String);

impl WorkerIdentity {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Generate `"{prefix}-{pid}-{random}"`, unambiguous across concurrent workers
    /// on any number of hosts.
    pub fn generate(prefix: &str) -> Self {
        let suffix = Uuid::new_v4().simple().to_string();
        Self(format!("{prefix}-{}-{}", std::process::id(), &suffix[..8]))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for WorkerIdentity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

// ---------------------------------------------------------------------------
// Status
// ---------------------------------------------------------------------------

/// Terminal status of a work item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    /// Waiting for (or undergoing) processing.
    Pending,
    /// Result committed.
    Done,
    /// Processing failed; needs an operator requeue.
    Failed,
}

impl Status {
    pub fn as_str(self) -> &'static str {
        match self {
            Status::Pending => "pending",
            Status::Done => "done",
            Status::Failed => "failed",
        }
    }
}

impl std::fmt::Display for Status {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Status {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Status::Pending),
            "done" => Ok(Status::Done),
            "failed" => Ok(Status::Failed),
            other => Err(Error::Other(format!("unknown status: {other}"))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_identities_are_distinct() {
        let a = WorkerIdentity::generate("worker");
        let b = WorkerIdentity::generate("worker");
        assert_ne!(a, b);
        assert!(a.as_str().starts_with(&format!("worker-{}-", std::process::id())));
    }

    #[test]
    fn lease_goes_stale_after_ttl() {
        let now = Utc::now();
        let lease = Lease {
            owner: WorkerIdentity::new("w"),
            acquired_at: now - TimeDelta::minutes(11),
        };
        assert!(lease.is_stale(TimeDelta::minutes(10), now));
        assert!(!lease.is_stale(TimeDelta::minutes(12), now));
    }

    #[test]
    fn status_round_trips_through_text() {
        for status in [Status::Pending, Status::Done, Status::Failed] {
            assert_eq!(status.to_string().parse::<Status>().unwrap(), status);
        }
        assert!("dead".parse::<Status>().is_err());
    }
}

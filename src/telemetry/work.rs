//! Work item span helpers.
//!
//! One span per item pipeline: generation, parsing and commit all nest
//! under it.

use tracing::Span;

use crate::model::{WorkId, WorkerIdentity};

/// Start a span for processing one leased work item.
///
/// The `work.status` field is declared empty and filled by
/// [`record_outcome`].
pub fn start_work_span(worker: &WorkerIdentity, work_id: WorkId) -> Span {
    tracing::info_span!(
        "work.execute",
        "work.worker" = %worker,
        "work.id" = work_id.0,
        "work.status" = tracing::field::Empty,
    )
}

/// Record the terminal status reached by the item.
pub fn record_outcome(span: &Span, status: &str) {
    span.record("work.status", status);
    span.in_scope(|| {
        tracing::debug!(status, "work item committed");
    });
}

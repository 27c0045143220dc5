//! Metric instrument factories for leasegen.
//!
//! Uses the OTel Meter API with the globally-registered `MeterProvider`.
//! All instruments are created lazily from the `"leasegen"` meter.

use opentelemetry::metrics::{Counter, Histogram, Meter};

/// Returns the shared meter for leasegen instruments.
fn meter() -> Meter {
    opentelemetry::global::meter("leasegen")
}

/// Counter: work items leased by a successful claim.
pub fn leases_claimed() -> Counter<u64> {
    meter()
        .u64_counter("leasegen.lease.claimed")
        .with_description("Number of work items leased")
        .build()
}

/// Counter: claim candidates another worker leased first.
pub fn lease_races_lost() -> Counter<u64> {
    meter()
        .u64_counter("leasegen.lease.races_lost")
        .with_description("Number of claim candidates lost to another worker")
        .build()
}

/// Counter: stale leases cleared by reclamation.
pub fn leases_reclaimed() -> Counter<u64> {
    meter()
        .u64_counter("leasegen.lease.reclaimed")
        .with_description("Number of stale leases reclaimed")
        .build()
}

/// Counter: terminal commits.
/// Labels: `status` ("done" | "failed").
pub fn work_committed() -> Counter<u64> {
    meter()
        .u64_counter("leasegen.work.committed")
        .with_description("Number of work items committed")
        .build()
}

/// Counter: provider call attempts.
/// Labels: `outcome` ("ok" | "transient" | "fatal").
pub fn llm_attempts() -> Counter<u64> {
    meter()
        .u64_counter("leasegen.llm.attempts")
        .with_description("Number of generation provider attempts")
        .build()
}

/// Histogram: operation duration in milliseconds.
/// Labels: `operation`.
pub fn operation_duration_ms() -> Histogram<f64> {
    meter()
        .f64_histogram("leasegen.operation.duration_ms")
        .with_description("Operation duration in milliseconds")
        .with_unit("ms")
        .build()
}

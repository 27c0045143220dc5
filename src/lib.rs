//! # leasegen
//!
//! Lease-based work-queue consumption for LLM content generation.
//!
//! Independent workers claim rows from a shared store under a TTL lease,
//! send each row's payload to a generation provider (rig-core), parse the
//! reply defensively, and commit the result while releasing the lease.
//! Crashed workers' leases expire and are reclaimed, giving at-least-once
//! processing without any shared memory between workers.

pub mod config;
pub mod db;
pub mod error;
pub mod lease;
pub mod llm;
pub mod model;
pub mod parse;
pub mod telemetry;
pub mod worker;

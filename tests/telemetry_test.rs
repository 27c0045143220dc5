//! Integration tests for telemetry initialization and span helpers.

use leasegen::model::{WorkId, WorkerIdentity};

#[test]
fn telemetry_initializes_without_endpoint() {
    // Note: tracing subscriber can only be set once per process.
    // Using try_init() in the implementation avoids panics if another
    // test already initialized a subscriber.
    let config = leasegen::telemetry::TelemetryConfig {
        endpoint: None,
        service_name: "leasegen-test".to_string(),
        log_level: "debug".to_string(),
    };
    // This may return Err if a global subscriber was already set by
    // another test in this process; that is acceptable.
    let _guard = leasegen::telemetry::init_telemetry(config);
}

#[test]
fn genai_chat_span_creates_and_records_temperature() {
    let span = leasegen::telemetry::genai::start_chat_span("claude-sonnet-4-20250514", "anthropic");
    leasegen::telemetry::genai::record_temperature(&span, 0.7);
}

#[test]
fn work_span_creates_and_records_outcome() {
    let worker = WorkerIdentity::new("w1");
    let span = leasegen::telemetry::work::start_work_span(&worker, WorkId(7));
    leasegen::telemetry::work::record_outcome(&span, "done");
}

#[test]
fn metric_instruments_build_without_a_provider() {
    use opentelemetry::KeyValue;

    leasegen::telemetry::metrics::leases_claimed().add(2, &[]);
    leasegen::telemetry::metrics::work_committed().add(1, &[KeyValue::new("status", "done")]);
    leasegen::telemetry::metrics::operation_duration_ms()
        .record(12.5, &[KeyValue::new("operation", "work.execute")]);
}

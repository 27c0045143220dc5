//! Retry classification and bounds for the generation invoker.

mod common;

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use common::ScriptedProvider;
use leasegen::error::Error;
use leasegen::llm::{
    GenerationInvoker, GenerationRequest, ProviderError, RetryPolicy, SamplingParams,
};

fn request() -> GenerationRequest {
    GenerationRequest {
        model: "test-model".into(),
        system: None,
        prompt: "X".into(),
        sampling: SamplingParams::default(),
    }
}

fn invoker(provider: Arc<ScriptedProvider>) -> GenerationInvoker {
    GenerationInvoker::new(
        provider,
        RetryPolicy {
            max_attempts: 3,
            base_delay: Duration::from_secs(2),
        },
    )
}

#[tokio::test(start_paused = true)]
async fn transient_errors_are_retried_three_times_then_fatal() {
    let provider = ScriptedProvider::new(|_| Err(ProviderError::Transient("429 rate limit".into())));

    let err = invoker(provider.clone()).invoke(&request()).await.unwrap_err();

    assert_eq!(provider.calls(), 3);
    match err {
        Error::Provider(ProviderError::Fatal(message)) => {
            assert!(message.contains("3 attempts"), "{message}");
            assert!(message.contains("429 rate limit"), "{message}");
        }
        other => panic!("expected fatal provider error, got {other:?}"),
    }
}

#[tokio::test(start_paused = true)]
async fn non_transient_error_is_not_retried() {
    let provider = ScriptedProvider::new(|_| Err(ProviderError::Fatal("invalid api key".into())));

    let err = invoker(provider.clone()).invoke(&request()).await.unwrap_err();

    assert_eq!(provider.calls(), 1);
    assert!(matches!(err, Error::Provider(ProviderError::Fatal(_))));
}

#[tokio::test(start_paused = true)]
async fn recovers_when_a_retry_succeeds() {
    let failures = AtomicUsize::new(0);
    let provider = ScriptedProvider::new(move |_| {
        if failures.fetch_add(1, Ordering::SeqCst) < 2 {
            Err(ProviderError::Transient("request timed out".into()))
        } else {
            Ok("{\"a\":1}".into())
        }
    });

    let text = invoker(provider.clone()).invoke(&request()).await.unwrap();

    assert_eq!(text, "{\"a\":1}");
    assert_eq!(provider.calls(), 3);
}

#[tokio::test(start_paused = true)]
async fn backoff_is_linear_in_attempt_number() {
    let provider = ScriptedProvider::new(|_| Err(ProviderError::Transient("overloaded".into())));
    let start = tokio::time::Instant::now();

    invoker(provider).invoke(&request()).await.unwrap_err();

    // 2s after attempt 1, 4s after attempt 2, no sleep after the last.
    let elapsed = start.elapsed();
    assert!(elapsed >= Duration::from_secs(6), "{elapsed:?}");
    assert!(elapsed < Duration::from_secs(7), "{elapsed:?}");
}

#[tokio::test]
async fn first_success_returns_immediately() {
    let provider = ScriptedProvider::always("done");
    let text = invoker(provider.clone()).invoke(&request()).await.unwrap();
    assert_eq!(text, "done");
    assert_eq!(provider.calls(), 1);
}

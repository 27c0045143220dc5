//! Bounded retry around a [`GenerationProvider`].

use std::sync::Arc;
use std::time::{Duration, Instant};

use opentelemetry::KeyValue;
use tracing::warn;

use super::{GenerationProvider, GenerationRequest, ProviderError};
use crate::error::Result;
use crate::telemetry::metrics;

/// Retry policy for transient provider failures.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Total attempts, including the first.
    pub max_attempts: u32,

    /// Delay unit for linear backoff.
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(1),
        }
    }
}

impl RetryPolicy {
    /// Delay after the given failed attempt (1-indexed): `base_delay * attempt`.
    ///
    /// With base_delay=1s: attempt 1 → 1s, attempt 2 → 2s.
    pub fn delay_after(&self, attempt: u32) -> Duration {
        self.base_delay.saturating_mul(attempt.max(1))
    }
}

/// Calls the provider, retrying transient failures with linear backoff.
#[derive(Clone)]
pub struct GenerationInvoker {
    provider: Arc<dyn GenerationProvider>,
    policy: RetryPolicy,
}

impl GenerationInvoker {
    pub fn new(provider: Arc<dyn GenerationProvider>, policy: RetryPolicy) -> Self {
        Self { provider, policy }
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Run `request` to completion.
    ///
    /// Non-transient errors are returned on first occurrence. A transient
    /// error on the final attempt is escalated to [`ProviderError::Fatal`].
    pub async fn invoke(&self, request: &GenerationRequest) -> Result<String> {
        let max_attempts = self.policy.max_attempts.max(1);
        let start = Instant::now();

        let mut attempt = 1;
        loop {
            match self.provider.generate(request).await {
                Ok(text) => {
                    metrics::llm_attempts().add(1, &[KeyValue::new("outcome", "ok")]);
                    metrics::operation_duration_ms().record(
                        start.elapsed().as_millis() as f64,
                        &[KeyValue::new("operation", "llm.invoke")],
                    );
                    return Ok(text);
                }
                Err(ProviderError::Transient(message)) if attempt < max_attempts => {
                    metrics::llm_attempts().add(1, &[KeyValue::new("outcome", "transient")]);
                    let delay = self.policy.delay_after(attempt);
                    warn!(
                        attempt,
                        max_attempts,
                        delay_ms = delay.as_millis() as u64,
                        error = %message,
                        "transient provider error, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(ProviderError::Transient(message)) => {
                    metrics::llm_attempts().add(1, &[KeyValue::new("outcome", "transient")]);
                    return Err(ProviderError::Fatal(format!(
                        "giving up after {attempt} attempts: {message}"
                    ))
                    .into());
                }
                Err(fatal) => {
                    metrics::llm_attempts().add(1, &[KeyValue::new("outcome", "fatal")]);
                    return Err(fatal.into());
                }
            }
        }
    }
}

//! Content generation: provider abstraction, retrying invoker, prompts.
//!
//! The core only sees a [`GenerationProvider`]: a request goes in, complete
//! text or a classified [`ProviderError`] comes out. The production provider
//! is [`provider::RigProvider`], built on an Anthropic client from
//! [`anthropic_client`].
//!
//! # Example
//! ```no_run
//! use leasegen::llm::anthropic_client;
//! use secrecy::SecretString;
//! use rig::client::CompletionClient;
//!
//! let key = SecretString::from("sk-ant-...");
//! let client = anthropic_client(&key).expect("failed to create Anthropic client");
//! let model = client.completion_model("claude-sonnet-4-20250514");
//! ```

pub mod invoker;
pub mod prompt;
pub mod provider;

pub use invoker::{GenerationInvoker, RetryPolicy};
pub use prompt::PromptTemplate;
pub use provider::RigProvider;

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use thiserror::Error;

/// Create an Anthropic client from a secret API key.
///
/// # Errors
/// Returns an error if the underlying HTTP client cannot be constructed.
pub fn anthropic_client(
    api_key: &SecretString,
) -> Result<rig::providers::anthropic::Client, rig::http_client::Error> {
    rig::providers::anthropic::Client::new(api_key.expose_secret())
}

/// One generation call.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationRequest {
    pub model: String,
    /// System preamble, if any.
    pub system: Option<String>,
    pub prompt: String,
    pub sampling: SamplingParams,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SamplingParams {
    pub temperature: f64,
    pub max_tokens: u64,
}

impl Default for SamplingParams {
    fn default() -> Self {
        Self {
            temperature: 0.7,
            max_tokens: 1024,
        }
    }
}

/// A provider failure, classified by whether retrying can help.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProviderError {
    /// Timeouts, rate limits, temporary unavailability, dropped connections.
    #[error("transient provider error: {0}")]
    Transient(String),

    #[error("fatal provider error: {0}")]
    Fatal(String),
}

impl ProviderError {
    /// Classify a raw provider error message.
    pub fn classify(message: impl Into<String>) -> Self {
        let message = message.into();
        if is_transient_message(&message) {
            ProviderError::Transient(message)
        } else {
            ProviderError::Fatal(message)
        }
    }

    pub fn is_transient(&self) -> bool {
        matches!(self, ProviderError::Transient(_))
    }

    pub fn message(&self) -> &str {
        match self {
            ProviderError::Transient(m) | ProviderError::Fatal(m) => m,
        }
    }
}

const TRANSIENT_PATTERNS: &[&str] = &[
    "timeout",
    "timed out",
    "rate limit",
    "rate_limit",
    "too many requests",
    "429",
    "overloaded",
    "502",
    "503",
    "504",
    "529",
    "temporarily unavailable",
    "service unavailable",
    "connection reset",
    "connection closed",
    "broken pipe",
];

fn is_transient_message(message: &str) -> bool {
    let lower = message.to_ascii_lowercase();
    TRANSIENT_PATTERNS.iter().any(|p| lower.contains(p))
}

/// The external generation capability.
#[async_trait]
pub trait GenerationProvider: Send + Sync {
    /// Short provider name, reported on telemetry spans.
    fn name(&self) -> &str;

    /// Run one request to completion.
    async fn generate(&self, request: &GenerationRequest) -> Result<String, ProviderError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_transient_messages() {
        for msg in [
            "request timed out after 60s",
            "HTTP 429 Too Many Requests",
            "Rate limit exceeded",
            "upstream returned 503 Service Unavailable",
            "Anthropic API is overloaded",
            "connection reset by peer",
        ] {
            assert!(ProviderError::classify(msg).is_transient(), "{msg}");
        }
    }

    #[test]
    fn classifies_fatal_messages() {
        for msg in ["invalid x-api-key", "model not found: claude-x", "400 Bad Request"] {
            assert!(!ProviderError::classify(msg).is_transient(), "{msg}");
        }
    }
}

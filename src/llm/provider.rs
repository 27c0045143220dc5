//! Anthropic-backed [`GenerationProvider`] via rig-core.

use async_trait::async_trait;
use rig::client::CompletionClient;
use rig::completion::Prompt;
use tracing::{Instrument, debug};

use super::{GenerationProvider, GenerationRequest, ProviderError};
use crate::telemetry::genai::{record_temperature, start_chat_span};

/// Sends each request as a single-turn prompt to an Anthropic model.
///
/// An agent is built per request since model and sampling parameters travel
/// with the request; the client and its connection pool are shared.
#[derive(Clone)]
pub struct RigProvider {
    client: rig::providers::anthropic::Client,
}

impl RigProvider {
    pub fn new(client: rig::providers::anthropic::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl GenerationProvider for RigProvider {
    fn name(&self) -> &str {
        "anthropic"
    }

    async fn generate(&self, request: &GenerationRequest) -> Result<String, ProviderError> {
        let span = start_chat_span(&request.model, self.name());
        record_temperature(&span, request.sampling.temperature);

        async {
            let mut builder = self
                .client
                .agent(request.model.as_str())
                .temperature(request.sampling.temperature)
                .max_tokens(request.sampling.max_tokens);
            if let Some(ref system) = request.system {
                builder = builder.preamble(system);
            }
            let agent = builder.build();

            let text = agent
                .prompt(request.prompt.as_str())
                .await
                .map_err(|e| ProviderError::classify(e.to_string()))?;

            debug!(chars = text.len(), "generation completed");
            Ok(text)
        }
        .instrument(span)
        .await
    }
}

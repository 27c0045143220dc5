//! Per-item transformation: payload → prompt → provider → parsed result.

use crate::error::Result;
use crate::llm::{GenerationInvoker, PromptTemplate, SamplingParams};
use crate::model::WorkItem;
use crate::parse::ResultParser;

/// Everything needed to turn one work item into a result. Read-only, shared
/// by all workers.
pub struct ItemPipeline {
    invoker: GenerationInvoker,
    template: PromptTemplate,
    parser: ResultParser,
    model: String,
    sampling: SamplingParams,
}

impl ItemPipeline {
    pub fn new(invoker: GenerationInvoker, model: impl Into<String>) -> Self {
        Self {
            invoker,
            template: PromptTemplate::default(),
            parser: ResultParser::new(),
            model: model.into(),
            sampling: SamplingParams::default(),
        }
    }

    pub fn template(mut self, template: PromptTemplate) -> Self {
        self.template = template;
        self
    }

    pub fn parser(mut self, parser: ResultParser) -> Self {
        self.parser = parser;
        self
    }

    pub fn sampling(mut self, sampling: SamplingParams) -> Self {
        self.sampling = sampling;
        self
    }

    /// Generate and parse a result for `item`. Any error is terminal for
    /// the item; transient provider errors were already retried.
    pub async fn run(&self, item: &WorkItem) -> Result<serde_json::Value> {
        let request = self.template.request(&self.model, self.sampling, &item.payload);
        let raw = self.invoker.invoke(&request).await?;
        self.parser.parse(&raw)
    }
}

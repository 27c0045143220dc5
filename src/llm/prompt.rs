//! Prompt templates: turn a work item payload into a generation request.

use std::path::Path;

use serde::Deserialize;

use super::{GenerationRequest, SamplingParams};
use crate::error::{Error, Result};

/// Placeholder replaced with the rendered payload.
pub const PAYLOAD_PLACEHOLDER: &str = "{payload}";

const DEFAULT_SYSTEM: &str = "You write study material. You answer with a single JSON object and nothing else.";

const DEFAULT_TEMPLATE: &str = r#"Read the following source material and write one question a careful reader should be able to answer from it, together with the answer.

Source material:
{payload}

Respond with ONLY a JSON object of the form {"Question": "...", "Answer": "..."}."#;

/// System preamble plus a user template containing `{payload}`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct PromptTemplate {
    #[serde(default)]
    pub system: Option<String>,
    pub template: String,
}

impl Default for PromptTemplate {
    fn default() -> Self {
        Self {
            system: Some(DEFAULT_SYSTEM.to_string()),
            template: DEFAULT_TEMPLATE.to_string(),
        }
    }
}

impl PromptTemplate {
    /// Load a template from a TOML file with `system` and `template` keys.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::Config(format!("cannot read prompt file {}: {e}", path.display()))
        })?;
        let template: PromptTemplate = toml::from_str(&content).map_err(|e| {
            Error::Config(format!("bad prompt file {}: {e}", path.display()))
        })?;
        if !template.template.contains(PAYLOAD_PLACEHOLDER) {
            return Err(Error::Config(format!(
                "prompt file {} has no {PAYLOAD_PLACEHOLDER} placeholder",
                path.display()
            )));
        }
        Ok(template)
    }

    /// Render the user prompt. String payloads go in verbatim, anything else
    /// as pretty-printed JSON.
    pub fn render(&self, payload: &serde_json::Value) -> String {
        let rendered = match payload {
            serde_json::Value::String(s) => s.clone(),
            other => serde_json::to_string_pretty(other).unwrap_or_else(|_| other.to_string()),
        };
        self.template.replace(PAYLOAD_PLACEHOLDER, &rendered)
    }

    pub fn request(
        &self,
        model: &str,
        sampling: SamplingParams,
        payload: &serde_json::Value,
    ) -> GenerationRequest {
        GenerationRequest {
            model: model.to_string(),
            system: self.system.clone(),
            prompt: self.render(payload),
            sampling,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn string_payload_is_inserted_verbatim() {
        let t = PromptTemplate {
            system: None,
            template: "<<{payload}>>".into(),
        };
        assert_eq!(t.render(&json!("X")), "<<X>>");
    }

    #[test]
    fn structured_payload_is_pretty_printed() {
        let t = PromptTemplate {
            system: None,
            template: "{payload}".into(),
        };
        assert_eq!(t.render(&json!({"a": 1})), "{\n  \"a\": 1\n}");
    }

    #[test]
    fn default_template_mentions_payload() {
        let t = PromptTemplate::default();
        assert!(t.template.contains(PAYLOAD_PLACEHOLDER));
        let req = t.request("m", SamplingParams::default(), &json!("text"));
        assert!(req.prompt.contains("text"));
        assert_eq!(req.model, "m");
    }

    #[test]
    fn loads_from_toml() {
        let path = std::env::temp_dir().join(format!("prompt-{}.toml", uuid::Uuid::new_v4()));
        std::fs::write(&path, "system = \"be brief\"\ntemplate = \"Summarize: {payload}\"\n").unwrap();
        let t = PromptTemplate::load(&path).unwrap();
        assert_eq!(t.system.as_deref(), Some("be brief"));
        assert_eq!(t.render(&json!("doc")), "Summarize: doc");
        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn rejects_template_without_placeholder() {
        let path = std::env::temp_dir().join(format!("prompt-{}.toml", uuid::Uuid::new_v4()));
        std::fs::write(&path, "template = \"nothing here\"\n").unwrap();
        assert!(matches!(PromptTemplate::load(&path), Err(Error::Config(_))));
        std::fs::remove_file(&path).ok();
    }
}

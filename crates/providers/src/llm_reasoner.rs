//! Model-backed reasoning over any [`Provider`].
//!
//! The prompt's system text is extended with the expected JSON schema, the
//! provider is asked for JSON-object output, and the reply is parsed into a
//! JSON object. Replies wrapped in Markdown code fences are accepted.

use async_trait::async_trait;
use knoroute_core::error::{ProviderError, ReasoningError};
use knoroute_core::message::Message;
use knoroute_core::provider::{Provider, ProviderRequest};
use knoroute_core::reasoning::{PromptSpec, ReasoningService, StructuredValue};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

pub struct LlmReasoner {
    name: String,
    provider: Arc<dyn Provider>,
    model: String,
    temperature: f32,
    max_tokens: Option<u32>,
    timeout: Duration,
}

impl LlmReasoner {
    pub fn new(provider: Arc<dyn Provider>, model: impl Into<String>) -> Self {
        let model = model.into();
        Self {
            name: format!("llm:{model}"),
            provider,
            model,
            temperature: 0.0,
            max_tokens: None,
            timeout: Duration::from_secs(60),
        }
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    fn system_text(prompt: &PromptSpec) -> String {
        if prompt.output_schema.is_null() {
            return format!("{}\n\nRespond with a single JSON object.", prompt.system);
        }
        format!(
            "{}\n\nRespond with a single JSON object matching this JSON Schema:\n{}",
            prompt.system, prompt.output_schema
        )
    }
}

/// Pull a JSON object out of a model reply.
pub fn extract_json(reply: &str) -> Option<StructuredValue> {
    let trimmed = reply.trim();
    let unfenced = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .and_then(|rest| rest.strip_suffix("```"))
        .map(str::trim)
        .unwrap_or(trimmed);

    if let Ok(value @ StructuredValue::Object(_)) = serde_json::from_str::<StructuredValue>(unfenced) {
        return Some(value);
    }

    // Prose around the object: take the outermost braces.
    let start = unfenced.find('{')?;
    let end = unfenced.rfind('}')?;
    if end <= start {
        return None;
    }
    match serde_json::from_str::<StructuredValue>(&unfenced[start..=end]) {
        Ok(value @ StructuredValue::Object(_)) => Some(value),
        _ => None,
    }
}

#[async_trait]
impl ReasoningService for LlmReasoner {
    fn name(&self) -> &str {
        &self.name
    }

    async fn complete(&self, prompt: PromptSpec) -> Result<StructuredValue, ReasoningError> {
        let request = ProviderRequest {
            model: self.model.clone(),
            messages: vec![
                Message::system(Self::system_text(&prompt)),
                Message::user(prompt.user.clone()),
            ],
            temperature: self.temperature,
            max_tokens: self.max_tokens,
            json_mode: true,
        };

        debug!(task = %prompt.task, provider = %self.provider.name(), "Reasoning request");

        let response = tokio::time::timeout(self.timeout, self.provider.complete(request))
            .await
            .map_err(|_| {
                ProviderError::Timeout(format!(
                    "{} did not answer within {}s",
                    self.provider.name(),
                    self.timeout.as_secs()
                ))
            })??;

        match extract_json(&response.message.content) {
            Some(value) => Ok(value),
            None => {
                warn!(task = %prompt.task, reply_len = response.message.content.len(), "Model reply was not a JSON object");
                Err(ReasoningError::invalid(prompt.task, "reply was not a JSON object"))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use knoroute_core::provider::ProviderResponse;
    use knoroute_core::reasoning::ReasoningTask;
    use serde_json::json;
    use std::sync::Mutex;

    /// Returns canned replies and records requests.
    struct CannedProvider {
        replies: Mutex<Vec<Result<String, ProviderError>>>,
        requests: Mutex<Vec<ProviderRequest>>,
    }

    impl CannedProvider {
        fn new(replies: Vec<Result<String, ProviderError>>) -> Self {
            Self {
                replies: Mutex::new(replies),
                requests: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl Provider for CannedProvider {
        fn name(&self) -> &str {
            "canned"
        }

        async fn complete(&self, request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
            self.requests.lock().unwrap().push(request.clone());
            let reply = self.replies.lock().unwrap().remove(0)?;
            Ok(ProviderResponse {
                message: Message::assistant(reply),
                usage: None,
                model: request.model,
            })
        }
    }

    fn prompt() -> PromptSpec {
        PromptSpec::new(ReasoningTask::Understand, "Classify the query.", "Query: why 401?")
            .with_output_schema(json!({"type": "object"}))
    }

    #[test]
    fn extract_plain_object() {
        assert_eq!(extract_json(r#" {"a": 1} "#), Some(json!({"a": 1})));
    }

    #[test]
    fn extract_fenced_object() {
        let reply = "```json\n{\"intent\": \"debugging\"}\n```";
        assert_eq!(extract_json(reply), Some(json!({"intent": "debugging"})));
    }

    #[test]
    fn extract_object_inside_prose() {
        let reply = "Here you go: {\"ok\": true} hope that helps";
        assert_eq!(extract_json(reply), Some(json!({"ok": true})));
    }

    #[test]
    fn non_object_is_rejected() {
        assert_eq!(extract_json("[1, 2]"), None);
        assert_eq!(extract_json("no json here"), None);
    }

    #[tokio::test]
    async fn sends_schema_and_json_mode() {
        let provider = Arc::new(CannedProvider::new(vec![Ok(r#"{"intent":"debugging"}"#.into())]));
        let reasoner = LlmReasoner::new(provider.clone(), "gpt-4o-mini").with_max_tokens(500);

        let value = reasoner.complete(prompt()).await.unwrap();
        assert_eq!(value["intent"], "debugging");

        let requests = provider.requests.lock().unwrap();
        assert!(requests[0].json_mode);
        assert_eq!(requests[0].max_tokens, Some(500));
        assert!(requests[0].messages[0].content.contains("JSON Schema"));
        assert_eq!(requests[0].messages[1].content, "Query: why 401?");
        assert_eq!(reasoner.name(), "llm:gpt-4o-mini");
    }

    #[tokio::test]
    async fn prose_reply_is_invalid_output() {
        let provider = Arc::new(CannedProvider::new(vec![Ok("I think it's debugging".into())]));
        let reasoner = LlmReasoner::new(provider, "m");
        let err = reasoner.complete(prompt()).await.unwrap_err();
        assert!(matches!(
            err,
            ReasoningError::InvalidOutput { task: ReasoningTask::Understand, .. }
        ));
    }

    #[tokio::test]
    async fn provider_failure_is_propagated() {
        let provider = Arc::new(CannedProvider::new(vec![Err(ProviderError::RateLimited {
            retry_after_secs: 2,
        })]));
        let reasoner = LlmReasoner::new(provider, "m");
        let err = reasoner.complete(prompt()).await.unwrap_err();
        assert!(matches!(err, ReasoningError::Provider(ProviderError::RateLimited { .. })));
    }
}

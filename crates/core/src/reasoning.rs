//! ReasoningService trait: turns a structured prompt into a structured value.
//!
//! Every pipeline step that needs judgement (understanding, routing,
//! evaluation, answering) builds a [`PromptSpec`] and calls
//! [`ReasoningService::complete`]. The step then validates the returned
//! value against its own contract (see [`crate::contract`]); the service
//! itself only promises well-formed JSON or an error.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::ReasoningError;

/// The raw structured value a reasoning service returns.
pub type StructuredValue = serde_json::Value;

/// Which pipeline step is asking.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReasoningTask {
    Understand,
    Route,
    Evaluate,
    Answer,
}

impl ReasoningTask {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Understand => "understand",
            Self::Route => "route",
            Self::Evaluate => "evaluate",
            Self::Answer => "answer",
        }
    }
}

impl fmt::Display for ReasoningTask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A structured prompt.
///
/// `system` and `user` carry the natural-language instructions for
/// model-backed services; `inputs` carries the same facts as JSON so that
/// deterministic services can work without parsing prose.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PromptSpec {
    pub task: ReasoningTask,
    pub system: String,
    pub user: String,
    #[serde(default)]
    pub inputs: serde_json::Value,
    /// JSON Schema the result must satisfy
    #[serde(default)]
    pub output_schema: serde_json::Value,
}

impl PromptSpec {
    pub fn new(task: ReasoningTask, system: impl Into<String>, user: impl Into<String>) -> Self {
        Self {
            task,
            system: system.into(),
            user: user.into(),
            inputs: serde_json::Value::Null,
            output_schema: serde_json::Value::Null,
        }
    }

    pub fn with_inputs(mut self, inputs: serde_json::Value) -> Self {
        self.inputs = inputs;
        self
    }

    pub fn with_output_schema(mut self, schema: serde_json::Value) -> Self {
        self.output_schema = schema;
        self
    }
}

/// The core ReasoningService trait.
///
/// Implementations: model-backed (any chat-completion provider) and a
/// deterministic heuristic reasoner for offline use.
#[async_trait]
pub trait ReasoningService: Send + Sync {
    /// A human-readable name (e.g., "llm:gpt-4o-mini", "heuristic").
    fn name(&self) -> &str;

    /// Produce a structured value for the prompt.
    async fn complete(&self, prompt: PromptSpec) -> std::result::Result<StructuredValue, ReasoningError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn task_names_are_snake_case() {
        assert_eq!(serde_json::to_string(&ReasoningTask::Evaluate).unwrap(), "\"evaluate\"");
        assert_eq!(ReasoningTask::Understand.to_string(), "understand");
    }

    #[test]
    fn prompt_builder_sets_inputs_and_schema() {
        let prompt = PromptSpec::new(ReasoningTask::Route, "sys", "user")
            .with_inputs(json!({"query": "q"}))
            .with_output_schema(json!({"type": "object"}));
        assert_eq!(prompt.inputs["query"], "q");
        assert_eq!(prompt.output_schema["type"], "object");
    }
}

//! Query understanding: classify what the question is about.

use knoroute_core::contract::{UnderstandInput, UnderstandOutput};
use knoroute_core::error::ReasoningError;
use knoroute_core::query::{Query, Understanding};
use knoroute_core::reasoning::{PromptSpec, ReasoningService, ReasoningTask};
use tracing::debug;

use crate::prompt::{ask, with_inputs};

const SYSTEM: &str = "\
You classify questions asked against an engineering knowledge base.

Intents:
- debugging: something is broken, failing or behaving unexpectedly
- explanation: how or why something works
- comparison: the difference between two or more things
- how_to: steps to build, add, configure or change something

Set needs_memory to true when the question would benefit from learned knowledge:
historical issues (\"why did X fail last week?\"), recurring patterns
(\"what usually causes this?\") or learned best practices.

Complexity: simple (one fact), moderate (a few connected facts),
complex (several components or a multi-part question).

The topic is the main component or concept, in a few words.

Examples:
\"How does authentication work in our system?\" -> explanation, topic \"authentication\", needs_memory false, simple
\"Why did login fail last Tuesday?\" -> debugging, topic \"login\", needs_memory true, moderate
\"Compare REST vs GraphQL implementations\" -> comparison, topic \"api design\", needs_memory false, complex
\"How to add a new middleware?\" -> how_to, topic \"middleware\", needs_memory false, moderate";

pub async fn understand(reasoner: &dyn ReasoningService, query: &Query) -> Result<Understanding, ReasoningError> {
    let prompt = PromptSpec::new(ReasoningTask::Understand, SYSTEM, format!("Query: {query}"))
        .with_output_schema(UnderstandOutput::schema());
    let prompt = with_inputs(prompt, &UnderstandInput { query: query.to_string() })?;

    let out: UnderstandOutput = ask(reasoner, prompt).await?;
    let understanding = Understanding::new(out.intent, out.topic, out.needs_memory, out.complexity)
        .map_err(|e| ReasoningError::invalid(ReasoningTask::Understand, e.to_string()))?;

    debug!(
        intent = %understanding.intent(),
        topic = %understanding.topic(),
        needs_memory = understanding.needs_memory(),
        "Query understood"
    );
    Ok(understanding)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::ScriptedReasoner;
    use knoroute_core::query::{Complexity, Intent};
    use serde_json::json;

    #[tokio::test]
    async fn parses_valid_output() {
        let reasoner = ScriptedReasoner::new().reply(
            ReasoningTask::Understand,
            json!({"intent": "debugging", "topic": "login", "needs_memory": true, "complexity": "moderate"}),
        );
        let query = Query::new("Why did login fail last Tuesday?").unwrap();
        let u = understand(&reasoner, &query).await.unwrap();
        assert_eq!(u.intent(), Intent::Debugging);
        assert_eq!(u.topic(), "login");
        assert!(u.needs_memory());
        assert_eq!(u.complexity(), Complexity::Moderate);

        let prompts = reasoner.prompts();
        assert_eq!(prompts[0].inputs["query"], "Why did login fail last Tuesday?");
        assert!(prompts[0].user.contains("last Tuesday"));
    }

    #[tokio::test]
    async fn unknown_intent_is_invalid_output() {
        let reasoner = ScriptedReasoner::new().reply(
            ReasoningTask::Understand,
            json!({"intent": "chitchat", "topic": "x", "needs_memory": false, "complexity": "simple"}),
        );
        let err = understand(&reasoner, &Query::new("hello").unwrap()).await.unwrap_err();
        assert!(matches!(err, ReasoningError::InvalidOutput { task: ReasoningTask::Understand, .. }));
    }

    #[tokio::test]
    async fn blank_topic_is_invalid_output() {
        let reasoner = ScriptedReasoner::new().reply(
            ReasoningTask::Understand,
            json!({"intent": "explanation", "topic": "  ", "needs_memory": false, "complexity": "simple"}),
        );
        let err = understand(&reasoner, &Query::new("what?").unwrap()).await.unwrap_err();
        assert!(matches!(err, ReasoningError::InvalidOutput { .. }));
    }

    #[tokio::test]
    async fn provider_failure_is_propagated() {
        use knoroute_core::error::ProviderError;
        let reasoner = ScriptedReasoner::new().fail(
            ReasoningTask::Understand,
            ProviderError::Timeout("no answer".into()).into(),
        );
        let err = understand(&reasoner, &Query::new("why?").unwrap()).await.unwrap_err();
        assert!(matches!(err, ReasoningError::Provider(ProviderError::Timeout(_))));
    }
}

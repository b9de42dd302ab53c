//! Shared plumbing for steps that consult the reasoning service.

use knoroute_core::error::ReasoningError;
use knoroute_core::reasoning::{PromptSpec, ReasoningService};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::debug;

/// Serialize step inputs into the prompt's `inputs` field.
pub(crate) fn with_inputs<I: Serialize>(prompt: PromptSpec, inputs: &I) -> Result<PromptSpec, ReasoningError> {
    let task = prompt.task;
    let value = serde_json::to_value(inputs)
        .map_err(|e| ReasoningError::invalid(task, format!("could not encode inputs: {e}")))?;
    Ok(prompt.with_inputs(value))
}

/// Send the prompt and decode the structured reply into `T`.
pub(crate) async fn ask<T: DeserializeOwned>(
    reasoner: &dyn ReasoningService,
    prompt: PromptSpec,
) -> Result<T, ReasoningError> {
    let task = prompt.task;
    debug!(%task, reasoner = %reasoner.name(), "Consulting reasoning service");
    let value = reasoner.complete(prompt).await?;
    serde_json::from_value(value).map_err(|e| ReasoningError::invalid(task, e.to_string()))
}

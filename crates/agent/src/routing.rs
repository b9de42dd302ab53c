//! Routing planner: pick the stores to search this round.

use knoroute_core::contract::{RouteInput, RouteOutput};
use knoroute_core::error::ReasoningError;
use knoroute_core::query::{Intent, Query, Understanding};
use knoroute_core::reasoning::{PromptSpec, ReasoningService, ReasoningTask};
use knoroute_core::routing::RoutingDecision;
use knoroute_core::source::{SourceCategory, SourceSet, format_sources};
use std::fmt::Write;
use tracing::{debug, info};

use crate::prompt::{ask, with_inputs};
use crate::state::RetryContext;

/// The stores an intent calls for before any evidence is seen.
pub fn baseline_sources(intent: Intent, needs_memory: bool) -> SourceSet {
    let mut sources: SourceSet = match intent {
        Intent::Debugging => [SourceCategory::Tickets, SourceCategory::Code].into(),
        Intent::Explanation | Intent::Comparison | Intent::HowTo => {
            [SourceCategory::Docs, SourceCategory::Code].into()
        }
    };
    if needs_memory {
        sources.insert(SourceCategory::Memory);
    }
    sources
}

fn system_text() -> String {
    let mut text = String::from(
        "You route questions to the knowledge stores most likely to answer them.\n\nStores:\n",
    );
    for category in SourceCategory::ALL {
        let _ = writeln!(text, "- {category}: {}", category.description());
    }
    text.push_str(
        "\nRouting principles:\n\
         - explanation: docs and code\n\
         - debugging: tickets and code\n\
         - comparison: docs and code\n\
         - how_to: docs and code\n\
         - add memory when the question needs learned knowledge\n\
         \n\
         On a retry, widen the search toward the missing aspects instead of repeating the \
         previous selection. Use \"parallel\" when the stores are independent and \
         \"sequential\" when one result should inform the next. Set retry_allowed to false \
         only when searching again cannot help.",
    );
    text
}

fn user_text(query: &Query, understanding: &Understanding, retry: Option<&RetryContext>) -> String {
    let (previous, missing) = match retry {
        Some(ctx) => (
            format!("Previously queried: {}", format_sources(&ctx.previous_sources)),
            ctx.missing_aspects.join(", "),
        ),
        None => ("None (first attempt)".to_string(), "N/A".to_string()),
    };
    format!(
        "Query: {query}\n\
         Intent: {}\n\
         Topic: {}\n\
         Needs memory: {}\n\
         Complexity: {:?}\n\
         Previous attempt: {previous}\n\
         Missing aspects: {missing}\n\n\
         Decide which stores to query and explain why.",
        understanding.intent(),
        understanding.topic(),
        understanding.needs_memory(),
        understanding.complexity(),
    )
}

/// Plan one retrieval round.
///
/// On a retry that came back with the same stores as last time, the plan is
/// widened with the evaluator's unqueried suggestions, or failing those,
/// with baseline stores not yet in the plan.
pub async fn plan(
    reasoner: &dyn ReasoningService,
    query: &Query,
    understanding: &Understanding,
    retry: Option<&RetryContext>,
) -> Result<RoutingDecision, ReasoningError> {
    let baseline = baseline_sources(understanding.intent(), understanding.needs_memory());
    let inputs = RouteInput {
        query: query.to_string(),
        intent: understanding.intent(),
        topic: understanding.topic().to_string(),
        needs_memory: understanding.needs_memory(),
        complexity: understanding.complexity(),
        baseline: baseline.iter().copied().collect(),
        previous_sources: retry.map(|c| c.previous_sources.iter().copied().collect()).unwrap_or_default(),
        missing_aspects: retry.map(|c| c.missing_aspects.clone()).unwrap_or_default(),
        suggested_sources: retry.map(|c| c.suggested_sources.iter().copied().collect()).unwrap_or_default(),
    };

    let prompt = PromptSpec::new(ReasoningTask::Route, system_text(), user_text(query, understanding, retry))
        .with_output_schema(RouteOutput::schema());
    let prompt = with_inputs(prompt, &inputs)?;

    let out: RouteOutput = ask(reasoner, prompt).await?;
    let mut decision = RoutingDecision::new(out.selected_sources, out.strategy, out.retry_allowed, out.reasoning)
        .map_err(|e| ReasoningError::invalid(ReasoningTask::Route, e.to_string()))?;

    if let Some(ctx) = retry {
        widen_repeated_plan(&mut decision, ctx, &baseline);
    }

    info!(
        sources = %format_sources(decision.selected_sources()),
        strategy = ?decision.strategy(),
        retry_allowed = decision.retry_allowed(),
        retry = retry.is_some(),
        "Routing decided"
    );
    Ok(decision)
}

fn widen_repeated_plan(decision: &mut RoutingDecision, ctx: &RetryContext, baseline: &SourceSet) {
    if ctx.missing_aspects.is_empty()
        || !decision.retry_allowed()
        || decision.selected_sources() != &ctx.previous_sources
    {
        return;
    }

    let suggested: Vec<SourceCategory> = ctx
        .suggested_sources
        .iter()
        .filter(|c| !decision.selected_sources().contains(c))
        .copied()
        .collect();
    let added = if suggested.is_empty() {
        let fallback: Vec<SourceCategory> = baseline
            .iter()
            .filter(|c| !decision.selected_sources().contains(c))
            .copied()
            .collect();
        decision.expand(fallback, "Widened to baseline stores not yet searched.")
    } else {
        decision.expand(suggested, "Widened with stores suggested by the evaluator.")
    };

    debug!(added, "Retry plan repeated the previous round");
}

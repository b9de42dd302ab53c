//! `knoroute query`: Answer a question from the knowledge stores.

use knoroute_agent::{QueryOutcome, QueryRequest};
use knoroute_config::MAX_RETRIES_LIMIT;
use knoroute_core::error::ValidationError;
use knoroute_core::source::format_sources;
use tokio_util::sync::CancellationToken;

use super::{build_router, load_config};

pub async fn run(text: String, max_retries: Option<u32>, json: bool) -> Result<(), Box<dyn std::error::Error>> {
    if let Some(requested) = max_retries {
        check_max_retries(requested)?;
    }

    let config = load_config()?;
    let router = build_router(&config)?;

    // Ctrl-C stops the loop at the next phase boundary.
    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            on_interrupt.cancel();
        }
    });

    let mut request = QueryRequest::new(text).with_cancellation(cancel);
    if let Some(n) = max_retries {
        request = request.with_max_retries(n);
    }

    let outcome = router.run(request).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&outcome)?);
    } else {
        print!("{}", render(&outcome));
    }
    Ok(())
}

fn check_max_retries(requested: u32) -> Result<(), ValidationError> {
    if requested > MAX_RETRIES_LIMIT {
        return Err(ValidationError::MaxRetriesOutOfRange {
            requested,
            limit: MAX_RETRIES_LIMIT,
        });
    }
    Ok(())
}

fn render(outcome: &QueryOutcome) -> String {
    let answer = &outcome.answer;
    let mut out = format!("{}\n\n", answer.text);

    if answer.has_citations() {
        out.push_str("Sources:\n");
        for (i, citation) in answer.citations.iter().enumerate() {
            let locator = if citation.locator.is_empty() {
                citation.document_id.as_str()
            } else {
                citation.locator.as_str()
            };
            out.push_str(&format!("  [{}] {}: {}", i + 1, citation.source, locator));
            if !citation.relevance.is_empty() {
                out.push_str(&format!(" ({})", citation.relevance));
            }
            out.push('\n');
        }
        out.push('\n');
    }

    if let Some(insight) = &answer.insight {
        out.push_str(&format!("Insight: {insight}\n"));
    }

    out.push_str(&format!(
        "Confidence: {} · rounds: {} · retries: {} · sources: {} · stopped: {}\n",
        answer.confidence,
        outcome.rounds,
        outcome.retry_count,
        format_sources(&outcome.sources_queried),
        outcome.finalize_reason.as_str(),
    ));
    out
}

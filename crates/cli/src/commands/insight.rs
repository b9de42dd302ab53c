//! `knoroute insight`: Record a learned insight in the memory store.

use knoroute_agent::{FeedbackOutcome, InsightRecord, InsightWriter};

use super::load_config;

pub async fn run(
    text: String,
    learned_from: String,
    confidence: f32,
    tags: Vec<String>,
) -> Result<(), Box<dyn std::error::Error>> {
    let config = load_config()?;
    let knowledge = knoroute_stores::build_knowledge_base(&config.stores)?;
    let writer = InsightWriter::new(knowledge.memory().clone());

    let record = InsightRecord::new(text, learned_from, confidence).with_tags(tags);
    match writer.write_insight(&record).await? {
        FeedbackOutcome::Stored { id } => println!("✅ Insight stored ({id})"),
        FeedbackOutcome::Skipped => println!("  Insight already known; skipped"),
    }
    Ok(())
}

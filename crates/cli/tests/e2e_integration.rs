//! End-to-end integration tests for the KnoRoute retrieval loop.
//!
//! These tests run whole queries through real stores, from the query text
//! to the cited answer, with a scripted reasoning service standing in for
//! the model.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};

use knoroute_agent::{
    FeedbackOutcome, FinalizeReason, InsightRecord, InsightWriter, KnowledgeRouter, QueryRequest,
    WorkflowSettings,
};
use knoroute_config::StoresConfig;
use knoroute_core::error::ReasoningError;
use knoroute_core::event::{EventBus, PipelineEvent};
use knoroute_core::reasoning::{PromptSpec, ReasoningService, ReasoningTask, StructuredValue};
use knoroute_core::source::{SourceCategory, SourceSet};
use knoroute_core::store::{Document, KnowledgeBase};
use knoroute_providers::HeuristicReasoner;
use knoroute_stores::{build_knowledge_base, in_memory_knowledge_base};
use serde_json::json;

// ── Scripted reasoning ───────────────────────────────────────────────────

/// Returns queued replies per task; the last reply for a task repeats.
#[derive(Default)]
struct ScriptedReasoner {
    replies: Mutex<HashMap<ReasoningTask, VecDeque<StructuredValue>>>,
    calls: Mutex<Vec<ReasoningTask>>,
}

impl ScriptedReasoner {
    fn new() -> Self {
        Self::default()
    }

    fn then(self, task: ReasoningTask, reply: StructuredValue) -> Self {
        self.replies.lock().unwrap().entry(task).or_default().push_back(reply);
        self
    }

    fn calls(&self, task: ReasoningTask) -> usize {
        self.calls.lock().unwrap().iter().filter(|t| **t == task).count()
    }
}

#[async_trait::async_trait]
impl ReasoningService for ScriptedReasoner {
    fn name(&self) -> &str {
        "e2e_scripted"
    }

    async fn complete(&self, prompt: PromptSpec) -> Result<StructuredValue, ReasoningError> {
        self.calls.lock().unwrap().push(prompt.task);
        let mut replies = self.replies.lock().unwrap();
        let queue = replies
            .get_mut(&prompt.task)
            .unwrap_or_else(|| panic!("ScriptedReasoner: nothing queued for {}", prompt.task));
        let reply = if queue.len() > 1 { queue.pop_front() } else { queue.front().cloned() };
        Ok(reply.unwrap())
    }
}

fn understood(intent: &str, topic: &str, needs_memory: bool) -> StructuredValue {
    json!({"intent": intent, "topic": topic, "needs_memory": needs_memory, "complexity": "moderate"})
}

fn route(sources: &[&str], retry_allowed: bool) -> StructuredValue {
    json!({"selected_sources": sources, "strategy": "parallel", "retry_allowed": retry_allowed, "reasoning": "e2e"})
}

fn sufficient(confidence: f32) -> StructuredValue {
    json!({"is_sufficient": true, "confidence": confidence, "missing_aspects": [], "suggested_sources": []})
}

fn insufficient(confidence: f32, missing: &str, suggested: &[&str]) -> StructuredValue {
    json!({"is_sufficient": false, "confidence": confidence, "missing_aspects": [missing], "suggested_sources": suggested})
}

fn answered(text: &str, confidence: f32, cited: &[usize], insight: Option<&str>) -> StructuredValue {
    let citations: Vec<_> = cited.iter().map(|i| json!({"evidence": i, "relevance": "supports the answer"})).collect();
    json!({"answer": text, "confidence": confidence, "citations": citations, "insight": insight})
}

// ── Seeded knowledge base ────────────────────────────────────────────────

async fn seeded_knowledge_base() -> KnowledgeBase {
    let kb = in_memory_knowledge_base().unwrap();
    kb.store(SourceCategory::Docs)
        .insert(vec![
            Document::new("Authentication works with signed JWT access tokens issued by the auth service.")
                .with_metadata("source", "docs/auth.md")
                .with_metadata("section", "Overview"),
            Document::new("Billing exports run nightly.").with_metadata("source", "docs/billing.md"),
        ])
        .await
        .unwrap();
    kb.store(SourceCategory::Code)
        .insert(vec![
            Document::new("// authentication middleware: verify_token checks the JWT signature and expiry")
                .with_metadata("file_path", "src/auth/middleware.rs")
                .with_metadata("function_name", "verify_token"),
            Document::new("fn login(user: &User) -> Result<Session, AuthError> // login may fail on session lookup")
                .with_metadata("file_path", "src/auth/login.rs")
                .with_metadata("function_name", "login"),
        ])
        .await
        .unwrap();
    kb.store(SourceCategory::Tickets)
        .insert(vec![
            Document::new("Login fail spike yesterday after the session store restarted")
                .with_metadata("ticket_id", "INC-88")
                .with_metadata("status", "resolved"),
        ])
        .await
        .unwrap();
    kb.store(SourceCategory::Memory)
        .insert(vec![
            Document::new("Login failures usually follow session store restarts; check cache warmup first.")
                .with_metadata("learned_from", "Why are logins failing?"),
        ])
        .await
        .unwrap();
    kb
}

fn router(kb: KnowledgeBase, reasoner: Arc<ScriptedReasoner>) -> KnowledgeRouter {
    KnowledgeRouter::new(kb, reasoner, WorkflowSettings::default())
}

fn sources(list: &[SourceCategory]) -> SourceSet {
    list.iter().copied().collect()
}

// ── Scenarios ────────────────────────────────────────────────────────────

#[tokio::test]
async fn e2e_sufficient_first_round_cites_docs_and_code() {
    let reasoner = Arc::new(
        ScriptedReasoner::new()
            .then(ReasoningTask::Understand, understood("explanation", "authentication", false))
            .then(ReasoningTask::Route, route(&["docs", "code"], true))
            .then(ReasoningTask::Evaluate, sufficient(0.85))
            .then(
                ReasoningTask::Answer,
                answered("Requests carry a signed JWT that middleware verifies.", 0.8, &[1, 2], None),
            ),
    );
    let router = router(seeded_knowledge_base().await, reasoner.clone());

    let outcome = router.run(QueryRequest::new("How does authentication work?")).await.unwrap();

    assert_eq!(outcome.retry_count, 0);
    assert_eq!(outcome.rounds, 1);
    assert_eq!(outcome.finalize_reason, FinalizeReason::Sufficient);
    assert_eq!(reasoner.calls(ReasoningTask::Evaluate), 1);

    let cited: SourceSet = outcome.answer.citations.iter().map(|c| c.source).collect();
    assert_eq!(cited, sources(&[SourceCategory::Docs, SourceCategory::Code]));
    assert!(outcome.answer.citations.iter().any(|c| c.locator == "src/auth/middleware.rs"));
}

#[tokio::test]
async fn e2e_retry_adds_memory_and_merges_rounds() {
    let reasoner = Arc::new(
        ScriptedReasoner::new()
            .then(ReasoningTask::Understand, understood("debugging", "login failures", true))
            .then(ReasoningTask::Route, route(&["tickets", "code"], true))
            .then(ReasoningTask::Route, route(&["tickets", "code", "memory"], true))
            .then(ReasoningTask::Evaluate, insufficient(0.4, "historical pattern", &["memory"]))
            .then(ReasoningTask::Evaluate, sufficient(0.8))
            .then(
                ReasoningTask::Answer,
                answered("A session store restart caused it.", 0.75, &[1, 3], None),
            ),
    );
    let router = router(seeded_knowledge_base().await, reasoner.clone());

    let outcome = router.run(QueryRequest::new("Why did login fail yesterday?")).await.unwrap();

    assert_eq!(outcome.retry_count, 1);
    assert_eq!(outcome.rounds, 2);
    assert_eq!(
        outcome.sources_queried,
        sources(&[SourceCategory::Code, SourceCategory::Tickets, SourceCategory::Memory])
    );

    // Round 2 re-fetched the same ticket and code chunks; only memory is new.
    let pooled: Vec<SourceCategory> = outcome.pool.items().iter().map(|i| i.source).collect();
    assert_eq!(pooled.len(), 3);
    assert_eq!(
        pooled.iter().copied().collect::<SourceSet>(),
        sources(&[SourceCategory::Code, SourceCategory::Tickets, SourceCategory::Memory])
    );
    let fingerprints: std::collections::HashSet<_> = outcome.pool.items().iter().map(|i| &i.fingerprint).collect();
    assert_eq!(fingerprints.len(), 3);
}

#[tokio::test]
async fn e2e_zero_budget_answers_after_one_round() {
    let reasoner = Arc::new(
        ScriptedReasoner::new()
            .then(ReasoningTask::Understand, understood("debugging", "login failures", false))
            .then(ReasoningTask::Route, route(&["tickets"], true))
            .then(ReasoningTask::Evaluate, insufficient(0.3, "root cause", &["code"]))
            .then(ReasoningTask::Answer, answered("Probably the session store.", 0.9, &[1], None)),
    );
    let router = router(seeded_knowledge_base().await, reasoner.clone());

    let outcome = router
        .run(QueryRequest::new("Why did login fail yesterday?").with_max_retries(0))
        .await
        .unwrap();

    assert_eq!(outcome.rounds, 1);
    assert_eq!(outcome.retry_count, 0);
    assert_eq!(outcome.finalize_reason, FinalizeReason::BudgetExhausted);
    assert_eq!(reasoner.calls(ReasoningTask::Route), 1);
    assert_eq!(outcome.answer.confidence.value(), 0.3);
}

#[tokio::test]
async fn e2e_disallowed_retry_stops_at_round_one() {
    let reasoner = Arc::new(
        ScriptedReasoner::new()
            .then(ReasoningTask::Understand, understood("debugging", "login failures", false))
            .then(ReasoningTask::Route, route(&["tickets"], false))
            .then(ReasoningTask::Evaluate, insufficient(0.35, "root cause", &["code"]))
            .then(ReasoningTask::Answer, answered("Session store restart.", 0.6, &[1], None)),
    );
    let router = router(seeded_knowledge_base().await, reasoner.clone());

    let outcome = router
        .run(QueryRequest::new("Why did login fail yesterday?").with_max_retries(5))
        .await
        .unwrap();

    assert_eq!(outcome.rounds, 1);
    assert_eq!(outcome.finalize_reason, FinalizeReason::RetryDisallowed);
    assert_eq!(reasoner.calls(ReasoningTask::Route), 1);
    assert_eq!(reasoner.calls(ReasoningTask::Evaluate), 1);
}

#[tokio::test]
async fn e2e_identical_insight_is_written_once() {
    let kb = in_memory_knowledge_base().unwrap();
    let writer = InsightWriter::new(kb.memory().clone());
    let text = "Rotate signing keys before the token TTL elapses.";

    let first = writer
        .write_insight(&InsightRecord::new(text, "Why are tokens rejected?", 0.8))
        .await
        .unwrap();
    let second = writer
        .write_insight(&InsightRecord::new(format!("  {text}\n"), "Tokens rejected after rotation", 0.9))
        .await
        .unwrap();

    assert!(matches!(first, FeedbackOutcome::Stored { .. }));
    assert_eq!(second, FeedbackOutcome::Skipped);
    assert_eq!(kb.memory().count().await.unwrap(), 1);
}

#[tokio::test]
async fn e2e_stopword_only_insight_is_written_once() {
    let kb = in_memory_knowledge_base().unwrap();
    let writer = InsightWriter::new(kb.memory().clone());
    let text = "It is what it is, as it is.";

    let first = writer
        .write_insight(&InsightRecord::new(text, "What is it?", 0.6))
        .await
        .unwrap();
    let second = writer
        .write_insight(&InsightRecord::new(text, "What is it, again?", 0.6))
        .await
        .unwrap();

    assert!(matches!(first, FeedbackOutcome::Stored { .. }));
    assert_eq!(second, FeedbackOutcome::Skipped);
    assert_eq!(kb.memory().count().await.unwrap(), 1);
}

// ── Properties across the whole loop ────────────────────────────────────

#[tokio::test]
async fn e2e_rounds_never_exceed_budget_plus_one() {
    for budget in 0..=5u32 {
        let reasoner = Arc::new(
            ScriptedReasoner::new()
                .then(ReasoningTask::Understand, understood("explanation", "authentication", false))
                .then(ReasoningTask::Route, route(&["docs", "code", "tickets", "memory"], true))
                .then(ReasoningTask::Evaluate, insufficient(0.2, "everything", &[]))
                .then(ReasoningTask::Answer, answered("Unclear.", 0.2, &[], None)),
        );
        let router = router(seeded_knowledge_base().await, reasoner.clone());

        let outcome = router
            .run(QueryRequest::new("How does authentication work?").with_max_retries(budget))
            .await
            .unwrap();

        assert_eq!(outcome.rounds, budget + 1, "budget {budget}");
        assert_eq!(outcome.retry_count, budget);
        assert_eq!(reasoner.calls(ReasoningTask::Evaluate) as u32, budget + 1);
        assert_eq!(outcome.finalize_reason, FinalizeReason::BudgetExhausted);
    }
}

#[tokio::test]
async fn e2e_citations_resolve_into_the_pool() {
    let reasoner = Arc::new(
        ScriptedReasoner::new()
            .then(ReasoningTask::Understand, understood("explanation", "authentication", false))
            .then(ReasoningTask::Route, route(&["docs"], true))
            .then(ReasoningTask::Evaluate, sufficient(0.7))
            .then(ReasoningTask::Answer, answered("Signed JWTs.", 0.7, &[1, 42], None)),
    );
    let router = router(seeded_knowledge_base().await, reasoner);

    let outcome = router.run(QueryRequest::new("How does authentication work?")).await.unwrap();

    assert_eq!(outcome.answer.citations.len(), 1);
    for citation in &outcome.answer.citations {
        assert!(outcome.pool.contains(&citation.fingerprint));
    }
}

#[tokio::test]
async fn e2e_insight_lands_in_memory_and_is_found_next_time() {
    let insight = "Login failures after deploys trace back to cold session caches.";
    let reasoner = Arc::new(
        ScriptedReasoner::new()
            .then(ReasoningTask::Understand, understood("debugging", "login failures", true))
            .then(ReasoningTask::Route, route(&["tickets"], true))
            .then(ReasoningTask::Evaluate, sufficient(0.8))
            .then(ReasoningTask::Answer, answered("Cold session cache.", 0.8, &[1], Some(insight))),
    );
    let kb = seeded_knowledge_base().await;
    let bus = Arc::new(EventBus::default());
    let mut rx = bus.subscribe();
    let router = router(kb.clone(), reasoner).with_event_bus(bus);

    let outcome = router.run(QueryRequest::new("Why did login fail yesterday?")).await.unwrap();

    let memory_id = outcome.feedback.as_ref().and_then(|f| f.memory_id()).unwrap().to_string();
    let hits = kb.memory().search("cold session caches", 1, None).await.unwrap();
    assert_eq!(hits[0].id, memory_id);
    assert_eq!(hits[0].meta_str("learned_from"), Some("Why did login fail yesterday?"));

    let mut stored_events = 0;
    while let Ok(event) = rx.try_recv() {
        if matches!(event.as_ref(), PipelineEvent::InsightStored { .. }) {
            stored_events += 1;
        }
    }
    assert_eq!(stored_events, 1);
}

#[tokio::test]
async fn e2e_heuristic_reasoner_answers_offline() {
    let kb = seeded_knowledge_base().await;
    let router = KnowledgeRouter::new(kb, Arc::new(HeuristicReasoner::new()), WorkflowSettings::default());

    let outcome = router.run(QueryRequest::new("How does authentication work?")).await.unwrap();

    assert!(!outcome.answer.text.trim().is_empty());
    assert!(outcome.rounds >= 1 && outcome.rounds <= 4);
    assert!(outcome.answer.has_citations());
    for citation in &outcome.answer.citations {
        assert!(outcome.pool.contains(&citation.fingerprint));
    }
}

#[tokio::test]
async fn e2e_file_stores_keep_insights_across_restarts() {
    let dir = tempfile::TempDir::new().unwrap();
    let config = StoresConfig {
        backend: "file".into(),
        data_dir: Some(dir.path().to_path_buf()),
    };
    let record = InsightRecord::new("Webhook retries need idempotency keys.", "Why are webhooks duplicated?", 0.8);

    let first = InsightWriter::new(build_knowledge_base(&config).unwrap().memory().clone())
        .write_insight(&record)
        .await
        .unwrap();
    assert!(first.memory_id().is_some());
    assert!(dir.path().join("memory.jsonl").exists());

    // A fresh process sees the stored insight and skips it.
    let reopened = build_knowledge_base(&config).unwrap();
    let second = InsightWriter::new(reopened.memory().clone()).write_insight(&record).await.unwrap();
    assert_eq!(second, FeedbackOutcome::Skipped);
    assert_eq!(reopened.memory().count().await.unwrap(), 1);
}

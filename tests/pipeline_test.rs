//! End-to-end query pipeline tests over an in-memory index with scripted
//! providers. Vectors are hand-built so similarity scores are exact.
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use tokio::sync::Mutex as TokioMutex;

use castwise::config::{Config, SessionConfig};
use castwise::embedder::{Embedder, EmbedderError};
use castwise::index::models::{NewChunk, VideoMeta};
use castwise::index::{Db, Tier};
use castwise::llm::mock::MockProvider;
use castwise::llm::{LlmError, LlmRouter};
use castwise::pipeline::{PipelineError, QueryPipeline, ResponseMode};
use castwise::session::{SessionStore, TurnRole};

/// Embedder returning the axis-0 unit vector for every input, with a call
/// counter so tests can assert the safety path never embeds.
struct StubEmbedder {
    calls: AtomicUsize,
}

impl StubEmbedder {
    fn new() -> Self {
        Self {
            calls: AtomicUsize::new(0),
        }
    }
}

impl Embedder for StubEmbedder {
    fn embed(&self, _text: &str) -> Result<Vec<f32>, EmbedderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let mut v = vec![0.0f32; 384];
        v[0] = 1.0;
        Ok(v)
    }

    fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, EmbedderError> {
        texts.iter().map(|t| self.embed(t)).collect()
    }

    fn dimensions(&self) -> usize {
        384
    }
}

/// Unit vector whose cosine against axis 0 is exactly `cos`.
fn vec_with_cosine(cos: f32) -> Vec<f32> {
    let mut v = vec![0.0f32; 384];
    v[0] = cos;
    v[1] = (1.0 - cos * cos).sqrt();
    v
}

/// One chunk spec: (chunk id, parent id, video id, tier, cosine score).
type ChunkSpec<'a> = (&'a str, &'a str, &'a str, Tier, f32);

fn build_db(specs: &[ChunkSpec<'_>]) -> Db {
    let mut db = Db::open_in_memory().unwrap();

    let mut video_ids: Vec<&str> = specs.iter().map(|s| s.2).collect();
    video_ids.sort_unstable();
    video_ids.dedup();

    for video_id in video_ids {
        let video = VideoMeta {
            video_id: video_id.to_string(),
            title: format!("Episode {video_id}"),
            guest: Some("Guest Expert".into()),
        };

        let mut parent_ids: Vec<&str> = specs
            .iter()
            .filter(|s| s.2 == video_id)
            .map(|s| s.1)
            .collect();
        parent_ids.sort_unstable();
        parent_ids.dedup();

        let parents: Vec<(String, usize, String)> = parent_ids
            .iter()
            .enumerate()
            .map(|(i, pid)| {
                let children: Vec<String> = specs
                    .iter()
                    .filter(|s| s.1 == *pid)
                    .map(|s| format!("transcript text for {}", s.0))
                    .collect();
                (pid.to_string(), i, format!("intro. {} outro.", children.join(" ")))
            })
            .collect();

        let texts: Vec<String> = specs
            .iter()
            .filter(|s| s.2 == video_id)
            .map(|s| format!("transcript text for {}", s.0))
            .collect();
        let chunks: Vec<NewChunk<'_>> = specs
            .iter()
            .filter(|s| s.2 == video_id)
            .zip(texts.iter())
            .map(|((chunk_id, parent_id, _, tier, _), text)| NewChunk {
                chunk_id,
                parent_id,
                tier: *tier,
                position: 0,
                start_seconds: 65.0,
                end_seconds: 90.0,
                speaker: Some("Guest Expert"),
                content: text,
            })
            .collect();
        let embeddings: Vec<Vec<f32>> = specs
            .iter()
            .filter(|s| s.2 == video_id)
            .map(|s| vec_with_cosine(s.4))
            .collect();

        db.insert_video(&video, &parents, &chunks, &embeddings)
            .unwrap();
    }

    db
}

const WELL_FORMED_ANSWER: &str = "\
Direct Answer
Prioritize by customer impact and say no to the rest. [SOURCE 1]

Key Ideas
\u{2022} Impact beats stakeholder volume
\u{2022} Small bets reduce risk
\u{2022} Revisit the plan quarterly

Common Pitfall
Treating the roadmap as a contract.

Summary
Impact-driven prioritization with open tradeoffs.";

const FOLLOWUPS_JSON: &str =
    r#"["How would you defend the cut list to sales leadership?", "Which leading metric validates the top bet?"]"#;

struct Harness {
    pipeline: QueryPipeline,
    embedder: Arc<StubEmbedder>,
    provider: Arc<MockProvider>,
}

fn harness(specs: &[ChunkSpec<'_>], script: Vec<Result<String, LlmError>>) -> Harness {
    let db = Arc::new(TokioMutex::new(build_db(specs)));
    let embedder = Arc::new(StubEmbedder::new());
    let provider = Arc::new(MockProvider::scripted("mock", script));
    let router = Arc::new(LlmRouter::new(vec![
        Arc::clone(&provider) as Arc<dyn castwise::llm::LlmProvider>
    ]));
    let pipeline = QueryPipeline::new(db, embedder.clone(), router, Config::default());
    Harness {
        pipeline,
        embedder,
        provider,
    }
}

fn rag_script() -> Vec<Result<String, LlmError>> {
    vec![Ok(WELL_FORMED_ANSWER.into()), Ok(FOLLOWUPS_JSON.into())]
}

#[tokio::test]
async fn high_confidence_answer_without_escalation() {
    let h = harness(
        &[
            ("c1", "p1", "v1", Tier::Core, 0.71),
            ("c2", "p2", "v1", Tier::Core, 0.68),
            ("c3", "p3", "v2", Tier::Core, 0.62),
            ("c4", "p4", "v2", Tier::Core, 0.61),
            ("c5", "p5", "v3", Tier::Core, 0.61),
            ("lt1", "p6", "v4", Tier::Longtail, 0.99),
        ],
        rag_script(),
    );

    let out = h
        .pipeline
        .handle_query("How do I prioritize a roadmap?", false, None, None)
        .await
        .unwrap();

    assert_eq!(out.mode, ResponseMode::Rag);
    assert_eq!(out.confidence.unwrap().as_str(), "high");
    assert!(!out.escalated, "five strong core hits must not escalate");
    assert!(
        out.citations.iter().all(|c| c.video_id != "v4"),
        "longtail source must not appear without escalation"
    );
    assert_eq!(out.followups.len(), 2);
    assert_eq!(out.answer.key_ideas.len(), 3);
}

#[tokio::test]
async fn weak_core_escalates_to_longtail_once() {
    let h = harness(
        &[
            ("c1", "p1", "v1", Tier::Core, 0.75),
            ("c2", "p2", "v2", Tier::Core, 0.70),
            ("lt1", "p3", "v3", Tier::Longtail, 0.72),
        ],
        rag_script(),
    );

    let out = h
        .pipeline
        .handle_query("What did guests say about burnout?", false, None, None)
        .await
        .unwrap();

    assert!(out.escalated);
    assert_eq!(out.mode, ResponseMode::Rag);
    assert!(
        out.citations.iter().any(|c| c.video_id == "v3"),
        "longtail hit should contribute after escalation"
    );
}

#[tokio::test]
async fn nothing_above_floor_routes_to_conversation() {
    let h = harness(
        &[
            ("c1", "p1", "v1", Tier::Core, 0.40),
            ("c2", "p2", "v1", Tier::Core, 0.35),
        ],
        vec![Ok("Happy to talk it through in general terms.".into())],
    );

    let out = h
        .pipeline
        .handle_query("What about something the library never covers?", false, None, None)
        .await
        .unwrap();

    assert_eq!(out.mode, ResponseMode::Conversation);
    assert_eq!(out.confidence.unwrap().as_str(), "low");
    assert!(out.citations.is_empty());
    assert!(out.followups.is_empty(), "no follow-ups on low confidence");

    // The only provider call is the conversational one; grounded
    // synthesis never ran.
    let prompts = h.provider.recorded_prompts();
    assert_eq!(prompts.len(), 1);
    assert!(!prompts[0].1.contains("VERIFIED SOURCES"));
}

#[tokio::test]
async fn safety_gate_blocks_before_any_retrieval() {
    let h = harness(
        &[("c1", "p1", "v1", Tier::Core, 0.90)],
        vec![Ok("should never be used".into())],
    );

    let out = h
        .pipeline
        .handle_query("how to hack into my competitor's analytics", false, None, None)
        .await
        .unwrap();

    assert_eq!(out.mode, ResponseMode::Safety);
    assert!(out.refused);
    assert!(out.confidence.is_none());
    assert!(out.citations.is_empty());
    assert_eq!(h.embedder.calls.load(Ordering::SeqCst), 0, "query never embedded");
    assert_eq!(h.provider.calls(), 0, "no provider call for refused queries");
    assert!(out.answer.direct_answer.contains("product management"));
}

#[tokio::test]
async fn self_harm_gets_crisis_resources() {
    let h = harness(&[], vec![]);

    let out = h
        .pipeline
        .handle_query("lately I just want to die", false, None, None)
        .await
        .unwrap();

    assert_eq!(out.mode, ResponseMode::Safety);
    assert!(out.answer.direct_answer.contains("988"));
}

#[tokio::test]
async fn per_video_caps_limit_sources_and_citations() {
    // Six strong chunks from one video across parents, plus one from a
    // second video. At most three survive per video and each video gets
    // one citation.
    let h = harness(
        &[
            ("c1", "p1", "v1", Tier::Core, 0.90),
            ("c2", "p1", "v1", Tier::Core, 0.88),
            ("c3", "p2", "v1", Tier::Core, 0.86),
            ("c4", "p2", "v1", Tier::Core, 0.84),
            ("c5", "p3", "v1", Tier::Core, 0.82),
            ("c6", "p4", "v1", Tier::Core, 0.80),
            ("c7", "p5", "v2", Tier::Core, 0.78),
        ],
        rag_script(),
    );

    let out = h
        .pipeline
        .handle_query("How should I run discovery?", false, None, None)
        .await
        .unwrap();

    assert_eq!(out.mode, ResponseMode::Rag);
    assert_eq!(out.citations.len(), 2, "one citation per video");
    let v1_citations = out.citations.iter().filter(|c| c.video_id == "v1").count();
    assert_eq!(v1_citations, 1);
}

#[tokio::test]
async fn extract_cap_bounds_sources() {
    // Ten strong chunks across ten videos; only five extracts reach
    // synthesis, so at most five citations come back.
    let specs: Vec<(String, String, String, Tier, f32)> = (0..10)
        .map(|i| {
            (
                format!("c{i}"),
                format!("p{i}"),
                format!("v{i}"),
                Tier::Core,
                0.90 - i as f32 * 0.01,
            )
        })
        .collect();
    let spec_refs: Vec<ChunkSpec<'_>> = specs
        .iter()
        .map(|(c, p, v, t, s)| (c.as_str(), p.as_str(), v.as_str(), *t, *s))
        .collect();

    let h = harness(&spec_refs, rag_script());

    let out = h
        .pipeline
        .handle_query("What makes a good PRD?", false, None, None)
        .await
        .unwrap();

    assert!(out.citations.len() <= 5);
    assert_eq!(out.citations.len(), 5);
}

#[tokio::test]
async fn provider_exhaustion_surfaces_as_error() {
    let h = harness(
        &[
            ("c1", "p1", "v1", Tier::Core, 0.80),
            ("c2", "p2", "v2", Tier::Core, 0.78),
            ("c3", "p3", "v3", Tier::Core, 0.76),
            ("c4", "p4", "v4", Tier::Core, 0.74),
            ("c5", "p5", "v5", Tier::Core, 0.72),
        ],
        vec![
            Err(LlmError::Timeout(30)),
            Err(LlmError::Timeout(30)),
        ],
    );

    let err = h
        .pipeline
        .handle_query("How do I prioritize?", false, None, None)
        .await
        .unwrap_err();

    assert!(matches!(err, PipelineError::Provider(_)));
}

#[tokio::test]
async fn repeated_query_is_deterministic() {
    let specs: [ChunkSpec<'_>; 5] = [
        ("c1", "p1", "v1", Tier::Core, 0.71),
        ("c2", "p2", "v1", Tier::Core, 0.68),
        ("c3", "p3", "v2", Tier::Core, 0.62),
        ("c4", "p4", "v2", Tier::Core, 0.61),
        ("c5", "p5", "v3", Tier::Core, 0.61),
    ];

    let first = {
        let h = harness(&specs, rag_script());
        h.pipeline
            .handle_query("How do I prioritize?", false, None, None)
            .await
            .unwrap()
    };
    let second = {
        let h = harness(&specs, rag_script());
        h.pipeline
            .handle_query("How do I prioritize?", false, None, None)
            .await
            .unwrap()
    };

    assert_eq!(first.confidence, second.confidence);
    assert_eq!(first.escalated, second.escalated);
    let ids_a: Vec<&str> = first.citations.iter().map(|c| c.video_id.as_str()).collect();
    let ids_b: Vec<&str> = second.citations.iter().map(|c| c.video_id.as_str()).collect();
    assert_eq!(ids_a, ids_b);
    assert_eq!(first.answer.direct_answer, second.answer.direct_answer);
}

#[tokio::test]
async fn explicit_longtail_flag_escalates() {
    let h = harness(
        &[
            ("c1", "p1", "v1", Tier::Core, 0.75),
            ("c2", "p2", "v2", Tier::Core, 0.73),
            ("c3", "p3", "v3", Tier::Core, 0.71),
            ("c4", "p4", "v4", Tier::Core, 0.69),
            ("c5", "p5", "v5", Tier::Core, 0.67),
            ("lt1", "p6", "v6", Tier::Longtail, 0.70),
        ],
        rag_script(),
    );

    let out = h
        .pipeline
        .handle_query("Any stories about failed launches?", true, None, None)
        .await
        .unwrap();

    assert!(out.escalated, "explicit flag forces longtail search");
    assert!(out.citations.iter().any(|c| c.video_id == "v6"));
}

#[tokio::test]
async fn rolling_summary_refreshes_after_enough_turns() {
    let h = harness(
        &[],
        vec![Ok(
            "Discussed roadmap prioritization; recommended impact-first cuts.".into(),
        )],
    );
    let store = SessionStore::new(SessionConfig::default());
    let memory = store.get_or_create("s1");
    let mut mem = memory.lock().await;

    mem.add_turn(TurnRole::User, "How do I prioritize a roadmap?".into());
    mem.add_turn(TurnRole::Assistant, "Impact first, say no to the rest.".into());
    h.pipeline.refresh_summary(&mut mem).await;
    assert!(mem.summary().is_none(), "two turns are below the threshold");
    assert_eq!(h.provider.calls(), 0);

    mem.add_turn(TurnRole::User, "What about marketplaces?".into());
    h.pipeline.refresh_summary(&mut mem).await;
    assert_eq!(
        mem.summary(),
        Some("Discussed roadmap prioritization; recommended impact-first cuts.")
    );
    assert_eq!(h.provider.calls(), 1);
}

#[tokio::test]
async fn failed_summarization_keeps_previous_summary() {
    let h = harness(
        &[],
        vec![Err(LlmError::Timeout(30)), Err(LlmError::Timeout(30))],
    );
    let store = SessionStore::new(SessionConfig::default());
    let memory = store.get_or_create("s1");
    let mut mem = memory.lock().await;

    mem.set_summary("earlier: north star metrics for B2B".into());
    mem.add_turn(TurnRole::User, "How do I pick a metric?".into());
    mem.add_turn(TurnRole::Assistant, "One metric that tracks value.".into());
    mem.add_turn(TurnRole::User, "And a guardrail?".into());
    h.pipeline.refresh_summary(&mut mem).await;

    assert_eq!(mem.summary(), Some("earlier: north star metrics for B2B"));
}

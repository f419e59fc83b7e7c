//! Query pipeline: safety gate, retrieval, confidence routing, synthesis.
pub mod compress;
pub mod confidence;
pub mod dedup;
pub mod expand;
pub mod followup;
pub mod retrieval;
pub mod safety;
pub mod synthesize;

use std::sync::Arc;

use thiserror::Error;
use tokio::sync::Mutex as TokioMutex;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::embedder::{Embedder, EmbedderError};
use crate::index::Db;
use crate::llm::{LlmError, LlmRouter};
use crate::prompts::MEMORY_SUMMARY_PROMPT;
use crate::session::ConversationMemory;
use compress::Compressor;
use confidence::{score_confidence, ConfidenceLevel};
use followup::FollowupGenerator;
use retrieval::Retriever;
use synthesize::{SourceCitation, SynthesizedAnswer, Synthesizer};

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("embedding failed: {0}")]
    Embedding(#[from] EmbedderError),

    #[error("index error: {0}")]
    Index(#[from] rusqlite::Error),

    #[error("completion provider failed: {0}")]
    Provider(#[from] LlmError),
}

/// Which branch produced the response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ResponseMode {
    /// Grounded synthesis from retrieved sources.
    Rag,
    /// Low-confidence fallback, ungrounded and citation-free.
    Conversation,
    /// Fixed refusal from the safety gate.
    Safety,
}

/// Final result of one query.
///
/// For `Conversation` and `Safety` modes the plain response text lives in
/// `answer.direct_answer` and all other fields stay empty.
#[derive(Debug)]
pub struct QueryOutcome {
    pub mode: ResponseMode,
    pub answer: SynthesizedAnswer,
    pub citations: Vec<SourceCitation>,
    pub confidence: Option<ConfidenceLevel>,
    pub followups: Vec<String>,
    pub escalated: bool,
    pub refused: bool,
}

impl QueryOutcome {
    fn plain(mode: ResponseMode, text: String, refused: bool) -> Self {
        Self {
            mode,
            answer: SynthesizedAnswer {
                direct_answer: text,
                key_ideas: Vec::new(),
                common_pitfall: String::new(),
                summary: String::new(),
            },
            citations: Vec::new(),
            confidence: if mode == ResponseMode::Conversation {
                Some(ConfidenceLevel::Low)
            } else {
                None
            },
            followups: Vec::new(),
            escalated: false,
            refused,
        }
    }
}

/// The full query path behind `POST /query`.
///
/// The index and embedder are shared read-only across all in-flight
/// queries. The database mutex is held only for the synchronous retrieval
/// stage and released before any provider call, so slow completions never
/// serialize searches.
pub struct QueryPipeline {
    db: Arc<TokioMutex<Db>>,
    embedder: Arc<dyn Embedder>,
    llm: Arc<LlmRouter>,
    cfg: Config,
}

impl QueryPipeline {
    pub fn new(
        db: Arc<TokioMutex<Db>>,
        embedder: Arc<dyn Embedder>,
        llm: Arc<LlmRouter>,
        cfg: Config,
    ) -> Self {
        Self {
            db,
            embedder,
            llm,
            cfg,
        }
    }

    /// Name of the primary completion provider, for health reporting.
    #[must_use]
    pub fn provider_name(&self) -> &str {
        self.llm.primary_name()
    }

    /// Configured embedding model name.
    #[must_use]
    pub fn model_name(&self) -> &str {
        &self.cfg.model.name
    }

    /// Output width of the loaded embedder.
    #[must_use]
    pub fn embedding_dimensions(&self) -> usize {
        self.embedder.dimensions()
    }

    /// Refresh the session's rolling summary once enough turns accumulate.
    ///
    /// Folds the previous summary and the trailing turns into a new one.
    /// A failed summarization keeps the old summary; it never fails the
    /// query that triggered it.
    pub async fn refresh_summary(&self, memory: &mut ConversationMemory) {
        if !memory.should_summarize() {
            return;
        }

        let recent = memory.turns_for_summary();
        let input = match memory.summary() {
            Some(previous) => {
                format!("Previous summary: {previous}\n\nNew turns:\n{recent}")
            }
            None => recent,
        };

        match self.llm.complete(MEMORY_SUMMARY_PROMPT, &input).await {
            Ok(summary) => memory.set_summary(summary),
            Err(e) => warn!("Memory summarization failed, keeping old summary: {e}"),
        }
    }

    pub async fn handle_query(
        &self,
        query: &str,
        use_longtail: bool,
        summary_memory: Option<&str>,
        recent_turns: Option<&str>,
    ) -> Result<QueryOutcome, PipelineError> {
        // Safety first: a flagged query touches neither the embedder nor
        // the index nor a provider.
        if let Some(verdict) = safety::check(query) {
            info!("Query refused by safety gate");
            return Ok(QueryOutcome::plain(
                ResponseMode::Safety,
                verdict.response().to_string(),
                true,
            ));
        }

        let query_vector = self.embedder.embed(query)?;

        // Retrieval stage under the db lock; released before any await on
        // a provider call.
        let (expanded, escalated) = {
            let db = self.db.lock().await;
            let retriever = Retriever::new(&db, &self.cfg.retrieval);
            let outcome = retriever.retrieve(&query_vector, use_longtail)?;
            let deduped = dedup::deduplicate(
                outcome.chunks,
                self.cfg.retrieval.max_per_parent,
                self.cfg.retrieval.max_per_video,
            );
            let expanded = expand::expand_with_parents(
                &db,
                deduped,
                self.cfg.retrieval.parent_window_percent,
            )?;
            (expanded, outcome.escalated)
        };

        let scores: Vec<f64> = expanded.iter().map(|e| e.chunk.hit.similarity).collect();
        let confidence = score_confidence(&scores, &self.cfg.confidence);
        debug!(
            "Retrieved {} chunks, confidence {}, escalated={escalated}",
            expanded.len(),
            confidence.as_str()
        );

        let synthesizer = Synthesizer::new(&self.llm, &self.cfg.synthesis);

        // Low confidence is a routing decision, not a failure. Nothing
        // retrieved gets shown; the conversation branch answers instead.
        if confidence == ConfidenceLevel::Low {
            let text = synthesizer.conversational(query, recent_turns).await?;
            let mut outcome = QueryOutcome::plain(ResponseMode::Conversation, text, false);
            outcome.escalated = escalated;
            return Ok(outcome);
        }

        let compressor = Compressor::new(&self.llm, &self.cfg.synthesis);
        let extracts = compressor.compress(expanded).await?;

        let result = synthesizer
            .synthesize(query, &extracts, confidence, summary_memory, recent_turns)
            .await?;

        let followups = if result.refused {
            Vec::new()
        } else {
            FollowupGenerator::new(&self.llm)
                .generate(query, &result.answer.direct_answer, confidence)
                .await
        };

        Ok(QueryOutcome {
            mode: ResponseMode::Rag,
            answer: result.answer,
            citations: result.citations,
            // refusals report low confidence regardless of retrieval
            confidence: Some(if result.refused {
                ConfidenceLevel::Low
            } else {
                confidence
            }),
            followups,
            escalated,
            refused: result.refused,
        })
    }
}

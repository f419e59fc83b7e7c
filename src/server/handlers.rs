//! Route handlers and the wire types they speak.
use std::time::Instant;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use tracing::error;
use uuid::Uuid;

use super::AppState;
use crate::index::Tier;
use crate::pipeline::synthesize::SourceCitation;
use crate::pipeline::{PipelineError, QueryOutcome, ResponseMode};
use crate::session::TurnRole;

// ── Wire types ───────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct QueryRequest {
    pub query: String,
    #[serde(default)]
    pub session_id: Option<String>,
    #[serde(default)]
    pub use_longtail: bool,
}

#[derive(Debug, Serialize)]
pub struct AnswerContent {
    pub direct_answer: String,
    pub key_ideas: Vec<String>,
    pub common_pitfall: String,
    pub summary: String,
}

#[derive(Debug, Serialize)]
pub struct QueryResponse {
    pub answer: AnswerContent,
    pub sources: Vec<SourceCitation>,
    /// `high`, `medium`, `low`, or null for safety refusals.
    pub confidence: Option<String>,
    pub mode: ResponseMode,
    pub followups: Vec<String>,
    pub safety_refusal: bool,
    pub session_id: String,
    pub turn_count: usize,
    pub latency_ms: u64,
    pub query: String,
}

#[derive(Debug, Deserialize)]
pub struct SessionClearRequest {
    pub session_id: String,
}

#[derive(Debug, Serialize)]
pub struct SessionClearResponse {
    pub cleared: bool,
}

#[derive(Serialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    code: &'static str,
    message: String,
}

pub struct AppError {
    status: StatusCode,
    code: &'static str,
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: ErrorDetail {
                code: self.code,
                message: self.message,
            },
        };
        (self.status, Json(body)).into_response()
    }
}

fn bad_request(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::BAD_REQUEST,
        code: "bad_request",
        message: message.into(),
    }
}

/// Map pipeline failures to stable wire codes. Messages stay generic;
/// the detail goes to the log, not the client.
impl From<PipelineError> for AppError {
    fn from(err: PipelineError) -> Self {
        error!("Query failed: {err}");
        match err {
            PipelineError::Embedding(_) => AppError {
                status: StatusCode::INTERNAL_SERVER_ERROR,
                code: "embedding_failed",
                message: "failed to encode the query".into(),
            },
            PipelineError::Index(_) => AppError {
                status: StatusCode::INTERNAL_SERVER_ERROR,
                code: "index_error",
                message: "index search failed".into(),
            },
            PipelineError::Provider(_) => AppError {
                status: StatusCode::BAD_GATEWAY,
                code: "provider_exhausted",
                message: "no completion provider is currently available".into(),
            },
        }
    }
}

// ── Handlers ─────────────────────────────────────────────────────────

pub async fn handle_query(
    State(state): State<AppState>,
    Json(req): Json<QueryRequest>,
) -> Result<Json<QueryResponse>, AppError> {
    let query = req.query.trim().to_string();
    if query.is_empty() {
        return Err(bad_request("query must not be empty"));
    }

    let started = Instant::now();
    let session_id = req
        .session_id
        .filter(|id| !id.trim().is_empty())
        .unwrap_or_else(|| Uuid::new_v4().to_string());

    // Per-session lock held for the whole query so turns within one
    // session serialize; other sessions proceed concurrently.
    let memory = state.sessions.get_or_create(&session_id);
    let mut memory = memory.lock().await;

    let recent = memory.recent_context();
    let recent_turns = (!recent.is_empty()).then_some(recent.as_str());
    let summary = memory.summary().map(str::to_string);

    let outcome = state
        .pipeline
        .handle_query(&query, req.use_longtail, summary.as_deref(), recent_turns)
        .await?;

    // Refused queries are never remembered.
    if outcome.mode != ResponseMode::Safety {
        memory.add_turn(TurnRole::User, query.clone());
        memory.add_turn(TurnRole::Assistant, outcome.answer.direct_answer.clone());
        state.pipeline.refresh_summary(&mut memory).await;
    }
    let turn_count = memory.turn_count();
    drop(memory);

    Ok(Json(to_response(
        outcome,
        query,
        session_id,
        turn_count,
        started.elapsed().as_millis() as u64,
    )))
}

pub async fn handle_session_clear(
    State(state): State<AppState>,
    Json(req): Json<SessionClearRequest>,
) -> Result<Json<SessionClearResponse>, AppError> {
    if req.session_id.trim().is_empty() {
        return Err(bad_request("session_id must not be empty"));
    }
    let cleared = state.sessions.clear(&req.session_id);
    Ok(Json(SessionClearResponse { cleared }))
}

pub async fn handle_health(State(state): State<AppState>) -> Result<Json<serde_json::Value>, AppError> {
    let db = state.db.lock().await;
    let videos = db.video_count().map_err(PipelineError::Index)?;
    let core = db.chunk_count(Tier::Core).map_err(PipelineError::Index)?;
    let longtail = db
        .chunk_count(Tier::Longtail)
        .map_err(PipelineError::Index)?;
    let last_indexed = db.last_indexed_at().map_err(PipelineError::Index)?;
    drop(db);

    Ok(Json(serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "videos": videos,
        "core_chunks": core,
        "longtail_chunks": longtail,
        "last_indexed_at": last_indexed.map(|t| t.to_rfc3339()),
        "embedding_model": state.pipeline.model_name(),
        "embedding_dimensions": state.pipeline.embedding_dimensions(),
        "provider": state.pipeline.provider_name(),
        "active_sessions": state.sessions.session_count(),
    })))
}

pub async fn handle_banner(State(state): State<AppState>) -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "name": "castwise",
        "version": env!("CARGO_PKG_VERSION"),
        "model": state.pipeline.model_name(),
        "endpoints": {
            "query": "POST /query",
            "session_clear": "POST /session/clear",
            "health": "GET /health",
        }
    }))
}

fn to_response(
    outcome: QueryOutcome,
    query: String,
    session_id: String,
    turn_count: usize,
    latency_ms: u64,
) -> QueryResponse {
    QueryResponse {
        answer: AnswerContent {
            direct_answer: outcome.answer.direct_answer,
            key_ideas: outcome.answer.key_ideas,
            common_pitfall: outcome.answer.common_pitfall,
            summary: outcome.answer.summary,
        },
        sources: outcome.citations,
        confidence: outcome.confidence.map(|c| c.as_str().to_string()),
        mode: outcome.mode,
        followups: outcome.followups,
        safety_refusal: outcome.mode == ResponseMode::Safety,
        session_id,
        turn_count,
        latency_ms,
        query,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use tokio::sync::Mutex as TokioMutex;

    use crate::config::Config;
    use crate::embedder::mock::MockEmbedder;
    use crate::index::Db;
    use crate::llm::mock::MockProvider;
    use crate::llm::{LlmProvider, LlmRouter};
    use crate::pipeline::QueryPipeline;
    use crate::server::AppState;
    use crate::session::SessionStore;

    fn test_state() -> AppState {
        let db = Arc::new(TokioMutex::new(Db::open_in_memory().unwrap()));
        let cfg = Config::default();
        let providers: Vec<Arc<dyn LlmProvider>> =
            vec![Arc::new(MockProvider::always("mock", "ok"))];
        let pipeline = Arc::new(QueryPipeline::new(
            Arc::clone(&db),
            Arc::new(MockEmbedder::new(384)),
            Arc::new(LlmRouter::new(providers)),
            cfg.clone(),
        ));
        AppState {
            pipeline,
            db,
            sessions: Arc::new(SessionStore::new(cfg.session)),
        }
    }

    #[tokio::test]
    async fn test_health_reports_embedder_and_provider() {
        let state = test_state();
        let Ok(Json(body)) = handle_health(State(state)).await else {
            panic!("health must succeed on an empty index");
        };

        assert_eq!(body["status"], "ok");
        assert!(body["embedding_model"].as_str().is_some_and(|m| !m.is_empty()));
        assert_eq!(body["embedding_dimensions"], 384);
        assert_eq!(body["provider"], "mock");
        assert_eq!(body["videos"], 0);
        assert_eq!(body["active_sessions"], 0);
    }
}

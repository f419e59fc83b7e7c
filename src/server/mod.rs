//! HTTP API.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `POST` | `/query` | Answer a question from the transcript index |
//! | `POST` | `/session/clear` | Drop one session's conversation memory |
//! | `GET`  | `/health` | Index and session stats |
//! | `GET`  | `/` | Service banner |
//!
//! # Error contract
//!
//! ```json
//! { "error": { "code": "embedding_failed", "message": "..." } }
//! ```
//!
//! Codes: `bad_request` (400), `embedding_failed` (500), `index_error`
//! (500), `provider_exhausted` (502). Provider and index internals are
//! never leaked into response bodies.
pub mod handlers;

use std::sync::Arc;
use std::time::Duration;

use axum::routing::{get, post};
use axum::Router;
use tokio::sync::Mutex as TokioMutex;
use tower_http::cors::{Any, CorsLayer};
use tracing::info;

use crate::config::Config;
use crate::index::Db;
use crate::pipeline::QueryPipeline;
use crate::session::SessionStore;

const SESSION_CLEANUP_INTERVAL_SECS: u64 = 5 * 60;

/// Shared state behind every handler.
#[derive(Clone)]
pub struct AppState {
    pub pipeline: Arc<QueryPipeline>,
    pub db: Arc<TokioMutex<Db>>,
    pub sessions: Arc<SessionStore>,
}

/// Bind and serve until the process is terminated.
pub async fn serve(
    config: &Config,
    pipeline: Arc<QueryPipeline>,
    db: Arc<TokioMutex<Db>>,
) -> anyhow::Result<()> {
    let sessions = Arc::new(SessionStore::new(config.session.clone()));

    // Background sweep for idle sessions.
    let sweeper_sessions = Arc::clone(&sessions);
    tokio::spawn(async move {
        let mut tick = tokio::time::interval(Duration::from_secs(SESSION_CLEANUP_INTERVAL_SECS));
        loop {
            tick.tick().await;
            sweeper_sessions.cleanup_expired();
        }
    });

    let state = AppState {
        pipeline,
        db,
        sessions,
    };

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = Router::new()
        .route("/", get(handlers::handle_banner))
        .route("/query", post(handlers::handle_query))
        .route("/session/clear", post(handlers::handle_session_clear))
        .route("/health", get(handlers::handle_health))
        .layer(cors)
        .with_state(state);

    let bind_addr = config.bind_addr();
    info!("Listening on http://{bind_addr}");

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

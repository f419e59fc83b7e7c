//! # Castwise — Podcast Transcript Q&A Server
//!
//! Answers product-management questions from a library of podcast episode
//! transcripts: retrieval over a two-tier vector index, confidence-gated
//! synthesis with ground-truth citations, and a conversational fallback
//! when the library has nothing relevant to say.
//!
//! ## Architecture
//!
//! - **[`config`]** — Configuration loading, defaults, and validation
//! - **[`classifier`]** — Rule-based chunk triage (content / anecdote / junk)
//! - **[`corpus`]** — Pre-chunked episode JSON input format
//! - **[`index`]** — SQLite + sqlite-vec two-tier vector index and builder
//! - **[`embedder`]** — Text embedding via ONNX Runtime (all-MiniLM-L6-v2)
//! - **[`llm`]** — Completion providers (Groq, Ollama) behind a failover router
//! - **[`pipeline`]** — Safety gate, retrieval, dedup, expansion, confidence,
//!   compression, synthesis, follow-ups
//! - **[`session`]** — In-memory per-session conversation memory
//! - **[`server`]** — Axum HTTP API
//! - **[`prompts`]** — Static prompt text

pub mod classifier;
pub mod config;
pub mod corpus;
pub mod embedder;
pub mod index;
pub mod llm;
pub mod pipeline;
pub mod prompts;
pub mod server;
pub mod session;

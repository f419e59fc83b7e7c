/// Configuration module for castwise.
///
/// Handles loading, validating, and providing default configuration values.
/// Every retrieval/confidence threshold that gates pipeline behavior lives
/// here as a named, tunable deployment parameter.
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

// ── Default value functions ──────────────────────────────────────────

fn default_db_path() -> String {
    "./index.db".to_string()
}

fn default_transcripts_dir() -> String {
    "./chunks".to_string()
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8000
}

fn default_model_name() -> String {
    "all-MiniLM-L6-v2".to_string()
}

fn default_model_dir() -> String {
    "./models/all-MiniLM-L6-v2".to_string()
}

fn default_dimensions() -> usize {
    384
}

fn default_core_top_k() -> usize {
    12
}

fn default_longtail_top_k() -> usize {
    6
}

fn default_score_floor() -> f64 {
    0.60
}

fn default_min_strong_hits() -> usize {
    5
}

fn default_max_per_parent() -> usize {
    2
}

fn default_max_per_video() -> usize {
    3
}

fn default_parent_window_percent() -> f64 {
    0.25
}

fn default_high_threshold() -> f64 {
    0.65
}

fn default_medium_threshold() -> f64 {
    0.52
}

fn default_max_extracts() -> usize {
    5
}

fn default_extract_ceiling_chars() -> usize {
    1500
}

fn default_max_sources() -> usize {
    5
}

fn default_llm_provider() -> String {
    "auto".to_string()
}

fn default_groq_model() -> String {
    "llama-3.1-8b-instant".to_string()
}

fn default_ollama_url() -> String {
    "http://localhost:11434".to_string()
}

fn default_ollama_model() -> String {
    "llama3.1".to_string()
}

fn default_max_tokens() -> u32 {
    600
}

fn default_temperature() -> f32 {
    0.2
}

fn default_llm_timeout_secs() -> u64 {
    30
}

fn default_max_turns() -> usize {
    8
}

fn default_session_ttl_minutes() -> u64 {
    30
}

fn default_max_sessions() -> usize {
    1000
}

// ── Config structs ───────────────────────────────────────────────────

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct Config {
    #[serde(default = "default_db_path")]
    pub db_path: String,

    /// Directory of pre-chunked episode JSON files consumed by `castwise index`.
    #[serde(default = "default_transcripts_dir")]
    pub transcripts_dir: String,

    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub model: ModelConfig,

    #[serde(default)]
    pub retrieval: RetrievalConfig,

    #[serde(default)]
    pub confidence: ConfidenceConfig,

    #[serde(default)]
    pub synthesis: SynthesisConfig,

    #[serde(default)]
    pub llm: LlmConfig,

    #[serde(default)]
    pub session: SessionConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ModelConfig {
    #[serde(default = "default_model_name")]
    pub name: String,

    #[serde(default = "default_model_dir")]
    pub dir: String,

    #[serde(default = "default_dimensions")]
    pub dimensions: usize,
}

/// Query-time retrieval knobs. Escalation is one-shot: core first, longtail
/// only when fewer than `min_strong_hits` core hits clear `score_floor`.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct RetrievalConfig {
    #[serde(default = "default_core_top_k")]
    pub core_top_k: usize,

    #[serde(default = "default_longtail_top_k")]
    pub longtail_top_k: usize,

    /// Minimum cosine similarity for a hit to survive retrieval.
    #[serde(default = "default_score_floor")]
    pub score_floor: f64,

    #[serde(default = "default_min_strong_hits")]
    pub min_strong_hits: usize,

    #[serde(default = "default_max_per_parent")]
    pub max_per_parent: usize,

    #[serde(default = "default_max_per_video")]
    pub max_per_video: usize,

    /// Parent context window on each side of the child, as a fraction of
    /// the parent's length.
    #[serde(default = "default_parent_window_percent")]
    pub parent_window_percent: f64,
}

/// Confidence boundaries are empirically calibrated for the embedding model;
/// they are deployment policy, not correctness invariants.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ConfidenceConfig {
    #[serde(default = "default_high_threshold")]
    pub high_threshold: f64,

    #[serde(default = "default_medium_threshold")]
    pub medium_threshold: f64,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct SynthesisConfig {
    /// Hard cap on extracts passed to the synthesizer.
    #[serde(default = "default_max_extracts")]
    pub max_extracts: usize,

    /// Compressed extract length ceiling, in characters.
    #[serde(default = "default_extract_ceiling_chars")]
    pub extract_ceiling_chars: usize,

    /// Maximum citations in a response (further capped at one per video).
    #[serde(default = "default_max_sources")]
    pub max_sources: usize,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct LlmConfig {
    /// "groq", "ollama", or "auto" (groq with ollama fallback).
    #[serde(default = "default_llm_provider")]
    pub provider: String,

    #[serde(default = "default_groq_model")]
    pub groq_model: String,

    /// Read from GROQ_API_KEY when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub groq_api_key: Option<String>,

    #[serde(default = "default_ollama_url")]
    pub ollama_url: String,

    #[serde(default = "default_ollama_model")]
    pub ollama_model: String,

    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    #[serde(default = "default_temperature")]
    pub temperature: f32,

    #[serde(default = "default_llm_timeout_secs")]
    pub timeout_secs: u64,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct SessionConfig {
    #[serde(default = "default_max_turns")]
    pub max_turns: usize,

    #[serde(default = "default_session_ttl_minutes")]
    pub ttl_minutes: u64,

    #[serde(default = "default_max_sessions")]
    pub max_sessions: usize,
}

// ── Default impls ────────────────────────────────────────────────────

impl Default for Config {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
            transcripts_dir: default_transcripts_dir(),
            server: ServerConfig::default(),
            model: ModelConfig::default(),
            retrieval: RetrievalConfig::default(),
            confidence: ConfidenceConfig::default(),
            synthesis: SynthesisConfig::default(),
            llm: LlmConfig::default(),
            session: SessionConfig::default(),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            name: default_model_name(),
            dir: default_model_dir(),
            dimensions: default_dimensions(),
        }
    }
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            core_top_k: default_core_top_k(),
            longtail_top_k: default_longtail_top_k(),
            score_floor: default_score_floor(),
            min_strong_hits: default_min_strong_hits(),
            max_per_parent: default_max_per_parent(),
            max_per_video: default_max_per_video(),
            parent_window_percent: default_parent_window_percent(),
        }
    }
}

impl Default for ConfidenceConfig {
    fn default() -> Self {
        Self {
            high_threshold: default_high_threshold(),
            medium_threshold: default_medium_threshold(),
        }
    }
}

impl Default for SynthesisConfig {
    fn default() -> Self {
        Self {
            max_extracts: default_max_extracts(),
            extract_ceiling_chars: default_extract_ceiling_chars(),
            max_sources: default_max_sources(),
        }
    }
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: default_llm_provider(),
            groq_model: default_groq_model(),
            groq_api_key: None,
            ollama_url: default_ollama_url(),
            ollama_model: default_ollama_model(),
            max_tokens: default_max_tokens(),
            temperature: default_temperature(),
            timeout_secs: default_llm_timeout_secs(),
        }
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            max_turns: default_max_turns(),
            ttl_minutes: default_session_ttl_minutes(),
            max_sessions: default_max_sessions(),
        }
    }
}

// ── Config implementation ────────────────────────────────────────────

impl Config {
    /// Load configuration from a JSON file.
    ///
    /// If `config_path` is empty, defaults to `"config.json"`.
    /// If the file does not exist, returns a default config and optionally
    /// generates a template file.
    pub fn load(config_path: &str) -> Result<Self> {
        let path = if config_path.is_empty() {
            "config.json"
        } else {
            config_path
        };

        if !Path::new(path).exists() {
            info!("{path} not found, using defaults");
            let cfg = Self::default();

            // Generate template only for the default path
            if path == "config.json" {
                match cfg.save(path) {
                    Ok(()) => info!("Generated config template: {path}"),
                    Err(e) => warn!("Failed to generate config template: {e}"),
                }
            }

            return Ok(cfg);
        }

        let data = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config: {path}"))?;

        let cfg: Config = match serde_json::from_str(&data) {
            Ok(c) => c,
            Err(e) => {
                warn!("Invalid JSON in {path}: {e}");
                warn!("Using default configuration");
                return Ok(Self::default());
            }
        };

        info!("Loaded configuration from {path}");
        Ok(cfg)
    }

    /// Save configuration to a JSON file.
    pub fn save(&self, path: &str) -> Result<()> {
        let data = serde_json::to_string_pretty(self).context("failed to marshal config")?;
        std::fs::write(path, data).with_context(|| format!("failed to write config: {path}"))?;
        Ok(())
    }

    /// Validate configuration values.
    pub fn validate(&self) -> Result<()> {
        anyhow::ensure!(
            self.model.dimensions > 0,
            "model.dimensions must be positive"
        );
        anyhow::ensure!(
            self.retrieval.core_top_k > 0,
            "retrieval.core_top_k must be positive"
        );
        anyhow::ensure!(
            (0.0..=1.0).contains(&self.retrieval.score_floor),
            "retrieval.score_floor must be in [0, 1]"
        );
        anyhow::ensure!(
            self.retrieval.parent_window_percent > 0.0
                && self.retrieval.parent_window_percent <= 0.5,
            "retrieval.parent_window_percent must be in (0, 0.5]"
        );
        anyhow::ensure!(
            self.confidence.high_threshold >= self.confidence.medium_threshold,
            "confidence.high_threshold must be >= medium_threshold"
        );
        anyhow::ensure!(
            self.synthesis.max_extracts > 0,
            "synthesis.max_extracts must be positive"
        );
        anyhow::ensure!(
            self.synthesis.extract_ceiling_chars >= 100,
            "synthesis.extract_ceiling_chars must be at least 100"
        );
        anyhow::ensure!(
            matches!(self.llm.provider.as_str(), "groq" | "ollama" | "auto"),
            "llm.provider must be one of: groq, ollama, auto"
        );
        anyhow::ensure!(
            self.session.max_turns > 0,
            "session.max_turns must be positive"
        );
        Ok(())
    }

    /// Bind address for the HTTP server.
    #[must_use]
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}

// ── Tests ────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.retrieval.core_top_k, 12);
        assert_eq!(config.retrieval.longtail_top_k, 6);
        assert_eq!(config.retrieval.score_floor, 0.60);
        assert_eq!(config.retrieval.min_strong_hits, 5);
        assert_eq!(config.confidence.high_threshold, 0.65);
        assert_eq!(config.confidence.medium_threshold, 0.52);
        assert_eq!(config.synthesis.max_extracts, 5);
        assert_eq!(config.synthesis.extract_ceiling_chars, 1500);
        assert_eq!(config.model.dimensions, 384);
        assert_eq!(config.model.name, "all-MiniLM-L6-v2");
        assert_eq!(config.llm.provider, "auto");
        assert_eq!(config.session.max_turns, 8);
    }

    #[test]
    fn test_load_from_json() {
        let json = r#"{"db_path": "./test.db", "retrieval": {"core_top_k": 20}}"#;
        let config: Config = serde_json::from_str(json).unwrap();
        assert_eq!(config.db_path, "./test.db");
        assert_eq!(config.retrieval.core_top_k, 20);
        // Other fields should have defaults
        assert_eq!(config.retrieval.longtail_top_k, 6);
        assert_eq!(config.confidence.high_threshold, 0.65);
    }

    #[test]
    fn test_validate_ok() {
        let config = Config::default();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_bad_thresholds() {
        let mut config = Config::default();
        config.confidence.high_threshold = 0.40;
        config.confidence.medium_threshold = 0.52;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_bad_provider() {
        let mut config = Config::default();
        config.llm.provider = "openai".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_zero_extracts() {
        let mut config = Config::default();
        config.synthesis.max_extracts = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_bind_addr() {
        let config = Config::default();
        assert_eq!(config.bind_addr(), "127.0.0.1:8000");
    }

    #[test]
    fn test_serialization_roundtrip() {
        let config = Config::default();
        let json = serde_json::to_string_pretty(&config).unwrap();
        let parsed: Config = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.db_path, config.db_path);
        assert_eq!(parsed.retrieval.score_floor, config.retrieval.score_floor);
        assert_eq!(parsed.model.name, config.model.name);
    }
}

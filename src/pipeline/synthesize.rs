//! Grounded answer synthesis and the conversation fallback.
use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;
use tracing::warn;

use super::compress::CompressedExtract;
use super::confidence::ConfidenceLevel;
use crate::config::SynthesisConfig;
use crate::llm::{LlmError, LlmRouter};
use crate::prompts::{self, CONVERSATIONAL_SYSTEM_PROMPT, SYNTHESIS_SYSTEM_PROMPT};

/// Seconds subtracted from deep links so playback starts slightly before
/// the quoted moment.
const LINK_LEAD_IN_SECONDS: f64 = 5.0;

/// Parsed four-section answer.
#[derive(Debug, Clone, Serialize)]
pub struct SynthesizedAnswer {
    pub direct_answer: String,
    pub key_ideas: Vec<String>,
    pub common_pitfall: String,
    pub summary: String,
}

/// Ground-truth citation built from index metadata, never from the
/// completion text.
#[derive(Debug, Clone, Serialize)]
pub struct SourceCitation {
    pub source_num: usize,
    pub speaker: String,
    pub video_title: String,
    pub video_id: String,
    pub timestamp: String,
    pub youtube_url: String,
    pub thumbnail_url: String,
    pub text_preview: String,
    pub score: f64,
}

/// Synthesis output: the structured answer plus its citations. Citations
/// are empty when the provider refused.
#[derive(Debug)]
pub struct SynthesisResult {
    pub answer: SynthesizedAnswer,
    pub citations: Vec<SourceCitation>,
    pub refused: bool,
}

pub struct Synthesizer<'a> {
    llm: &'a LlmRouter,
    cfg: &'a SynthesisConfig,
}

impl<'a> Synthesizer<'a> {
    pub fn new(llm: &'a LlmRouter, cfg: &'a SynthesisConfig) -> Self {
        Self { llm, cfg }
    }

    /// Produce a grounded answer from compressed extracts.
    pub async fn synthesize(
        &self,
        query: &str,
        extracts: &[CompressedExtract],
        confidence: ConfidenceLevel,
        summary_memory: Option<&str>,
        recent_turns: Option<&str>,
    ) -> Result<SynthesisResult, LlmError> {
        let context = build_context_blocks(extracts);
        let prompt = build_user_prompt(query, &context, confidence, summary_memory, recent_turns);

        let raw = self.llm.complete(SYNTHESIS_SYSTEM_PROMPT, &prompt).await?;
        let cleaned = normalize_output(&raw);

        let refused = prompts::is_refusal(&cleaned);
        let citations = if refused {
            warn!("Refusal detected in completion, hiding citations");
            Vec::new()
        } else {
            build_citations(extracts, self.cfg.max_sources)
        };

        Ok(SynthesisResult {
            answer: parse_sections(&cleaned),
            citations,
            refused,
        })
    }

    /// Ungrounded answer for the low-confidence branch. No sources, no
    /// citations, plain conversational register.
    pub async fn conversational(
        &self,
        query: &str,
        recent_turns: Option<&str>,
    ) -> Result<String, LlmError> {
        let prompt = match recent_turns.filter(|t| !t.is_empty()) {
            Some(turns) => format!("RECENT CONVERSATION:\n{turns}\n\nUSER QUESTION:\n{query}"),
            None => format!("USER QUESTION:\n{query}"),
        };
        let raw = self.llm.complete(CONVERSATIONAL_SYSTEM_PROMPT, &prompt).await?;
        Ok(normalize_output(&raw))
    }
}

/// Weight label shown to the model per source, derived from score.
fn source_weight(score: f64) -> &'static str {
    if score >= 0.70 {
        "HIGH"
    } else if score >= 0.55 {
        "MEDIUM"
    } else {
        "LOW"
    }
}

/// Minutes:seconds display form of a timestamp.
#[must_use]
pub fn format_timestamp(seconds: f64) -> String {
    let total = seconds.max(0.0) as u64;
    format!("{}:{:02}", total / 60, total % 60)
}

/// Deep link into the episode, starting a few seconds early.
fn youtube_url(video_id: &str, start_seconds: f64) -> String {
    let t = (start_seconds - LINK_LEAD_IN_SECONDS).max(0.0) as u64;
    format!("https://www.youtube.com/watch?v={video_id}&t={t}s")
}

fn thumbnail_url(video_id: &str) -> String {
    format!("https://img.youtube.com/vi/{video_id}/mqdefault.jpg")
}

fn build_context_blocks(extracts: &[CompressedExtract]) -> String {
    let blocks: Vec<String> = extracts
        .iter()
        .enumerate()
        .map(|(i, extract)| {
            let meta = &extract.hit.chunk.hit.chunk;
            format!(
                "SOURCE [{}] - Confidence: {}\nSpeaker: {}\nVideo: {}\nTimestamp: {}\nExcerpt:\n{}",
                i + 1,
                source_weight(extract.hit.chunk.hit.similarity),
                meta.speaker_or_guest(),
                meta.video_title,
                format_timestamp(meta.start_seconds),
                extract.text
            )
        })
        .collect();
    blocks.join("\n\n")
}

/// Assemble the user prompt. Section order is fixed: summary memory,
/// sources, recent turns, then the query with its confidence note, so
/// the static head of the prompt stays cache-friendly.
fn build_user_prompt(
    query: &str,
    context: &str,
    confidence: ConfidenceLevel,
    summary_memory: Option<&str>,
    recent_turns: Option<&str>,
) -> String {
    let mut sections: Vec<String> = Vec::new();

    if let Some(summary) = summary_memory.filter(|s| !s.is_empty()) {
        sections.push(format!(
            "CONVERSATION SUMMARY (earlier discussion):\n{summary}\n\nNote: This is background only. All facts must come from VERIFIED SOURCES."
        ));
    }

    sections.push(format!(
        "VERIFIED SOURCES (grounded excerpts from expert PM conversations):\n\n{context}"
    ));

    if let Some(turns) = recent_turns.filter(|t| !t.is_empty()) {
        sections.push(format!("RECENT CONVERSATION:\n{turns}"));
    }

    sections.push(format!(
        "USER QUESTION:\n{query}\n\nCONFIDENCE LEVEL: {}\n{}",
        confidence.as_str().to_uppercase(),
        confidence.prompt_note()
    ));

    sections.join("\n\n---\n\n")
}

static MD_HEADER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^#{1,6}\s*").expect("valid regex"));
static MD_BOLD: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\*\*([^*]+)\*\*").expect("valid regex"));
static MD_DASH_BULLET: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^\s*-\s+").expect("valid regex"));

/// Strip the markdown the model sometimes emits despite instructions.
#[must_use]
pub fn normalize_output(text: &str) -> String {
    let out = MD_HEADER.replace_all(text, "");
    let out = MD_BOLD.replace_all(&out, "$1");
    let out = MD_DASH_BULLET.replace_all(&out, "\u{2022} ");
    out.trim().to_string()
}

/// Split the completion into the four expected sections. A malformed
/// completion degrades gracefully: everything lands in `direct_answer`
/// and the other sections stay empty.
#[must_use]
pub fn parse_sections(text: &str) -> SynthesizedAnswer {
    let mut direct_answer = String::new();
    let mut key_ideas: Vec<String> = Vec::new();
    let mut common_pitfall = String::new();
    let mut summary = String::new();

    #[derive(PartialEq)]
    enum Section {
        None,
        Direct,
        Ideas,
        Pitfall,
        Summary,
    }

    let mut current = Section::None;
    for line in text.lines() {
        let trimmed = line.trim();
        match trimmed.to_lowercase().as_str() {
            "direct answer" => {
                current = Section::Direct;
                continue;
            }
            "key ideas" => {
                current = Section::Ideas;
                continue;
            }
            "common pitfall" => {
                current = Section::Pitfall;
                continue;
            }
            "summary" => {
                current = Section::Summary;
                continue;
            }
            _ => {}
        }

        if trimmed.is_empty() {
            continue;
        }

        match current {
            Section::Direct | Section::None => {
                if !direct_answer.is_empty() {
                    direct_answer.push(' ');
                }
                direct_answer.push_str(trimmed);
            }
            Section::Ideas => {
                let idea = trimmed.trim_start_matches('\u{2022}').trim();
                if !idea.is_empty() {
                    key_ideas.push(idea.to_string());
                }
            }
            Section::Pitfall => {
                if !common_pitfall.is_empty() {
                    common_pitfall.push(' ');
                }
                common_pitfall.push_str(trimmed);
            }
            Section::Summary => {
                if !summary.is_empty() {
                    summary.push(' ');
                }
                summary.push_str(trimmed);
            }
        }
    }

    SynthesizedAnswer {
        direct_answer,
        key_ideas,
        common_pitfall,
        summary,
    }
}

/// Citations from index metadata: first extract per video, capped at
/// `max_sources` total. The model never contributes citation fields.
fn build_citations(extracts: &[CompressedExtract], max_sources: usize) -> Vec<SourceCitation> {
    let mut seen_videos = std::collections::HashSet::new();
    let mut citations = Vec::new();

    for extract in extracts {
        if citations.len() >= max_sources {
            break;
        }
        let meta = &extract.hit.chunk.hit.chunk;
        if !seen_videos.insert(meta.video_id.clone()) {
            continue;
        }

        let preview = if meta.text.chars().count() > 150 {
            let head: String = meta.text.chars().take(150).collect();
            format!("{head}...")
        } else {
            meta.text.clone()
        };

        citations.push(SourceCitation {
            source_num: citations.len() + 1,
            speaker: meta.speaker_or_guest().to_string(),
            video_title: meta.video_title.clone(),
            video_id: meta.video_id.clone(),
            timestamp: format_timestamp(meta.start_seconds),
            youtube_url: youtube_url(&meta.video_id, meta.start_seconds),
            thumbnail_url: thumbnail_url(&meta.video_id),
            text_preview: preview,
            score: extract.hit.chunk.hit.similarity,
        });
    }

    citations
}

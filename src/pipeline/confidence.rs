//! Retrieval confidence scoring.
use serde::Serialize;

use crate::config::ConfidenceConfig;

/// How strongly the retained sources support an answer. `Low` is not an
/// error: it routes the query to the conversation branch instead of
/// grounded synthesis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ConfidenceLevel {
    High,
    Medium,
    Low,
}

impl ConfidenceLevel {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            ConfidenceLevel::High => "high",
            ConfidenceLevel::Medium => "medium",
            ConfidenceLevel::Low => "low",
        }
    }

    /// Guidance line injected into the synthesis prompt.
    #[must_use]
    pub fn prompt_note(self) -> &'static str {
        match self {
            ConfidenceLevel::High => "Sources are strong and directly relevant. Be authoritative.",
            ConfidenceLevel::Medium => "Sources are relevant but not comprehensive. Be balanced.",
            ConfidenceLevel::Low => "Sources are weak. Acknowledge limitations and be concise.",
        }
    }
}

/// Score retrieval quality from the retained similarity scores.
///
/// The statistic is the mean of the top three retained scores, so one
/// excellent hit among weak ones does not inflate confidence, and a long
/// tail of mediocre hits does not dilute a strong top result.
#[must_use]
pub fn score_confidence(scores: &[f64], cfg: &ConfidenceConfig) -> ConfidenceLevel {
    if scores.is_empty() {
        return ConfidenceLevel::Low;
    }

    let mut sorted = scores.to_vec();
    sorted.sort_by(|a, b| b.partial_cmp(a).unwrap_or(std::cmp::Ordering::Equal));
    let top = &sorted[..sorted.len().min(3)];
    let avg = top.iter().sum::<f64>() / top.len() as f64;

    if avg >= cfg.high_threshold {
        ConfidenceLevel::High
    } else if avg >= cfg.medium_threshold {
        ConfidenceLevel::Medium
    } else {
        ConfidenceLevel::Low
    }
}

//! Follow-up question generation.
//!
//! Only medium and high confidence answers get follow-ups; offering to
//! dig deeper into an answer the sources barely supported would invite a
//! second weak answer. No static fallback list exists: when generation or
//! filtering leaves fewer than two good questions, the result is empty.
use std::sync::LazyLock;

use regex::Regex;
use tracing::warn;

use super::confidence::ConfidenceLevel;
use crate::llm::LlmRouter;
use crate::prompts::FOLLOWUP_SYSTEM_PROMPT;

/// Lazy clarification patterns that add no depth. Any match discards the
/// question.
static GENERIC_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"what stage",
        r"tell me more",
        r"can you clarify",
        r"what (is|are) your",
        r"what do you think",
        r"how does that sound",
        r"does that make sense",
        r"any other questions",
        r"what else",
        r"anything else",
        r"what challenges",
        r"what problems",
        r"what situation",
        r"your product",
        r"your company",
        r"your team",
        r"your experience",
    ]
    .iter()
    .map(|p| Regex::new(p).expect("valid regex"))
    .collect()
});

pub struct FollowupGenerator<'a> {
    llm: &'a LlmRouter,
}

impl<'a> FollowupGenerator<'a> {
    pub fn new(llm: &'a LlmRouter) -> Self {
        Self { llm }
    }

    /// Generate up to three follow-up questions for a grounded answer.
    ///
    /// Returns an empty list on low confidence, on provider failure, or
    /// when filtering leaves fewer than two questions.
    pub async fn generate(
        &self,
        query: &str,
        answer_text: &str,
        confidence: ConfidenceLevel,
    ) -> Vec<String> {
        if confidence == ConfidenceLevel::Low {
            return Vec::new();
        }

        let answer_summary: String = answer_text.chars().take(600).collect();
        let user_prompt = format!(
            "User's Question:\n{query}\n\nAnswer Just Given:\n{answer_summary}\n\n\
             Generate 2-3 follow-up questions that dig deeper into this specific topic."
        );

        let response = match self.llm.complete(FOLLOWUP_SYSTEM_PROMPT, &user_prompt).await {
            Ok(text) => text,
            Err(e) => {
                warn!("Follow-up generation failed: {e}");
                return Vec::new();
            }
        };

        let candidates = parse_followup_response(&response);
        let filtered = filter_questions(candidates, query);

        if filtered.len() >= 2 {
            filtered.into_iter().take(3).collect()
        } else {
            Vec::new()
        }
    }
}

/// Extract questions from the completion: JSON array first, then a
/// line-scan fallback for models that ignore the format.
fn parse_followup_response(response: &str) -> Vec<String> {
    if let Some(start) = response.find('[') {
        if let Some(end) = response[start..].find(']') {
            let candidate = &response[start..=start + end];
            if let Ok(parsed) = serde_json::from_str::<Vec<String>>(candidate) {
                return parsed
                    .into_iter()
                    .map(|q| q.trim().to_string())
                    .filter(|q| !q.is_empty())
                    .collect();
            }
        }
    }

    response
        .lines()
        .map(str::trim)
        .filter(|line| line.contains('?'))
        .map(|line| {
            line.trim_start_matches(|c: char| {
                c.is_ascii_digit() || c == '.' || c == ')' || c == '-' || c == '\u{2022}' || c == '"'
            })
            .trim_end_matches('"')
            .trim()
            .to_string()
        })
        .filter(|q| !q.is_empty())
        .take(3)
        .collect()
}

/// Drop generic questions and verbatim repeats of the original query.
fn filter_questions(questions: Vec<String>, original_query: &str) -> Vec<String> {
    let original = original_query.trim().to_lowercase();
    questions
        .into_iter()
        .filter(|q| {
            let lower = q.to_lowercase();
            if lower.trim_end_matches('?').trim() == original.trim_end_matches('?').trim() {
                return false;
            }
            !GENERIC_PATTERNS.iter().any(|p| p.is_match(&lower))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::mock::MockProvider;
    use crate::llm::LlmError;
    use std::sync::Arc;

    #[test]
    fn test_parse_json_array() {
        let out = parse_followup_response(
            r#"["How do you weigh reach against effort?", "When should you ship a partial fix?"]"#,
        );
        assert_eq!(out.len(), 2);
        assert!(out[0].starts_with("How do you weigh"));
    }

    #[test]
    fn test_parse_line_fallback() {
        let out = parse_followup_response(
            "1. How do you measure impact after launch?\n2) When do you revisit a kill decision?\nnot a question line",
        );
        assert_eq!(out.len(), 2);
        assert_eq!(out[0], "How do you measure impact after launch?");
    }

    #[test]
    fn test_filter_generic() {
        let out = filter_questions(
            vec![
                "What stage is your product?".into(),
                "How would you apply RICE to a platform bet?".into(),
                "Can you clarify what you mean?".into(),
            ],
            "how do I prioritize",
        );
        assert_eq!(out.len(), 1);
    }

    #[test]
    fn test_filter_verbatim_repeat() {
        let out = filter_questions(
            vec![
                "How do I prioritize?".into(),
                "Which prioritization inputs matter most at seed stage companies?".into(),
            ],
            "How do I prioritize?",
        );
        assert_eq!(out.len(), 1);
    }

    #[tokio::test]
    async fn test_low_confidence_skips_provider() {
        let provider = Arc::new(MockProvider::always("mock", "[]"));
        let providers: Vec<Arc<dyn crate::llm::LlmProvider>> = vec![provider.clone()];
        let router = LlmRouter::new(providers);
        let generator = FollowupGenerator::new(&router);

        let out = generator.generate("q", "answer", ConfidenceLevel::Low).await;
        assert!(out.is_empty());
        assert_eq!(provider.calls(), 0);
    }

    #[tokio::test]
    async fn test_provider_failure_yields_empty() {
        let provider = Arc::new(MockProvider::scripted(
            "mock",
            vec![Err(LlmError::Timeout(30)), Err(LlmError::Timeout(30))],
        ));
        let providers: Vec<Arc<dyn crate::llm::LlmProvider>> = vec![provider];
        let router = LlmRouter::new(providers);
        let generator = FollowupGenerator::new(&router);

        let out = generator.generate("q", "answer", ConfidenceLevel::High).await;
        assert!(out.is_empty(), "no static fallback questions");
    }

    #[tokio::test]
    async fn test_single_survivor_yields_empty() {
        let provider = Arc::new(MockProvider::always(
            "mock",
            r#"["Tell me more?", "How would you sequence the migration work?"]"#,
        ));
        let providers: Vec<Arc<dyn crate::llm::LlmProvider>> = vec![provider];
        let router = LlmRouter::new(providers);
        let generator = FollowupGenerator::new(&router);

        let out = generator.generate("q", "answer", ConfidenceLevel::High).await;
        assert!(out.is_empty(), "fewer than two good questions means none");
    }

    #[tokio::test]
    async fn test_happy_path() {
        let provider = Arc::new(MockProvider::always(
            "mock",
            r#"["How would you defend the cut list to sales?", "What leading metric proves the bet early?"]"#,
        ));
        let providers: Vec<Arc<dyn crate::llm::LlmProvider>> = vec![provider];
        let router = LlmRouter::new(providers);
        let generator = FollowupGenerator::new(&router);

        let out = generator
            .generate("How do I cut scope?", "answer text", ConfidenceLevel::Medium)
            .await;
        assert_eq!(out.len(), 2);
    }
}

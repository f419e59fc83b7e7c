//! Query safety gate.
//!
//! Runs before any retrieval work. A flagged query produces a fixed
//! response with no embedding, no index search, and no completion call,
//! and is never written into session memory.

/// Self-harm indicators, answered with crisis resources.
const SELF_HARM_TERMS: &[&str] = &[
    "kill myself",
    "suicide",
    "end my life",
    "want to die",
    "don't want to live",
    "better off dead",
    "hurt myself",
    "self harm",
    "suicidal",
];

/// General harmful-intent indicators, answered with a topic redirect.
const HARMFUL_TERMS: &[&str] = &[
    "how to hack",
    "how to steal",
    "illegal",
    "exploit vulnerability",
    "bypass security",
    "credit card fraud",
];

pub const CRISIS_RESPONSE: &str = "\
I can't help with that, but you don't have to handle things alone. \
If this is serious, please consider reaching out to someone you trust \
or a professional resource in your area.

Crisis Resources:
\u{2022} National Suicide Prevention Lifeline: 988 (US)
\u{2022} Crisis Text Line: Text HOME to 741741
\u{2022} International Association for Suicide Prevention: https://www.iasp.info/resources/Crisis_Centres/";

pub const REDIRECT_RESPONSE: &str = "\
I'm designed to help with product management questions. \
I can't assist with that request, but I'd be happy to help you with \
topics like prioritization, growth strategy, user research, or product leadership.";

/// Why a query was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SafetyVerdict {
    SelfHarm,
    Harmful,
}

impl SafetyVerdict {
    /// Fixed response text for this verdict.
    #[must_use]
    pub fn response(self) -> &'static str {
        match self {
            SafetyVerdict::SelfHarm => CRISIS_RESPONSE,
            SafetyVerdict::Harmful => REDIRECT_RESPONSE,
        }
    }
}

/// Check a query against both term lists. Self-harm takes precedence so
/// a query matching both lists still gets crisis resources.
#[must_use]
pub fn check(query: &str) -> Option<SafetyVerdict> {
    let q = query.to_lowercase();

    if SELF_HARM_TERMS.iter().any(|t| q.contains(t)) {
        return Some(SafetyVerdict::SelfHarm);
    }
    if HARMFUL_TERMS.iter().any(|t| q.contains(t)) {
        return Some(SafetyVerdict::Harmful);
    }
    None
}

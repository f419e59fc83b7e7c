//! Rule-based chunk classifier.
//!
//! Labels each child span before embedding: substantive advice goes to the
//! core tier, personal stories to the longtail tier, and promotional or
//! filler material is dropped from indexing entirely. Deterministic by
//! construction, so a rebuild over the same corpus reproduces the same
//! index placement.

use crate::index::Tier;
use serde::Serialize;

/// Sponsor/advertisement markers. Any single match discards the chunk.
const SPONSOR_MARKERS: &[&str] = &[
    "sponsor",
    "sponsored",
    "brought to you by",
    "use code",
    "sign up at",
    "visit",
    "dot com",
    "free trial",
    "limited time",
];

/// Intro/outro boilerplate markers.
const META_MARKERS: &[&str] = &[
    "welcome to the podcast",
    "thanks for listening",
    "subscribe on",
    "leave a review",
    "see you next episode",
];

/// Personal-story indicators. Two or more matches classify as anecdote.
const ANECDOTE_MARKERS: &[&str] = &[
    "i remember",
    "when i",
    "one time",
    "years ago",
    "back when",
    "story",
    "told me",
    "happened",
    "experience",
    "once",
];

/// Words that mark useful content even in short chunks.
const SIGNAL_WORDS: &[&str] = &[
    "prioritize",
    "decide",
    "approach",
    "framework",
    "tradeoff",
    "strategy",
    "method",
    "process",
    "technique",
    "principle",
    "how to",
    "what is",
    "why",
    "because",
    "should",
    "recommend",
];

/// Content category of a child chunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ChunkKind {
    /// Advice, frameworks, opinions. Indexed in the core tier.
    Content,
    /// Personal stories. Indexed in the longtail tier.
    Anecdote,
    /// Podcast transitions and boilerplate. Dropped.
    Meta,
    /// Advertisements and promos. Dropped.
    Sponsor,
    /// Very short filler without signal words. Dropped.
    Banter,
}

impl ChunkKind {
    /// Whether chunks of this kind are embedded and indexed.
    #[must_use]
    pub fn is_embeddable(self) -> bool {
        matches!(self, ChunkKind::Content | ChunkKind::Anecdote)
    }

    /// Index tier for embeddable kinds, `None` for discarded ones.
    #[must_use]
    pub fn tier(self) -> Option<Tier> {
        match self {
            ChunkKind::Content => Some(Tier::Core),
            ChunkKind::Anecdote => Some(Tier::Longtail),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            ChunkKind::Content => "content",
            ChunkKind::Anecdote => "anecdote",
            ChunkKind::Meta => "meta",
            ChunkKind::Sponsor => "sponsor",
            ChunkKind::Banter => "banter",
        }
    }
}

/// Deterministic keyword classifier for child chunks.
///
/// Filtering is deliberately relaxed: only obvious junk is discarded, and
/// ambiguous short chunks fall to `Banter` (discard) rather than being
/// promoted to `Content`.
pub struct ChunkClassifier {
    min_content_words: usize,
}

impl ChunkClassifier {
    #[must_use]
    pub fn new(min_content_words: usize) -> Self {
        Self { min_content_words }
    }

    /// Classify one chunk of raw transcript text.
    ///
    /// Rule order: sponsor markers, then meta markers, then the short-filler
    /// check (rescued by signal words), then anecdote scoring. Everything
    /// else is content.
    #[must_use]
    pub fn classify(&self, text: &str) -> ChunkKind {
        let lower = text.to_lowercase();
        let word_count = text.split_whitespace().count();

        if SPONSOR_MARKERS.iter().any(|m| lower.contains(m)) {
            return ChunkKind::Sponsor;
        }

        if META_MARKERS.iter().any(|m| lower.contains(m)) {
            return ChunkKind::Meta;
        }

        if word_count < self.min_content_words {
            let has_signal = SIGNAL_WORDS.iter().any(|s| lower.contains(s));
            if !has_signal {
                return ChunkKind::Banter;
            }
        }

        let anecdote_score = ANECDOTE_MARKERS
            .iter()
            .filter(|m| lower.contains(*m))
            .count();
        if anecdote_score >= 2 {
            return ChunkKind::Anecdote;
        }

        ChunkKind::Content
    }
}

impl Default for ChunkClassifier {
    fn default() -> Self {
        Self::new(25)
    }
}

/// Per-kind counts accumulated during an index build.
#[derive(Debug, Default, Clone, Serialize)]
pub struct ClassifyStats {
    pub total: usize,
    pub content: usize,
    pub anecdote: usize,
    pub meta: usize,
    pub sponsor: usize,
    pub banter: usize,
}

impl ClassifyStats {
    pub fn record(&mut self, kind: ChunkKind) {
        self.total += 1;
        match kind {
            ChunkKind::Content => self.content += 1,
            ChunkKind::Anecdote => self.anecdote += 1,
            ChunkKind::Meta => self.meta += 1,
            ChunkKind::Sponsor => self.sponsor += 1,
            ChunkKind::Banter => self.banter += 1,
        }
    }

    #[must_use]
    pub fn embeddable(&self) -> usize {
        self.content + self.anecdote
    }
}

// ── Tests ────────────────────────────────────────────────────────────

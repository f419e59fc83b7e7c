use serde::Serialize;

/// Index tier partition: substantive material vs anecdotes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Tier {
    Core,
    Longtail,
}

impl Tier {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Tier::Core => "core",
            Tier::Longtail => "longtail",
        }
    }

    /// vec0 virtual table holding this tier's embeddings.
    #[must_use]
    pub fn table(self) -> &'static str {
        match self {
            Tier::Core => "vec_core",
            Tier::Longtail => "vec_longtail",
        }
    }

    pub fn from_str(s: &str) -> Option<Tier> {
        match s {
            "core" => Some(Tier::Core),
            "longtail" => Some(Tier::Longtail),
            _ => None,
        }
    }
}

/// Episode-level metadata carried for citation display.
#[derive(Debug, Clone)]
pub struct VideoMeta {
    pub video_id: String,
    pub title: String,
    pub guest: Option<String>,
}

/// A contiguous transcript region owning one or more chunks. Fetched at
/// query time for context expansion only; parent text is never embedded.
#[derive(Debug, Clone)]
pub struct ParentSpan {
    pub parent_id: String,
    pub video_id: String,
    pub position: usize,
    pub text: String,
}

/// Everything needed to reconstruct a chunk from an index row without
/// re-reading raw transcript storage.
#[derive(Debug, Clone)]
pub struct ChunkMeta {
    pub chunk_id: String,
    pub parent_id: String,
    pub video_id: String,
    pub video_title: String,
    pub guest: Option<String>,
    pub speaker: Option<String>,
    pub position: usize,
    pub start_seconds: f64,
    pub end_seconds: f64,
    pub text: String,
}

impl ChunkMeta {
    /// Speaker name with fallback to the episode guest.
    #[must_use]
    pub fn speaker_or_guest(&self) -> &str {
        self.speaker
            .as_deref()
            .or(self.guest.as_deref())
            .unwrap_or("Unknown")
    }
}

/// Insertion form of a chunk, borrowed from corpus records during a build.
#[derive(Debug, Clone)]
pub struct NewChunk<'a> {
    pub chunk_id: &'a str,
    pub parent_id: &'a str,
    pub tier: Tier,
    pub position: usize,
    pub start_seconds: f64,
    pub end_seconds: f64,
    pub speaker: Option<&'a str>,
    pub content: &'a str,
}

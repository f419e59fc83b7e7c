//! Deduplication and per-source grouping caps.
use std::collections::{HashMap, HashSet};

use super::retrieval::ScoredChunk;

/// Drop exact-duplicate texts and cap how much any one parent or episode
/// can contribute.
///
/// Input must already be sorted score-descending; caps then keep each
/// source's best chunks automatically. Pure and order-stable, so applying
/// it twice yields the same list.
#[must_use]
pub fn deduplicate(
    chunks: Vec<ScoredChunk>,
    max_per_parent: usize,
    max_per_video: usize,
) -> Vec<ScoredChunk> {
    let mut seen_texts: HashSet<String> = HashSet::new();
    let mut per_parent: HashMap<String, usize> = HashMap::new();
    let mut per_video: HashMap<String, usize> = HashMap::new();

    let mut kept = Vec::with_capacity(chunks.len());
    for chunk in chunks {
        if !seen_texts.insert(text_key(&chunk.hit.chunk.text)) {
            continue;
        }

        let parent_count = per_parent
            .entry(chunk.hit.chunk.parent_id.clone())
            .or_insert(0);
        if *parent_count >= max_per_parent {
            continue;
        }

        let video_count = per_video
            .entry(chunk.hit.chunk.video_id.clone())
            .or_insert(0);
        if *video_count >= max_per_video {
            continue;
        }

        *parent_count += 1;
        *video_count += 1;
        kept.push(chunk);
    }

    kept
}

/// Duplicate key: the first 100 chars of the normalized text, so trivially
/// re-punctuated tails do not defeat the check.
fn text_key(text: &str) -> String {
    text.trim().to_lowercase().chars().take(100).collect()
}

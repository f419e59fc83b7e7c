//! Parent context expansion.
//!
//! Retrieval matches on small child chunks, but the answer reads better
//! with surrounding transcript. Each kept chunk gets a window of its
//! parent text centered on the child, sized at a fraction of the parent.
//! Windows never cross parent boundaries.
use rusqlite::Result;

use super::retrieval::ScoredChunk;
use crate::index::Db;

/// A retrieval result carrying its expanded context.
#[derive(Debug, Clone)]
pub struct ExpandedHit {
    pub chunk: ScoredChunk,
    /// Parent window around the child, or the child text itself when the
    /// parent is missing or the child cannot be located in it.
    pub context: String,
}

/// Expand each chunk with a ±`window_percent` slice of its parent text.
pub fn expand_with_parents(
    db: &Db,
    chunks: Vec<ScoredChunk>,
    window_percent: f64,
) -> Result<Vec<ExpandedHit>> {
    let mut expanded = Vec::with_capacity(chunks.len());

    for chunk in chunks {
        let context = match db.get_parent(&chunk.hit.chunk.parent_id)? {
            Some(parent) => window_around_child(&parent.text, &chunk.hit.chunk.text, window_percent),
            None => chunk.hit.chunk.text.clone(),
        };
        expanded.push(ExpandedHit { chunk, context });
    }

    Ok(expanded)
}

/// Slice the parent text to the child plus `percent` of the parent length
/// on each side. Falls back to the child text when it cannot be located.
fn window_around_child(parent_text: &str, child_text: &str, percent: f64) -> String {
    let Some(child_pos) = parent_text.find(child_text) else {
        return child_text.to_string();
    };

    let parent_len = parent_text.len();
    let context_bytes = (parent_len as f64 * percent) as usize;

    let start = floor_char_boundary(parent_text, child_pos.saturating_sub(context_bytes));
    let end = ceil_char_boundary(
        parent_text,
        (child_pos + child_text.len() + context_bytes).min(parent_len),
    );

    parent_text[start..end].to_string()
}

/// Largest char boundary at or below `index`.
fn floor_char_boundary(s: &str, index: usize) -> usize {
    let mut i = index.min(s.len());
    while !s.is_char_boundary(i) {
        i -= 1;
    }
    i
}

/// Smallest char boundary at or above `index`.
fn ceil_char_boundary(s: &str, index: usize) -> usize {
    let mut i = index.min(s.len());
    while !s.is_char_boundary(i) {
        i += 1;
    }
    i
}

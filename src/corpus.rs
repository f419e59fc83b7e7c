//! Pre-chunked episode transcript files consumed by the index builder.
//!
//! Each `*.json` file holds one episode: video metadata plus parent
//! regions and their child chunks, produced upstream by the transcript
//! segmentation step. Chunk timestamps are seconds from episode start.
use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde::Deserialize;
use tracing::warn;

#[derive(Debug, Deserialize)]
pub struct EpisodeFile {
    pub video_id: String,
    pub title: String,
    #[serde(default)]
    pub guest: Option<String>,
    pub parents: Vec<ParentRecord>,
}

#[derive(Debug, Deserialize)]
pub struct ParentRecord {
    pub parent_id: String,
    pub position: usize,
    pub text: String,
    pub children: Vec<ChildRecord>,
}

#[derive(Debug, Deserialize)]
pub struct ChildRecord {
    pub chunk_id: String,
    pub position: usize,
    pub text: String,
    pub start_seconds: f64,
    pub end_seconds: f64,
    #[serde(default)]
    pub speaker: Option<String>,
}

/// Parse one episode file.
pub fn load_episode(path: &Path) -> Result<EpisodeFile> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("failed to read episode file: {}", path.display()))?;
    let episode: EpisodeFile = serde_json::from_str(&raw)
        .with_context(|| format!("invalid episode JSON: {}", path.display()))?;

    anyhow::ensure!(
        !episode.video_id.is_empty(),
        "episode has empty video_id: {}",
        path.display()
    );

    Ok(episode)
}

/// Load every `*.json` episode in a directory, sorted by filename for a
/// reproducible build order. Unparseable files are skipped with a warning
/// rather than aborting the whole build.
pub fn load_dir(dir: &Path) -> Result<Vec<EpisodeFile>> {
    anyhow::ensure!(
        dir.is_dir(),
        "transcript directory not found: {}",
        dir.display()
    );

    let mut paths: Vec<_> = fs::read_dir(dir)
        .with_context(|| format!("failed to read directory: {}", dir.display()))?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|p| p.extension().is_some_and(|ext| ext == "json"))
        .collect();
    paths.sort();

    let mut episodes = Vec::with_capacity(paths.len());
    for path in &paths {
        match load_episode(path) {
            Ok(episode) => episodes.push(episode),
            Err(e) => warn!("Skipping {}: {e:#}", path.display()),
        }
    }

    Ok(episodes)
}

//! Offline index build: classify, embed, and store episode chunks.
use std::path::Path;

use anyhow::{Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::info;

use crate::classifier::{ChunkClassifier, ClassifyStats};
use crate::corpus::{self, EpisodeFile};
use crate::embedder::Embedder;
use crate::index::models::{NewChunk, VideoMeta};
use crate::index::Db;

#[derive(Debug, Default)]
pub struct BuildStats {
    pub videos: usize,
    pub parents: usize,
    pub classify: ClassifyStats,
}

/// Builds the two-tier index from pre-chunked episode files.
pub struct IndexBuilder<'a, E: Embedder + ?Sized> {
    db: &'a mut Db,
    embedder: &'a E,
    classifier: ChunkClassifier,
}

impl<'a, E: Embedder + ?Sized> IndexBuilder<'a, E> {
    pub fn new(db: &'a mut Db, embedder: &'a E) -> Self {
        Self {
            db,
            embedder,
            classifier: ChunkClassifier::default(),
        }
    }

    /// Index every episode file in `dir`. Re-running replaces episodes
    /// that are already indexed, so the build is safe to repeat.
    pub fn build_from_dir(&mut self, dir: &Path) -> Result<BuildStats> {
        let episodes = corpus::load_dir(dir)?;
        anyhow::ensure!(!episodes.is_empty(), "no episode files in {}", dir.display());

        info!("Indexing {} episodes from {}", episodes.len(), dir.display());

        let pb = ProgressBar::new(episodes.len() as u64);
        pb.set_style(
            ProgressStyle::default_bar()
                .template("  {bar:40.cyan/blue} {pos}/{len} {msg}")
                .expect("valid template")
                .progress_chars("█▓░"),
        );

        let mut stats = BuildStats::default();
        for episode in &episodes {
            pb.set_message(episode.title.clone());
            self.index_episode(episode, &mut stats)
                .with_context(|| format!("failed to index episode {}", episode.video_id))?;
            pb.inc(1);
        }
        pb.finish_and_clear();

        info!(
            "Index build complete: {} videos, {} parents, {} core chunks, {} longtail chunks, {} dropped",
            stats.videos,
            stats.parents,
            stats.classify.content,
            stats.classify.anecdote,
            stats.classify.total - stats.classify.embeddable()
        );

        Ok(stats)
    }

    fn index_episode(&mut self, episode: &EpisodeFile, stats: &mut BuildStats) -> Result<()> {
        let video = VideoMeta {
            video_id: episode.video_id.clone(),
            title: episode.title.clone(),
            guest: episode.guest.clone(),
        };

        let parents: Vec<(String, usize, String)> = episode
            .parents
            .iter()
            .map(|p| (p.parent_id.clone(), p.position, p.text.clone()))
            .collect();

        // Classify children; only embeddable kinds get an index row.
        let mut chunks: Vec<NewChunk<'_>> = Vec::new();
        for parent in &episode.parents {
            for child in &parent.children {
                let kind = self.classifier.classify(&child.text);
                stats.classify.record(kind);

                let Some(tier) = kind.tier() else {
                    continue;
                };
                chunks.push(NewChunk {
                    chunk_id: &child.chunk_id,
                    parent_id: &parent.parent_id,
                    tier,
                    position: child.position,
                    start_seconds: child.start_seconds,
                    end_seconds: child.end_seconds,
                    speaker: child.speaker.as_deref(),
                    content: &child.text,
                });
            }
        }

        let texts: Vec<&str> = chunks.iter().map(|c| c.content).collect();
        let embeddings = self
            .embedder
            .embed_batch(&texts)
            .map_err(|e| anyhow::anyhow!("embedding failed: {e}"))?;

        self.db.insert_video(&video, &parents, &chunks, &embeddings)?;

        stats.videos += 1;
        stats.parents += parents.len();
        Ok(())
    }
}

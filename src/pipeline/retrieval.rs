//! Two-tier retrieval with one-shot longtail escalation.
use rusqlite::Result;

use crate::config::RetrievalConfig;
use crate::index::search::TierHit;
use crate::index::{Db, Tier};

/// A retrieved chunk with its tier of origin.
#[derive(Debug, Clone)]
pub struct ScoredChunk {
    pub hit: TierHit,
    pub tier: Tier,
}

/// Outcome of the retrieval stage, before dedup and expansion.
#[derive(Debug, Default)]
pub struct RetrievalOutcome {
    pub chunks: Vec<ScoredChunk>,
    pub escalated: bool,
}

/// Runs the core search and decides whether to escalate to longtail.
///
/// Escalation is one-shot per query: it happens when the caller asked for
/// anecdotes up front or when fewer than `min_strong_hits` core results
/// clear the score floor. There is never a second escalation round.
pub struct Retriever<'a> {
    db: &'a Db,
    cfg: &'a RetrievalConfig,
}

impl<'a> Retriever<'a> {
    pub fn new(db: &'a Db, cfg: &'a RetrievalConfig) -> Self {
        Self { db, cfg }
    }

    pub fn retrieve(
        &self,
        query_vector: &[f32],
        use_longtail: bool,
    ) -> Result<RetrievalOutcome> {
        let core_hits = self.db.search_tier(query_vector, Tier::Core, self.cfg.core_top_k)?;

        let strong = core_hits
            .iter()
            .filter(|h| h.similarity >= self.cfg.score_floor)
            .count();
        let escalate = use_longtail || strong < self.cfg.min_strong_hits;

        let longtail_hits = if escalate {
            self.db
                .search_tier(query_vector, Tier::Longtail, self.cfg.longtail_top_k)?
        } else {
            Vec::new()
        };

        // Below-floor hits are dropped entirely; they feed neither the
        // answer nor the confidence statistic.
        let mut chunks: Vec<ScoredChunk> = core_hits
            .into_iter()
            .filter(|h| h.similarity >= self.cfg.score_floor)
            .map(|hit| ScoredChunk {
                hit,
                tier: Tier::Core,
            })
            .chain(
                longtail_hits
                    .into_iter()
                    .filter(|h| h.similarity >= self.cfg.score_floor)
                    .map(|hit| ScoredChunk {
                        hit,
                        tier: Tier::Longtail,
                    }),
            )
            .collect();

        // Score descending; ties break core-first so substantive material
        // outranks anecdotes at equal similarity.
        chunks.sort_by(|a, b| {
            b.hit
                .similarity
                .partial_cmp(&a.hit.similarity)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| match (a.tier, b.tier) {
                    (Tier::Core, Tier::Longtail) => std::cmp::Ordering::Less,
                    (Tier::Longtail, Tier::Core) => std::cmp::Ordering::Greater,
                    _ => std::cmp::Ordering::Equal,
                })
        });

        Ok(RetrievalOutcome {
            chunks,
            escalated: escalate,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RetrievalConfig;
    use crate::index::models::{NewChunk, VideoMeta};

    fn scaled_vec(main_axis: usize, len: f32) -> Vec<f32> {
        let mut v = vec![0.0f32; 384];
        v[main_axis] = len;
        v
    }

    /// Unit vector with a known cosine against axis 0.
    fn vec_with_cosine(cos: f32) -> Vec<f32> {
        let mut v = vec![0.0f32; 384];
        v[0] = cos;
        v[1] = (1.0 - cos * cos).sqrt();
        v
    }

    fn test_db(core_cosines: &[f32], longtail_cosines: &[f32]) -> Db {
        let mut db = Db::open_in_memory().unwrap();
        let video = VideoMeta {
            video_id: "vid".into(),
            title: "Episode".into(),
            guest: None,
        };

        let mut parents = Vec::new();
        let mut specs = Vec::new();
        for (i, &cos) in core_cosines.iter().enumerate() {
            parents.push((format!("p-core-{i}"), i, format!("parent core {i}")));
            specs.push((format!("c-core-{i}"), format!("p-core-{i}"), Tier::Core, cos));
        }
        let base = core_cosines.len();
        for (i, &cos) in longtail_cosines.iter().enumerate() {
            parents.push((format!("p-lt-{i}"), base + i, format!("parent lt {i}")));
            specs.push((format!("c-lt-{i}"), format!("p-lt-{i}"), Tier::Longtail, cos));
        }

        let texts: Vec<String> = specs.iter().map(|(id, ..)| format!("text {id}")).collect();
        let chunks: Vec<NewChunk<'_>> = specs
            .iter()
            .zip(texts.iter())
            .map(|((chunk_id, parent_id, tier, _), text)| NewChunk {
                chunk_id,
                parent_id,
                tier: *tier,
                position: 0,
                start_seconds: 0.0,
                end_seconds: 10.0,
                speaker: None,
                content: text,
            })
            .collect();
        let embeddings: Vec<Vec<f32>> = specs.iter().map(|(.., cos)| vec_with_cosine(*cos)).collect();

        db.insert_video(&video, &parents, &chunks, &embeddings).unwrap();
        db
    }

    fn cfg() -> RetrievalConfig {
        RetrievalConfig {
            core_top_k: 12,
            longtail_top_k: 6,
            score_floor: 0.60,
            min_strong_hits: 5,
            max_per_parent: 2,
            max_per_video: 3,
            parent_window_percent: 0.25,
        }
    }

    #[test]
    fn test_no_escalation_with_enough_strong_hits() {
        let db = test_db(&[0.95, 0.90, 0.85, 0.80, 0.75], &[0.99]);
        let cfg = cfg();
        let out = Retriever::new(&db, &cfg)
            .retrieve(&scaled_vec(0, 1.0), false)
            .unwrap();

        assert!(!out.escalated);
        assert!(out.chunks.iter().all(|c| c.tier == Tier::Core));
        assert_eq!(out.chunks.len(), 5);
    }

    #[test]
    fn test_escalates_when_few_strong_hits() {
        let db = test_db(&[0.95, 0.90, 0.30], &[0.80]);
        let cfg = cfg();
        let out = Retriever::new(&db, &cfg)
            .retrieve(&scaled_vec(0, 1.0), false)
            .unwrap();

        assert!(out.escalated);
        assert!(out.chunks.iter().any(|c| c.tier == Tier::Longtail));
        // weak core hit dropped by the floor
        assert_eq!(out.chunks.len(), 3);
    }

    #[test]
    fn test_explicit_longtail_flag() {
        let db = test_db(&[0.95, 0.90, 0.85, 0.80, 0.75], &[0.70]);
        let cfg = cfg();
        let out = Retriever::new(&db, &cfg)
            .retrieve(&scaled_vec(0, 1.0), true)
            .unwrap();

        assert!(out.escalated);
        assert!(out.chunks.iter().any(|c| c.tier == Tier::Longtail));
    }

    #[test]
    fn test_sorted_descending() {
        let db = test_db(&[0.70, 0.95, 0.80], &[]);
        let cfg = cfg();
        let out = Retriever::new(&db, &cfg)
            .retrieve(&scaled_vec(0, 1.0), false)
            .unwrap();

        for pair in out.chunks.windows(2) {
            assert!(pair[0].hit.similarity >= pair[1].hit.similarity);
        }
    }

    #[test]
    fn test_nothing_above_floor() {
        let db = test_db(&[0.30, 0.20], &[0.10]);
        let cfg = cfg();
        let out = Retriever::new(&db, &cfg)
            .retrieve(&scaled_vec(0, 1.0), false)
            .unwrap();

        assert!(out.escalated, "weak core results trigger escalation");
        assert!(out.chunks.is_empty(), "below-floor hits are dropped");
    }
}

use super::{Db, Tier, models::ChunkMeta, serialize_vector};
use rusqlite::Result;
use rusqlite::types::Value;

/// A chunk returned from one tier's nearest-neighbor scan.
#[derive(Debug, Clone)]
pub struct TierHit {
    pub chunk: ChunkMeta,
    /// Cosine similarity in [-1, 1]; thresholds are calibrated on this scale.
    pub similarity: f64,
}

fn map_hit_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<TierHit> {
    let distance: f64 = row.get(10)?;
    // vec_distance_cosine returns 1 - cos; invert back to raw cosine so
    // score floors match the embedding model's calibration.
    let similarity = 1.0 - distance;

    Ok(TierHit {
        chunk: ChunkMeta {
            chunk_id: row.get(0)?,
            parent_id: row.get(1)?,
            video_id: row.get(2)?,
            video_title: row.get(3)?,
            guest: row.get(4)?,
            speaker: row.get(5)?,
            position: row.get::<_, i64>(6)? as usize,
            start_seconds: row.get(7)?,
            end_seconds: row.get(8)?,
            text: row.get(9)?,
        },
        similarity,
    })
}

impl Db {
    /// Top-K cosine search in a single tier.
    ///
    /// Each row carries full chunk metadata joined from `chunks` and
    /// `videos`, so no second lookup is needed to build citations.
    pub fn search_tier(
        &self,
        query_vector: &[f32],
        tier: Tier,
        top_k: usize,
    ) -> Result<Vec<TierHit>> {
        let query = format!(
            r#"
            SELECT
                c.chunk_id,
                c.parent_id,
                c.video_id,
                v.title,
                v.guest,
                c.speaker,
                c.position,
                c.start_seconds,
                c.end_seconds,
                c.content,
                vec_distance_cosine(t.embedding, ?) as distance
            FROM {} t
            JOIN chunks c ON t.rowid = c.id
            JOIN videos v ON c.video_id = v.video_id
            ORDER BY distance ASC
            LIMIT ?
            "#,
            tier.table()
        );

        let params: Vec<Value> = vec![
            Value::Blob(serialize_vector(query_vector)),
            Value::Integer(top_k as i64),
        ];
        let param_refs: Vec<&dyn rusqlite::ToSql> =
            params.iter().map(|p| p as &dyn rusqlite::ToSql).collect();

        let mut stmt = self.conn.prepare(&query)?;
        let rows = stmt.query_map(param_refs.as_slice(), map_hit_row)?;

        let mut results = Vec::new();
        for row in rows {
            results.push(row?);
        }

        Ok(results)
    }
}

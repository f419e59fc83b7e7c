use super::{Db, Tier, models::*, serialize_vector};
use rusqlite::{OptionalExtension, Result, params};

impl Db {
    /// Inserts or replaces an episode with its parents, chunks, and embeddings.
    ///
    /// Re-indexing an existing video wipes its previous parents, chunks, and
    /// vectors first, so a build over the same corpus is a clean replace.
    pub fn insert_video(
        &mut self,
        video: &VideoMeta,
        parents: &[(String, usize, String)],
        chunks: &[NewChunk<'_>],
        embeddings: &[Vec<f32>],
    ) -> Result<()> {
        assert_eq!(
            chunks.len(),
            embeddings.len(),
            "chunks and embeddings length mismatch"
        );

        let tx = self.conn.transaction()?;

        tx.execute(
            r#"
            INSERT INTO videos (video_id, title, guest, indexed_at)
            VALUES (?, ?, ?, CURRENT_TIMESTAMP)
            ON CONFLICT(video_id) DO UPDATE SET
                title = excluded.title,
                guest = excluded.guest,
                indexed_at = CURRENT_TIMESTAMP
            "#,
            params![video.video_id, video.title, video.guest],
        )?;

        // Clean up old contents if any (re-indexing). Virtual tables do not
        // participate in cascades, so vectors go first.
        tx.execute(
            "DELETE FROM vec_core WHERE rowid IN (SELECT id FROM chunks WHERE video_id = ? AND tier = 'core')",
            params![video.video_id],
        )?;
        tx.execute(
            "DELETE FROM vec_longtail WHERE rowid IN (SELECT id FROM chunks WHERE video_id = ? AND tier = 'longtail')",
            params![video.video_id],
        )?;
        tx.execute(
            "DELETE FROM chunks WHERE video_id = ?",
            params![video.video_id],
        )?;
        tx.execute(
            "DELETE FROM parents WHERE video_id = ?",
            params![video.video_id],
        )?;

        for (parent_id, position, content) in parents {
            tx.execute(
                "INSERT INTO parents (parent_id, video_id, position, content) VALUES (?, ?, ?, ?)",
                params![parent_id, video.video_id, *position as i64, content],
            )?;
        }

        for (i, chunk) in chunks.iter().enumerate() {
            tx.execute(
                r#"
                INSERT INTO chunks (chunk_id, parent_id, video_id, tier, position, start_seconds, end_seconds, speaker, content)
                VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
                "#,
                params![
                    chunk.chunk_id,
                    chunk.parent_id,
                    video.video_id,
                    chunk.tier.as_str(),
                    chunk.position as i64,
                    chunk.start_seconds,
                    chunk.end_seconds,
                    chunk.speaker,
                    chunk.content,
                ],
            )?;
            let rowid = tx.last_insert_rowid();

            let vector_blob = serialize_vector(&embeddings[i]);
            let insert_sql = match chunk.tier {
                Tier::Core => "INSERT INTO vec_core (rowid, embedding) VALUES (?, ?)",
                Tier::Longtail => "INSERT INTO vec_longtail (rowid, embedding) VALUES (?, ?)",
            };
            tx.execute(insert_sql, params![rowid, vector_blob])?;
        }

        tx.commit()?;
        Ok(())
    }

    /// Fetch a parent span by its identifier.
    pub fn get_parent(&self, parent_id: &str) -> Result<Option<ParentSpan>> {
        self.conn
            .query_row(
                "SELECT parent_id, video_id, position, content FROM parents WHERE parent_id = ?",
                params![parent_id],
                |row| {
                    Ok(ParentSpan {
                        parent_id: row.get(0)?,
                        video_id: row.get(1)?,
                        position: row.get::<_, i64>(2)? as usize,
                        text: row.get(3)?,
                    })
                },
            )
            .optional()
    }

    /// Fetch episode metadata by video id.
    pub fn get_video(&self, video_id: &str) -> Result<Option<VideoMeta>> {
        self.conn
            .query_row(
                "SELECT video_id, title, guest FROM videos WHERE video_id = ?",
                params![video_id],
                |row| {
                    Ok(VideoMeta {
                        video_id: row.get(0)?,
                        title: row.get(1)?,
                        guest: row.get(2)?,
                    })
                },
            )
            .optional()
    }
}

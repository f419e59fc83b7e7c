//! Two-tier vector index over SQLite and sqlite-vec.
//!
//! One database holds the transcript metadata (videos, parents, chunks) and
//! two independent vec0 virtual tables: `vec_core` for substantive chunks
//! and `vec_longtail` for anecdotes. The index is built offline and opened
//! read-only at serve time; a full rebuild is the only mutation path.
use rusqlite::{Connection, Result};
use sqlite_vec::sqlite3_vec_init;
use std::path::Path;
use std::sync::Once;
use tracing::info;

pub mod builder;
pub mod models;
pub mod search;
pub mod writer;

pub use models::{ChunkMeta, ParentSpan, Tier, VideoMeta};

const SCHEMA_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS videos (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    video_id TEXT NOT NULL UNIQUE,
    title TEXT NOT NULL,
    guest TEXT,
    indexed_at DATETIME DEFAULT CURRENT_TIMESTAMP
);

CREATE INDEX IF NOT EXISTS idx_video_id ON videos(video_id);

CREATE TABLE IF NOT EXISTS parents (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    parent_id TEXT NOT NULL UNIQUE,
    video_id TEXT NOT NULL,
    position INTEGER NOT NULL,
    content TEXT NOT NULL,
    FOREIGN KEY (video_id) REFERENCES videos(video_id) ON DELETE CASCADE
);

CREATE INDEX IF NOT EXISTS idx_parent_id ON parents(parent_id);
CREATE INDEX IF NOT EXISTS idx_parent_video ON parents(video_id);

CREATE TABLE IF NOT EXISTS chunks (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    chunk_id TEXT NOT NULL UNIQUE,
    parent_id TEXT NOT NULL,
    video_id TEXT NOT NULL,
    tier TEXT NOT NULL,
    position INTEGER NOT NULL,
    start_seconds REAL NOT NULL,
    end_seconds REAL NOT NULL,
    speaker TEXT,
    content TEXT NOT NULL,
    FOREIGN KEY (parent_id) REFERENCES parents(parent_id) ON DELETE CASCADE,
    FOREIGN KEY (video_id) REFERENCES videos(video_id) ON DELETE CASCADE
);

CREATE INDEX IF NOT EXISTS idx_chunk_parent ON chunks(parent_id);
CREATE INDEX IF NOT EXISTS idx_chunk_video ON chunks(video_id);
CREATE INDEX IF NOT EXISTS idx_chunk_tier ON chunks(tier);

CREATE VIRTUAL TABLE IF NOT EXISTS vec_core USING vec0(
    embedding FLOAT[384]
);

CREATE VIRTUAL TABLE IF NOT EXISTS vec_longtail USING vec0(
    embedding FLOAT[384]
);
"#;

static INIT_VEC: Once = Once::new();

/// Initialize the sqlite-vec extension. Safe to call multiple times.
fn init_sqlite_vec() {
    INIT_VEC.call_once(|| unsafe {
        rusqlite::ffi::sqlite3_auto_extension(Some(std::mem::transmute(
            sqlite3_vec_init as *const (),
        )));
    });
}

/// A wrapper around a SQLite connection initialized with sqlite-vec and the
/// transcript index schema.
pub struct Db {
    pub(crate) conn: Connection,
}

impl Db {
    /// Open a database connection at the given path and initialize the schema.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        info!("Initializing index database: {}", path.display());

        // Register sqlite-vec extension globally
        init_sqlite_vec();

        let conn = Connection::open(path)?;

        // Verify sqlite-vec is loaded
        let vec_version: String = conn.query_row("SELECT vec_version()", [], |row| row.get(0))?;
        info!("sqlite-vec version: {}", vec_version);

        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        conn.execute_batch(SCHEMA_SQL)?;

        info!("Index database initialized");

        Ok(Self { conn })
    }

    /// Open an in-memory database connection (useful for testing).
    pub fn open_in_memory() -> Result<Self> {
        init_sqlite_vec();
        let conn = Connection::open_in_memory()?;
        let vec_version: String = conn.query_row("SELECT vec_version()", [], |row| row.get(0))?;
        info!("sqlite-vec version: {}", vec_version);
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        conn.execute_batch(SCHEMA_SQL)?;
        Ok(Self { conn })
    }

    /// Number of indexed chunks in the given tier.
    pub fn chunk_count(&self, tier: Tier) -> Result<usize> {
        let count: i64 = self.conn.query_row(
            "SELECT count(*) FROM chunks WHERE tier = ?",
            [tier.as_str()],
            |row| row.get(0),
        )?;
        Ok(count as usize)
    }

    /// Number of indexed videos.
    pub fn video_count(&self) -> Result<usize> {
        let count: i64 = self
            .conn
            .query_row("SELECT count(*) FROM videos", [], |row| row.get(0))?;
        Ok(count as usize)
    }

    /// Time of the most recent index build, if any videos are indexed.
    pub fn last_indexed_at(&self) -> Result<Option<chrono::DateTime<chrono::Utc>>> {
        self.conn
            .query_row("SELECT MAX(indexed_at) FROM videos", [], |row| row.get(0))
    }
}

/// Helper to serialize a float32 vector into bytes for vec0 virtual tables.
pub fn serialize_vector(vec: &[f32]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(vec.len() * 4);
    for v in vec {
        bytes.extend_from_slice(&v.to_le_bytes());
    }
    bytes
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_db_init() {
        let db = Db::open_in_memory().expect("Failed to open in-memory DB");

        let tables: usize = db.conn.query_row(
            "SELECT count(*) FROM sqlite_master WHERE type='table' AND name IN ('videos', 'parents', 'chunks', 'vec_core', 'vec_longtail');",
            [],
            |row| row.get(0),
        ).unwrap();

        assert_eq!(tables, 5);
    }

    #[test]
    fn test_empty_counts() {
        let db = Db::open_in_memory().unwrap();
        assert_eq!(db.chunk_count(Tier::Core).unwrap(), 0);
        assert_eq!(db.chunk_count(Tier::Longtail).unwrap(), 0);
        assert_eq!(db.video_count().unwrap(), 0);
    }

    #[test]
    fn test_serialize_vector() {
        let vec = vec![1.0, 2.0, -3.5];
        let bytes = serialize_vector(&vec);
        assert_eq!(bytes.len(), 12);

        // 1.0f32 in hex: 0x3f800000 -> little endian: 00 00 80 3f
        assert_eq!(&bytes[0..4], &[0x00, 0x00, 0x80, 0x3f]);
        // 2.0f32 in hex: 0x40000000 -> little endian: 00 00 00 40
        assert_eq!(&bytes[4..8], &[0x00, 0x00, 0x00, 0x40]);
        // -3.5f32 in hex: 0xc0600000 -> little endian: 00 00 60 c0
        assert_eq!(&bytes[8..12], &[0x00, 0x00, 0x60, 0xc0]);
    }
}

//! Text embedding for transcript chunks and incoming queries.
//!
//! One shared embedder instance serves both the offline index build and
//! query-time encoding, so both sides of the similarity comparison come
//! from the same model weights.
pub mod download;
pub mod mock;
pub mod onnx;
pub mod tokenizer;

use thiserror::Error;

/// Errors raised while encoding text into vectors.
#[derive(Error, Debug)]
pub enum EmbedderError {
    #[error("inference failed: {0}")]
    InferenceFailed(String),

    #[error("model load failed: {0}")]
    ModelLoadFailed(String),

    #[error("tokenizer error: {0}")]
    TokenizerError(String),
}

/// Text-to-vector encoder.
///
/// Implementations must be `Send + Sync`; the server shares a single
/// instance across request handlers behind `Arc`.
pub trait Embedder: Send + Sync {
    /// Encode one text into a dense vector.
    fn embed(&self, text: &str) -> Result<Vec<f32>, EmbedderError>;

    /// Encode a batch of texts.
    fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, EmbedderError>;

    /// Output vector dimensionality.
    fn dimensions(&self) -> usize;
}

//! Embedding backends
//!
//! Every backend maps text to a fixed-dimension vector, deterministically for a
//! given model version, and identifies that version through [`Embedder::model_id`].
//! Corpus snapshots are stamped with the id so queries are never served
//! against vectors produced by a different model.

pub mod dense;
pub mod hashing;

pub use dense::BertEmbedder;
pub use hashing::HashingEmbedder;

use crate::error::EmbeddingError;

/// Text embedding capability
pub trait Embedder: Send + Sync {
    /// Identifier of the model version producing the vectors
    fn model_id(&self) -> &str;

    /// Length of every vector returned by [`Embedder::embed`]
    fn dimension(&self) -> usize;

    /// Embed one text. Fails with [`EmbeddingError::EmptyInput`] on blank input.
    fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError>;

    /// Embed many texts, preserving order
    fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        texts.iter().map(|t| self.embed(t)).collect()
    }
}

/// Trimmed text, or `EmptyInput`
pub(crate) fn require_text(text: &str) -> Result<&str, EmbeddingError> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Err(EmbeddingError::EmptyInput);
    }
    Ok(trimmed)
}

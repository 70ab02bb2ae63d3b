//! Vector index - top-k similarity search over passage embeddings
//!
//! The similarity metric is fixed: cosine similarity, computed as the inner
//! product of L2-normalised vectors. Results are ordered by descending
//! similarity; equal similarities are ordered by ascending passage id so that
//! repeated searches are bit-for-bit reproducible.
//!
//! [`ExactIndex`] scores every stored vector. An approximate structure can
//! replace it behind the [`VectorIndex`] trait without touching callers.

pub mod exact;
pub mod similarity;

pub use exact::ExactIndex;

use crate::error::ClaimError;
use serde::{Deserialize, Serialize};

/// One search hit
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Neighbor {
    pub passage_id: u64,
    pub similarity: f32,
}

/// Top-k similarity search contract
pub trait VectorIndex: Send + Sync {
    /// Dimensionality every query vector must have
    fn dimension(&self) -> usize;

    /// Number of indexed vectors
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Return at most `k` neighbours, best first.
    ///
    /// `k` larger than the index returns every entry; `k == 0` returns nothing.
    /// Fails only with [`ClaimError::DimensionMismatch`].
    fn search(&self, query: &[f32], k: usize) -> Result<Vec<Neighbor>, ClaimError>;
}

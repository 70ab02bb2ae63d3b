//! Feature-hashing embedder
//!
//! Projects stemmed content words (weight 1.0) and adjacent word pairs
//! (weight 0.5) into `dimension` signed buckets using 64-bit FNV-1a, then
//! L2-normalises. No model files, fully deterministic across platforms, which
//! makes it the default for fixtures and offline deployments.

use super::{require_text, Embedder};
use crate::error::{ClaimError, EmbeddingError};
use crate::index::similarity::normalize;
use crate::text::{content_terms, tokenize};

const FNV_OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
const FNV_PRIME: u64 = 0x0000_0100_0000_01b3;

const UNIGRAM_WEIGHT: f32 = 1.0;
const BIGRAM_WEIGHT: f32 = 0.5;

/// Default dimensionality
pub const DEFAULT_HASHING_DIM: usize = 384;

#[derive(Debug, Clone)]
pub struct HashingEmbedder {
    dimension: usize,
    model_id: String,
}

impl HashingEmbedder {
    pub fn new(dimension: usize) -> Result<Self, ClaimError> {
        if dimension == 0 {
            return Err(ClaimError::InvalidConfig(
                "hashing embedder dimension must be positive".to_string(),
            ));
        }
        Ok(Self {
            dimension,
            model_id: format!("hashing-fnv1a-v1-d{dimension}"),
        })
    }

    fn accumulate(&self, vector: &mut [f32], feature: &str, weight: f32) {
        let hash = fnv1a(feature.as_bytes());
        let bucket = (hash % self.dimension as u64) as usize;
        let sign = if hash >> 63 == 0 { 1.0 } else { -1.0 };
        vector[bucket] += sign * weight;
    }
}

impl Default for HashingEmbedder {
    fn default() -> Self {
        Self {
            dimension: DEFAULT_HASHING_DIM,
            model_id: format!("hashing-fnv1a-v1-d{DEFAULT_HASHING_DIM}"),
        }
    }
}

pub fn fnv1a(bytes: &[u8]) -> u64 {
    let mut hash = FNV_OFFSET;
    for b in bytes {
        hash ^= u64::from(*b);
        hash = hash.wrapping_mul(FNV_PRIME);
    }
    hash
}

impl Embedder for HashingEmbedder {
    fn model_id(&self) -> &str {
        &self.model_id
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        let text = require_text(text)?;

        let mut terms = content_terms(text);
        if terms.is_empty() {
            // Only function words: fall back to the raw tokens
            terms = tokenize(text);
        }

        let mut vector = vec![0.0f32; self.dimension];
        for term in &terms {
            self.accumulate(&mut vector, term, UNIGRAM_WEIGHT);
        }
        for pair in terms.windows(2) {
            let bigram = format!("{} {}", pair[0], pair[1]);
            self.accumulate(&mut vector, &bigram, BIGRAM_WEIGHT);
        }
        normalize(&mut vector);
        Ok(vector)
    }
}

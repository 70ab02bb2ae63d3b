//! Search module - claim search over the corpus
//!
//! This module provides:
//! - The query orchestrator (`search_claim`)
//! - Score fusion of retrieval similarity and stance confidence
//! - A bounded cache of final query results

pub mod cache;
pub mod fusion;
pub mod orchestrator;

pub use cache::QueryCache;
pub use fusion::ScoreFusion;
pub use orchestrator::QueryOrchestrator;

use serde::{Deserialize, Serialize};

use crate::passage::Passage;
use crate::stance::{Stance, StancePrediction};

/// Default number of results when the caller does not ask for a count
pub const DEFAULT_TOP_K: usize = 5;

/// One labelled, source-attributed piece of evidence
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryResult {
    pub label: Stance,
    pub text: String,
    pub url: String,
    /// Fused ranking score
    pub score: f32,
    pub passage_id: u64,
    pub title: String,
    /// Cosine similarity from the vector index
    pub similarity: f32,
    /// Classifier confidence in `label`
    pub confidence: f32,
}

impl QueryResult {
    /// Copy the passage fields and attach the stance and fused score
    pub fn new(passage: &Passage, similarity: f32, prediction: StancePrediction, score: f32) -> Self {
        Self {
            label: prediction.label,
            text: passage.text.clone(),
            url: passage.url.clone(),
            score,
            passage_id: passage.id,
            title: passage.title.clone(),
            similarity,
            confidence: prediction.confidence,
        }
    }
}

//! Request and response bodies for the claim API

use claim_core::{Passage, QueryResult, DEFAULT_TOP_K};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchRequest {
    pub claim: String,
    #[serde(default = "default_top_k")]
    pub top_k: usize,
}

fn default_top_k() -> usize {
    DEFAULT_TOP_K
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResponse {
    pub claim: String,
    pub results: Vec<QueryResult>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub passages: usize,
    pub dimension: usize,
    pub embedding_model_id: String,
    pub classifier_model_id: String,
}

/// A stored passage without its embedding
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PassageResponse {
    pub id: u64,
    pub title: String,
    pub text: String,
    pub url: String,
}

impl From<&Passage> for PassageResponse {
    fn from(passage: &Passage) -> Self {
        Self {
            id: passage.id,
            title: passage.title.clone(),
            text: passage.text.clone(),
            url: passage.url.clone(),
        }
    }
}

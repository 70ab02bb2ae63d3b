//! Score fusion for claim search results
//!
//! Combines the retrieval similarity of a candidate with the confidence of its
//! stance prediction into a single ranking score.
//!
//! # Formula
//!
//! ```text
//! relevance(label) = 1.0            for support and refute
//!                  = nei_relevance  for not_enough_info
//! score = w_sim * similarity + w_stance * confidence * relevance(label)
//! ```
//!
//! With the default `nei_relevance` of 0, neutral passages rank on similarity
//! alone.
//!
//! # Ordering
//!
//! Score descending, then passage id ascending. `f32::total_cmp` keeps the
//! order total even for pathological inputs.

use std::cmp::Ordering;

use super::QueryResult;
use crate::config::FusionWeights;
use crate::stance::{Stance, StancePrediction};

#[derive(Debug, Clone, Copy, Default)]
pub struct ScoreFusion {
    weights: FusionWeights,
}

impl ScoreFusion {
    pub fn new(weights: FusionWeights) -> Self {
        Self { weights }
    }

    /// How much a label's confidence contributes to the score
    pub fn relevance(&self, label: Stance) -> f32 {
        if label.is_informative() {
            1.0
        } else {
            self.weights.nei_relevance
        }
    }

    pub fn score(&self, similarity: f32, prediction: &StancePrediction) -> f32 {
        self.weights.similarity * similarity
            + self.weights.stance * prediction.confidence * self.relevance(prediction.label)
    }

    /// Sort best first and keep at most `top_k`
    pub fn rank(mut results: Vec<QueryResult>, top_k: usize) -> Vec<QueryResult> {
        results.sort_by(compare);
        results.truncate(top_k);
        results
    }
}

fn compare(a: &QueryResult, b: &QueryResult) -> Ordering {
    b.score
        .total_cmp(&a.score)
        .then_with(|| a.passage_id.cmp(&b.passage_id))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result(passage_id: u64, score: f32) -> QueryResult {
        QueryResult {
            label: Stance::Support,
            text: "test".to_string(),
            url: "https://en.wikipedia.org/wiki/Test".to_string(),
            score,
            passage_id,
            title: "Test".to_string(),
            similarity: score,
            confidence: 1.0,
        }
    }

    #[test]
    fn test_default_score() {
        let fusion = ScoreFusion::default();
        let support = StancePrediction::new(Stance::Support, 0.9);
        // 0.5 * 0.8 + 0.5 * 0.9
        assert!((fusion.score(0.8, &support) - 0.85).abs() < 1e-6);
    }

    #[test]
    fn test_refute_counts_like_support() {
        let fusion = ScoreFusion::default();
        let support = StancePrediction::new(Stance::Support, 0.7);
        let refute = StancePrediction::new(Stance::Refute, 0.7);
        assert_eq!(fusion.score(0.6, &support), fusion.score(0.6, &refute));
    }

    #[test]
    fn test_nei_confidence_ignored_by_default() {
        let fusion = ScoreFusion::default();
        let nei = StancePrediction::new(Stance::NotEnoughInfo, 0.6);
        assert!((fusion.score(0.8, &nei) - 0.4).abs() < 1e-6);

        let weighted = ScoreFusion::new(FusionWeights {
            nei_relevance: 0.5,
            ..FusionWeights::default()
        });
        // 0.4 + 0.5 * 0.6 * 0.5
        assert!((weighted.score(0.8, &nei) - 0.55).abs() < 1e-6);
    }

    #[test]
    fn test_informative_passage_outranks_neutral_one() {
        let fusion = ScoreFusion::default();
        let nei = fusion.score(0.9, &StancePrediction::new(Stance::NotEnoughInfo, 0.6));
        let support = fusion.score(0.7, &StancePrediction::new(Stance::Support, 0.8));
        assert!(support > nei);
    }

    #[test]
    fn test_rank_orders_by_score_then_id() {
        let ranked = ScoreFusion::rank(
            vec![result(5, 0.4), result(3, 0.9), result(1, 0.4), result(2, 0.7)],
            10,
        );
        let ids: Vec<u64> = ranked.iter().map(|r| r.passage_id).collect();
        assert_eq!(ids, vec![3, 2, 1, 5]);
    }

    #[test]
    fn test_rank_truncates_without_padding() {
        let results = vec![result(0, 0.1), result(1, 0.2), result(2, 0.3)];
        assert_eq!(ScoreFusion::rank(results.clone(), 2).len(), 2);
        assert_eq!(ScoreFusion::rank(results, 10).len(), 3);
        assert!(ScoreFusion::rank(Vec::new(), 3).is_empty());
    }
}

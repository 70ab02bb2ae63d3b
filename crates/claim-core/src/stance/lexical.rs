//! Heuristic stance classifier
//!
//! Works sentence by sentence. The passage sentence covering the largest share
//! of the claim's content words decides the outcome:
//! - coverage below `support_threshold` → `not_enough_info`, confidence in
//!   `[0.3, 0.6]` (higher when the sentence is further from the claim);
//! - otherwise `refute` when negation parity differs or the numbers conflict,
//!   `support` when they agree, confidence `0.5 + 0.5 * coverage`.

use std::collections::BTreeSet;

use super::{Stance, StanceClassifier, StancePrediction};
use crate::error::{ClaimError, ClassificationError};
use crate::text::{content_terms, negation_count, numbers, sentences};

pub const DEFAULT_SUPPORT_THRESHOLD: f32 = 0.6;

const NEI_FLOOR: f32 = 0.3;
const NEI_SPAN: f32 = 0.3;

#[derive(Debug, Clone)]
pub struct LexicalStanceClassifier {
    support_threshold: f32,
    model_id: String,
}

impl LexicalStanceClassifier {
    pub fn new(support_threshold: f32) -> Result<Self, ClaimError> {
        if !(support_threshold > 0.0 && support_threshold <= 1.0) {
            return Err(ClaimError::InvalidConfig(format!(
                "support threshold must be in (0, 1], got {support_threshold}"
            )));
        }
        Ok(Self {
            support_threshold,
            model_id: format!("lexical-stance-v1-t{support_threshold}"),
        })
    }

    pub fn support_threshold(&self) -> f32 {
        self.support_threshold
    }

    fn not_enough_info(&self, coverage: f32) -> StancePrediction {
        let distance = 1.0 - (coverage / self.support_threshold).min(1.0);
        StancePrediction::new(Stance::NotEnoughInfo, NEI_FLOOR + NEI_SPAN * distance)
    }
}

impl Default for LexicalStanceClassifier {
    fn default() -> Self {
        Self {
            support_threshold: DEFAULT_SUPPORT_THRESHOLD,
            model_id: format!("lexical-stance-v1-t{DEFAULT_SUPPORT_THRESHOLD}"),
        }
    }
}

struct SentenceMatch<'a> {
    sentence: &'a str,
    coverage: f32,
}

fn best_sentence<'a>(claim_terms: &BTreeSet<String>, passage: &'a str) -> Option<SentenceMatch<'a>> {
    let mut best: Option<SentenceMatch<'a>> = None;
    for sentence in sentences(passage) {
        let terms: BTreeSet<String> = content_terms(sentence).into_iter().collect();
        let matched = claim_terms.iter().filter(|t| terms.contains(*t)).count();
        let coverage = matched as f32 / claim_terms.len() as f32;
        // First sentence wins ties
        if best.as_ref().map_or(true, |b| coverage > b.coverage) {
            best = Some(SentenceMatch { sentence, coverage });
        }
    }
    best
}

/// Claim states numbers, the sentence states numbers, and none agree
fn numbers_conflict(claim: &str, sentence: &str) -> bool {
    let claimed = numbers(claim);
    let stated = numbers(sentence);
    !claimed.is_empty() && !stated.is_empty() && !claimed.iter().any(|n| stated.contains(n))
}

impl StanceClassifier for LexicalStanceClassifier {
    fn model_id(&self) -> &str {
        &self.model_id
    }

    fn classify(&self, claim: &str, passage: &str) -> Result<StancePrediction, ClassificationError> {
        let claim_terms: BTreeSet<String> = content_terms(claim).into_iter().collect();
        if claim_terms.is_empty() {
            return Ok(self.not_enough_info(0.0));
        }

        let Some(best) = best_sentence(&claim_terms, passage) else {
            return Ok(self.not_enough_info(0.0));
        };
        if best.coverage < self.support_threshold {
            return Ok(self.not_enough_info(best.coverage));
        }

        let polarity_flipped = negation_count(claim) % 2 != negation_count(best.sentence) % 2;
        let label = if polarity_flipped || numbers_conflict(claim, best.sentence) {
            Stance::Refute
        } else {
            Stance::Support
        };
        Ok(StancePrediction::new(label, 0.5 + 0.5 * best.coverage))
    }
}

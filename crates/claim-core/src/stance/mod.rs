//! Stance classification - does a passage support or refute a claim?
//!
//! Classifiers are the most expensive stage of a query and only ever see the
//! candidates returned by the vector index. They must be deterministic for a
//! fixed model and must not fail on unrelated input: unrelated pairs resolve to
//! [`Stance::NotEnoughInfo`] with low to moderate confidence.

pub mod lexical;
pub mod nli;

pub use lexical::LexicalStanceClassifier;
pub use nli::NliClassifier;

use crate::error::ClassificationError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Relationship of a passage to a claim
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stance {
    Support,
    Refute,
    NotEnoughInfo,
}

impl Stance {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stance::Support => "support",
            Stance::Refute => "refute",
            Stance::NotEnoughInfo => "not_enough_info",
        }
    }

    /// Support or refute, as opposed to neutral
    pub fn is_informative(&self) -> bool {
        !matches!(self, Stance::NotEnoughInfo)
    }
}

impl fmt::Display for Stance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Classifier output
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StancePrediction {
    pub label: Stance,
    /// Probability-like confidence in `[0, 1]`
    pub confidence: f32,
}

impl StancePrediction {
    pub fn new(label: Stance, confidence: f32) -> Self {
        Self {
            label,
            confidence: if confidence.is_finite() {
                confidence.clamp(0.0, 1.0)
            } else {
                0.0
            },
        }
    }
}

/// (claim, passage) stance inference capability
pub trait StanceClassifier: Send + Sync {
    /// Identifier of the model version
    fn model_id(&self) -> &str;

    /// Classify one pair. Fails only when the backend is unavailable.
    fn classify(&self, claim: &str, passage: &str) -> Result<StancePrediction, ClassificationError>;
}

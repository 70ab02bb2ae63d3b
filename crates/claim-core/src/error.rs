//! Error types for claim verification
//!
//! Startup errors (`CorpusLoad`, `ModelMismatch`, `DimensionMismatch`,
//! `InvalidConfig`) abort initialisation. Per-query errors are returned to the
//! caller typed, never folded into an empty result list.

use std::time::Duration;
use thiserror::Error;

/// Failures raised by an [`crate::embeddings::Embedder`]
#[derive(Debug, Error, Clone, PartialEq)]
pub enum EmbeddingError {
    /// Input was empty after trimming
    #[error("Cannot embed empty text")]
    EmptyInput,

    /// The inference backend failed or is unavailable
    #[error("Embedding backend failed: {0}")]
    Backend(String),

    /// The inference call exceeded its time budget
    #[error("Embedding timed out after {0:?}")]
    Timeout(Duration),
}

/// Failures raised by a [`crate::stance::StanceClassifier`]
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ClassificationError {
    /// The inference backend failed or is unavailable
    #[error("Stance backend failed: {0}")]
    Backend(String),

    /// The inference call exceeded its time budget
    #[error("Stance classification timed out after {0:?}")]
    Timeout(Duration),
}

/// Failures while loading a corpus snapshot
#[derive(Debug, Error)]
pub enum CorpusLoadError {
    #[error("Corpus file not found: {0}")]
    Missing(String),

    #[error("Failed to read corpus file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Malformed corpus at line {line}: {reason}")]
    Malformed { line: usize, reason: String },

    #[error("Unsupported corpus format version {0}")]
    UnsupportedVersion(u32),

    #[error("Passage {passage_id} has embedding dimension {actual}, expected {expected}")]
    DimensionMismatch {
        passage_id: u64,
        expected: usize,
        actual: usize,
    },
}

/// Top-level error for every claim-core operation
#[derive(Debug, Error)]
pub enum ClaimError {
    #[error("Claim must not be empty")]
    InvalidClaim,

    #[error("top_k must be a positive integer")]
    InvalidTopK,

    #[error(transparent)]
    Embedding(#[from] EmbeddingError),

    #[error(transparent)]
    Classification(#[from] ClassificationError),

    #[error("Corpus was built with embedding model '{corpus}' but the active embedder is '{embedder}'")]
    ModelMismatch { corpus: String, embedder: String },

    #[error(transparent)]
    CorpusLoad(#[from] CorpusLoadError),

    #[error("Vector dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("Passage not found: {0}")]
    NotFound(u64),

    #[error("Invalid ingestion record at line {line}: {reason}")]
    Ingestion { line: usize, reason: String },

    #[error("Failed to write corpus snapshot: {0}")]
    CorpusWrite(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl ClaimError {
    /// Stable machine-readable code, surfaced over HTTP
    pub fn code(&self) -> &'static str {
        match self {
            ClaimError::InvalidClaim => "INVALID_CLAIM",
            ClaimError::InvalidTopK => "INVALID_TOP_K",
            ClaimError::Embedding(EmbeddingError::Timeout(_)) => "EMBEDDING_TIMEOUT",
            ClaimError::Embedding(_) => "EMBEDDING_FAILED",
            ClaimError::Classification(ClassificationError::Timeout(_)) => "CLASSIFICATION_TIMEOUT",
            ClaimError::Classification(_) => "CLASSIFICATION_FAILED",
            ClaimError::ModelMismatch { .. } => "MODEL_MISMATCH",
            ClaimError::CorpusLoad(_) => "CORPUS_LOAD_FAILED",
            ClaimError::DimensionMismatch { .. } => "DIMENSION_MISMATCH",
            ClaimError::NotFound(_) => "NOT_FOUND",
            ClaimError::Ingestion { .. } => "INGESTION_FAILED",
            ClaimError::CorpusWrite(_) => "CORPUS_WRITE_FAILED",
            ClaimError::InvalidConfig(_) => "INVALID_CONFIG",
        }
    }

    /// Errors that must prevent the service from coming up
    pub fn is_startup_fatal(&self) -> bool {
        matches!(
            self,
            ClaimError::CorpusLoad(_)
                | ClaimError::ModelMismatch { .. }
                | ClaimError::DimensionMismatch { .. }
                | ClaimError::InvalidConfig(_)
        )
    }

    /// Whether a caller may reasonably retry. The core never retries itself.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ClaimError::Embedding(EmbeddingError::Backend(_))
                | ClaimError::Embedding(EmbeddingError::Timeout(_))
                | ClaimError::Classification(_)
        )
    }

    /// Whether the error came from a timed-out inference call
    pub fn is_timeout(&self) -> bool {
        matches!(
            self,
            ClaimError::Embedding(EmbeddingError::Timeout(_))
                | ClaimError::Classification(ClassificationError::Timeout(_))
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_startup_classification() {
        assert!(ClaimError::ModelMismatch {
            corpus: "a".to_string(),
            embedder: "b".to_string(),
        }
        .is_startup_fatal());
        assert!(ClaimError::DimensionMismatch { expected: 3, actual: 4 }.is_startup_fatal());
        assert!(!ClaimError::InvalidClaim.is_startup_fatal());
        assert!(!ClaimError::Embedding(EmbeddingError::EmptyInput).is_startup_fatal());
    }

    #[test]
    fn test_retryable_only_for_backend_failures() {
        assert!(ClaimError::Embedding(EmbeddingError::Backend("down".into())).is_retryable());
        assert!(ClaimError::Classification(ClassificationError::Timeout(Duration::from_millis(5)))
            .is_retryable());
        assert!(!ClaimError::Embedding(EmbeddingError::EmptyInput).is_retryable());
        assert!(!ClaimError::InvalidClaim.is_retryable());
        assert!(!ClaimError::NotFound(7).is_retryable());
    }

    #[test]
    fn test_codes_distinguish_timeouts() {
        let timeout = ClaimError::from(EmbeddingError::Timeout(Duration::from_secs(1)));
        assert_eq!(timeout.code(), "EMBEDDING_TIMEOUT");
        assert!(timeout.is_timeout());
        let failed = ClaimError::from(EmbeddingError::Backend("x".into()));
        assert_eq!(failed.code(), "EMBEDDING_FAILED");
        assert!(!failed.is_timeout());
    }
}

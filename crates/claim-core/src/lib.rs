//! Claim Core - retrieval and stance classification for claim verification
//!
//! This crate provides:
//! - Passage types, text cleaning and source URLs
//! - Corpus snapshots and the offline corpus builder
//! - Embedding backends (feature hashing, Candle BERT)
//! - Exact cosine vector index
//! - Stance classifiers (lexical heuristics, Candle NLI cross-encoder)
//! - The query orchestrator with score fusion and result caching
//! - Configuration and error types

pub mod bert;
pub mod builder;
pub mod config;
pub mod corpus;
pub mod embeddings;
pub mod error;
pub mod index;
pub mod passage;
pub mod search;
pub mod stance;
pub mod text;

// Re-export commonly used types
pub use builder::CorpusBuilder;
pub use config::{ClassifierBackend, EmbedderBackend, EngineConfig, FusionWeights, SearchConfig};
pub use corpus::CorpusStore;
pub use embeddings::{BertEmbedder, Embedder, HashingEmbedder};
pub use error::{ClaimError, ClassificationError, CorpusLoadError, EmbeddingError};
pub use index::{ExactIndex, Neighbor, VectorIndex};
pub use passage::{Passage, PassageRecord};
pub use search::{QueryOrchestrator, QueryResult, DEFAULT_TOP_K};
pub use stance::{LexicalStanceClassifier, NliClassifier, Stance, StanceClassifier, StancePrediction};

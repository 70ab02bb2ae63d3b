//! Application state for the claim API
//!
//! Holds the query orchestrator, which owns the corpus store and both models.

use anyhow::{Context, Result};
use claim_core::{
    BertEmbedder, ClassifierBackend, CorpusStore, Embedder, EmbedderBackend, EngineConfig,
    HashingEmbedder, LexicalStanceClassifier, NliClassifier, QueryOrchestrator, StanceClassifier,
};
use std::sync::Arc;
use tracing::info;

/// Shared application state
pub struct AppState {
    pub orchestrator: QueryOrchestrator,
}

impl AppState {
    pub fn new(orchestrator: QueryOrchestrator) -> Self {
        Self { orchestrator }
    }

    /// Load corpus and models described by the configuration.
    ///
    /// Any failure here is fatal: the service must not start half-initialised.
    pub async fn from_config(config: &EngineConfig) -> Result<Self> {
        let config = config.clone();
        // Model loading and snapshot parsing are blocking work
        tokio::task::spawn_blocking(move || Self::load(&config))
            .await
            .context("state initialisation task failed")?
    }

    fn load(config: &EngineConfig) -> Result<Self> {
        info!("Loading corpus from {}", config.corpus_path.display());
        let store = Arc::new(CorpusStore::load(&config.corpus_path)?);

        let embedder: Arc<dyn Embedder> = match config.embedder {
            EmbedderBackend::Hashing => Arc::new(HashingEmbedder::new(config.hashing_dim)?),
            EmbedderBackend::Bert => {
                info!("Loading embedding model from {}", config.embedding_model_path.display());
                Arc::new(BertEmbedder::load(&config.embedding_model_path)?)
            }
        };

        let classifier: Arc<dyn StanceClassifier> = match config.classifier {
            ClassifierBackend::Lexical => Arc::new(LexicalStanceClassifier::default()),
            ClassifierBackend::Nli => {
                info!("Loading NLI model from {}", config.nli_model_path.display());
                Arc::new(NliClassifier::load(&config.nli_model_path)?)
            }
        };

        let orchestrator = QueryOrchestrator::new(store, embedder, classifier, config.search.clone())?;
        Ok(Self::new(orchestrator))
    }
}

//! Query orchestrator - `search_claim(claim, top_k)`
//!
//! Pipeline: embed the claim → overfetch `m = max(top_k * factor, top_k)`
//! neighbours → classify every candidate → fuse scores → sort → truncate.
//!
//! Embedding and classification run on tokio's blocking pool, each call bounded
//! by the configured inference timeout. Classification of the candidates runs
//! with bounded concurrency and keeps index order until the final sort.
//! Dropping the returned future abandons the query; blocking calls already in
//! flight finish in the background and their output is discarded. Shared
//! state is only read, so cancellation cannot corrupt it.
//!
//! Every blocking call holds a permit from a process-wide semaphore until the
//! call itself returns, not until the caller stops waiting. A hung backend
//! therefore pins at most `max_inflight_inference` blocking threads; further
//! calls wait for a permit inside their own timeout and fail with `Timeout`.

use futures::stream::{self, StreamExt, TryStreamExt};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Semaphore;

use super::cache::QueryCache;
use super::fusion::ScoreFusion;
use super::QueryResult;
use crate::config::SearchConfig;
use crate::corpus::CorpusStore;
use crate::embeddings::Embedder;
use crate::error::{ClaimError, ClassificationError, EmbeddingError};
use crate::passage::Passage;
use crate::stance::{StanceClassifier, StancePrediction};

pub struct QueryOrchestrator {
    store: Arc<CorpusStore>,
    embedder: Arc<dyn Embedder>,
    classifier: Arc<dyn StanceClassifier>,
    fusion: ScoreFusion,
    config: SearchConfig,
    cache: QueryCache,
    inference_permits: Arc<Semaphore>,
}

impl QueryOrchestrator {
    /// Wire the pipeline together.
    ///
    /// Fails with `ModelMismatch` when the corpus was embedded by a different
    /// model than `embedder`, and with `InvalidConfig` for bad tuning values.
    pub fn new(
        store: Arc<CorpusStore>,
        embedder: Arc<dyn Embedder>,
        classifier: Arc<dyn StanceClassifier>,
        config: SearchConfig,
    ) -> Result<Self, ClaimError> {
        config.validate()?;
        store.ensure_compatible(embedder.as_ref())?;
        let cache = QueryCache::new(config.cache_capacity);

        tracing::info!(
            passages = store.len(),
            embedder = embedder.model_id(),
            classifier = classifier.model_id(),
            overfetch = config.overfetch_factor,
            cache = cache.is_enabled(),
            "Query orchestrator ready"
        );

        Ok(Self {
            store,
            embedder,
            classifier,
            fusion: ScoreFusion::new(config.weights),
            cache,
            inference_permits: Arc::new(Semaphore::new(config.max_inflight_inference)),
            config,
        })
    }

    /// Ranked, labelled evidence for a claim.
    ///
    /// Fetches `max(top_k * overfetch_factor, top_k)` nearest passages,
    /// classifies each against the claim and orders them by fused score, then
    /// by ascending passage id. Neutral passages are ranked, never filtered
    /// out.
    ///
    /// # Arguments
    ///
    /// * `claim` - Free-text claim; surrounding whitespace is ignored
    /// * `top_k` - Maximum number of results, must be positive
    ///
    /// # Returns
    ///
    /// At most `top_k` results, fewer when the corpus is smaller. Blank claims
    /// fail with `InvalidClaim`, a zero `top_k` with `InvalidTopK`, and
    /// backend failures or timeouts with the matching typed error.
    ///
    /// # Example
    ///
    /// ```rust,ignore
    /// let results = orchestrator.search_claim("The Eiffel Tower is in Paris", 5).await?;
    /// assert_eq!(results[0].label, Stance::Support);
    /// ```
    #[tracing::instrument(skip(self, claim), fields(claim_len = claim.len()))]
    pub async fn search_claim(&self, claim: &str, top_k: usize) -> Result<Vec<QueryResult>, ClaimError> {
        let claim = claim.trim();
        if claim.is_empty() {
            return Err(ClaimError::InvalidClaim);
        }
        if top_k == 0 {
            return Err(ClaimError::InvalidTopK);
        }

        if let Some(hit) = self.cache.get(claim, top_k) {
            tracing::debug!(results = hit.len(), "cache hit");
            return Ok(hit.as_ref().clone());
        }

        let started = Instant::now();
        let query = self.embed(claim).await?;

        let m = top_k.saturating_mul(self.config.overfetch_factor).max(top_k);
        let neighbors = self.store.search(&query, m)?;
        let candidates = neighbors
            .iter()
            .map(|n| Ok((self.store.get(n.passage_id)?, n.similarity)))
            .collect::<Result<Vec<(&Passage, f32)>, ClaimError>>()?;

        let claim_text: Arc<str> = Arc::from(claim);
        let predictions: Vec<StancePrediction> = stream::iter(
            candidates
                .iter()
                .map(|(passage, _)| passage.text.clone())
                .collect::<Vec<String>>()
                .into_iter()
                .map(|text| self.classify(Arc::clone(&claim_text), text)),
        )
        .buffered(self.config.classify_concurrency)
        .try_collect()
        .await?;

        let results: Vec<QueryResult> = candidates
            .iter()
            .zip(predictions)
            .map(|((passage, similarity), prediction)| {
                let score = self.fusion.score(*similarity, &prediction);
                QueryResult::new(passage, *similarity, prediction, score)
            })
            .collect();
        let ranked = ScoreFusion::rank(results, top_k);

        tracing::debug!(
            candidates = candidates.len(),
            results = ranked.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "claim search complete"
        );

        self.cache.insert(claim, top_k, Arc::new(ranked.clone()));
        Ok(ranked)
    }

    /// Run `work` on the blocking pool under the inference timeout.
    ///
    /// `None` means the timeout expired, either waiting for a permit or
    /// while the call was running.
    async fn run_blocking<T, F>(&self, work: F) -> Option<Result<T, tokio::task::JoinError>>
    where
        T: Send + 'static,
        F: FnOnce() -> T + Send + 'static,
    {
        let permits = Arc::clone(&self.inference_permits);
        let call = async move {
            let permit = match permits.acquire_owned().await {
                Ok(permit) => permit,
                // The semaphore is never closed
                Err(_) => return None,
            };
            let task = tokio::task::spawn_blocking(move || {
                let _permit = permit;
                work()
            });
            Some(task.await)
        };
        tokio::time::timeout(self.config.inference_timeout, call)
            .await
            .ok()
            .flatten()
    }

    async fn embed(&self, claim: &str) -> Result<Vec<f32>, ClaimError> {
        let embedder = Arc::clone(&self.embedder);
        let text = claim.to_string();
        let timeout = self.config.inference_timeout;

        match self.run_blocking(move || embedder.embed(&text)).await {
            None => Err(EmbeddingError::Timeout(timeout).into()),
            Some(Err(join)) => Err(EmbeddingError::Backend(format!("embedding task failed: {join}")).into()),
            Some(Ok(result)) => Ok(result?),
        }
    }

    async fn classify(&self, claim: Arc<str>, passage: String) -> Result<StancePrediction, ClaimError> {
        let classifier = Arc::clone(&self.classifier);
        let timeout: Duration = self.config.inference_timeout;

        match self.run_blocking(move || classifier.classify(&claim, &passage)).await {
            None => Err(ClassificationError::Timeout(timeout).into()),
            Some(Err(join)) => {
                Err(ClassificationError::Backend(format!("classification task failed: {join}")).into())
            }
            Some(Ok(result)) => Ok(result?),
        }
    }

    pub fn store(&self) -> &CorpusStore {
        &self.store
    }

    pub fn classifier(&self) -> &dyn StanceClassifier {
        self.classifier.as_ref()
    }
}

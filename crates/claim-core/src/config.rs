//! Configuration management for the claim engine
//!
//! Backend selection, model locations and query-time tuning, loaded from
//! environment variables with defaults suitable for local development.

use anyhow::{anyhow, Result};
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::embeddings::hashing::DEFAULT_HASHING_DIM;
use crate::error::ClaimError;

/// Embedding backend options
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmbedderBackend {
    /// Feature hashing, no model files
    Hashing,
    /// Candle BERT/XLM-R encoder
    Bert,
}

impl FromStr for EmbedderBackend {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "hashing" | "hash" => Ok(EmbedderBackend::Hashing),
            "bert" | "candle" | "dense" => Ok(EmbedderBackend::Bert),
            _ => Err(anyhow!("Unknown embedder backend: {}", s)),
        }
    }
}

/// Stance classifier options
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClassifierBackend {
    /// Sentence-overlap heuristics
    Lexical,
    /// Candle cross-encoder
    Nli,
}

impl FromStr for ClassifierBackend {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "lexical" | "heuristic" => Ok(ClassifierBackend::Lexical),
            "nli" | "cross-encoder" => Ok(ClassifierBackend::Nli),
            _ => Err(anyhow!("Unknown classifier backend: {}", s)),
        }
    }
}

/// Weights combining retrieval similarity with stance confidence
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FusionWeights {
    pub similarity: f32,
    pub stance: f32,
    /// Multiplier applied to confidence for `not_enough_info` predictions
    pub nei_relevance: f32,
}

impl Default for FusionWeights {
    fn default() -> Self {
        Self {
            similarity: 0.5,
            stance: 0.5,
            nei_relevance: 0.0,
        }
    }
}

/// Query-time tuning for the orchestrator
#[derive(Debug, Clone, PartialEq)]
pub struct SearchConfig {
    /// Candidates fetched per requested result (`m = top_k * factor`)
    pub overfetch_factor: usize,
    pub weights: FusionWeights,
    /// Budget for each individual inference call
    pub inference_timeout: Duration,
    /// Classifications in flight per query
    pub classify_concurrency: usize,
    /// Blocking inference calls alive across all queries, including calls
    /// abandoned after a timeout that are still running
    pub max_inflight_inference: usize,
    /// Cached query results; 0 disables the cache
    pub cache_capacity: usize,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            overfetch_factor: 3,
            weights: FusionWeights::default(),
            inference_timeout: Duration::from_secs(10),
            classify_concurrency: 4,
            max_inflight_inference: 16,
            cache_capacity: 256,
        }
    }
}

impl SearchConfig {
    pub fn with_overfetch_factor(mut self, factor: usize) -> Self {
        self.overfetch_factor = factor;
        self
    }

    pub fn with_weights(mut self, weights: FusionWeights) -> Self {
        self.weights = weights;
        self
    }

    pub fn with_inference_timeout(mut self, timeout: Duration) -> Self {
        self.inference_timeout = timeout;
        self
    }

    pub fn with_classify_concurrency(mut self, concurrency: usize) -> Self {
        self.classify_concurrency = concurrency;
        self
    }

    pub fn with_max_inflight_inference(mut self, limit: usize) -> Self {
        self.max_inflight_inference = limit;
        self
    }

    pub fn with_cache_capacity(mut self, capacity: usize) -> Self {
        self.cache_capacity = capacity;
        self
    }

    pub fn validate(&self) -> Result<(), ClaimError> {
        let invalid = |msg: String| Err(ClaimError::InvalidConfig(msg));

        if self.overfetch_factor == 0 {
            return invalid("overfetch factor must be at least 1".to_string());
        }
        let w = &self.weights;
        for (name, value) in [
            ("similarity weight", w.similarity),
            ("stance weight", w.stance),
            ("nei relevance", w.nei_relevance),
        ] {
            if !value.is_finite() || value < 0.0 {
                return invalid(format!("{name} must be a non-negative number, got {value}"));
            }
        }
        if w.similarity == 0.0 && w.stance == 0.0 {
            return invalid("similarity and stance weights cannot both be zero".to_string());
        }
        if self.inference_timeout.is_zero() {
            return invalid("inference timeout must be positive".to_string());
        }
        if self.classify_concurrency == 0 {
            return invalid("classify concurrency must be at least 1".to_string());
        }
        if self.max_inflight_inference > tokio::sync::Semaphore::MAX_PERMITS {
            return invalid(format!(
                "max in-flight inference cannot exceed {}",
                tokio::sync::Semaphore::MAX_PERMITS
            ));
        }
        if self.max_inflight_inference < self.classify_concurrency {
            return invalid(format!(
                "max in-flight inference ({}) is below classify concurrency ({})",
                self.max_inflight_inference, self.classify_concurrency
            ));
        }
        Ok(())
    }
}

/// Full engine configuration
#[derive(Debug, Clone, PartialEq)]
pub struct EngineConfig {
    pub corpus_path: PathBuf,
    pub embedder: EmbedderBackend,
    pub embedding_model_path: PathBuf,
    pub hashing_dim: usize,
    pub classifier: ClassifierBackend,
    pub nli_model_path: PathBuf,
    pub search: SearchConfig,
    pub port: u16,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            corpus_path: PathBuf::from("./data/corpus.jsonl"),
            embedder: EmbedderBackend::Hashing,
            embedding_model_path: PathBuf::from("./models/embedder"),
            hashing_dim: DEFAULT_HASHING_DIM,
            classifier: ClassifierBackend::Lexical,
            nli_model_path: PathBuf::from("./models/nli"),
            search: SearchConfig::default(),
            port: 3000,
        }
    }
}

impl EngineConfig {
    pub fn with_corpus_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.corpus_path = path.into();
        self
    }

    /// Load configuration from environment variables
    ///
    /// Expected variables (all optional):
    /// - CLAIM_CORPUS_PATH: corpus snapshot to serve
    /// - CLAIM_EMBEDDER: "hashing" or "bert"
    /// - CLAIM_EMBEDDING_MODEL_PATH / CLAIM_HASHING_DIM
    /// - CLAIM_CLASSIFIER: "lexical" or "nli"
    /// - CLAIM_NLI_MODEL_PATH
    /// - CLAIM_OVERFETCH_FACTOR, CLAIM_SIMILARITY_WEIGHT, CLAIM_STANCE_WEIGHT,
    ///   CLAIM_NEI_RELEVANCE, CLAIM_INFERENCE_TIMEOUT_MS,
    ///   CLAIM_CLASSIFY_CONCURRENCY, CLAIM_MAX_INFLIGHT_INFERENCE,
    ///   CLAIM_CACHE_CAPACITY
    /// - PORT: HTTP port
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`EngineConfig::from_env`] with an arbitrary variable source
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let search_defaults = &defaults.search;

        let parse = |key: &str| -> Option<String> {
            lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
        };
        fn number<T: FromStr>(key: &str, raw: Option<String>, default: T) -> Result<T> {
            match raw {
                Some(v) => v
                    .parse()
                    .map_err(|_| anyhow!("Invalid value for {}: {}", key, v)),
                None => Ok(default),
            }
        }

        let embedder = match parse("CLAIM_EMBEDDER") {
            Some(v) => v.parse()?,
            None => defaults.embedder,
        };
        let classifier = match parse("CLAIM_CLASSIFIER") {
            Some(v) => v.parse()?,
            None => defaults.classifier,
        };

        let timeout_ms: u64 = number(
            "CLAIM_INFERENCE_TIMEOUT_MS",
            parse("CLAIM_INFERENCE_TIMEOUT_MS"),
            search_defaults.inference_timeout.as_millis() as u64,
        )?;

        let search = SearchConfig {
            overfetch_factor: number(
                "CLAIM_OVERFETCH_FACTOR",
                parse("CLAIM_OVERFETCH_FACTOR"),
                search_defaults.overfetch_factor,
            )?,
            weights: FusionWeights {
                similarity: number(
                    "CLAIM_SIMILARITY_WEIGHT",
                    parse("CLAIM_SIMILARITY_WEIGHT"),
                    search_defaults.weights.similarity,
                )?,
                stance: number(
                    "CLAIM_STANCE_WEIGHT",
                    parse("CLAIM_STANCE_WEIGHT"),
                    search_defaults.weights.stance,
                )?,
                nei_relevance: number(
                    "CLAIM_NEI_RELEVANCE",
                    parse("CLAIM_NEI_RELEVANCE"),
                    search_defaults.weights.nei_relevance,
                )?,
            },
            inference_timeout: Duration::from_millis(timeout_ms),
            classify_concurrency: number(
                "CLAIM_CLASSIFY_CONCURRENCY",
                parse("CLAIM_CLASSIFY_CONCURRENCY"),
                search_defaults.classify_concurrency,
            )?,
            max_inflight_inference: number(
                "CLAIM_MAX_INFLIGHT_INFERENCE",
                parse("CLAIM_MAX_INFLIGHT_INFERENCE"),
                search_defaults.max_inflight_inference,
            )?,
            cache_capacity: number(
                "CLAIM_CACHE_CAPACITY",
                parse("CLAIM_CACHE_CAPACITY"),
                search_defaults.cache_capacity,
            )?,
        };
        search.validate()?;

        let hashing_dim = number("CLAIM_HASHING_DIM", parse("CLAIM_HASHING_DIM"), defaults.hashing_dim)?;
        if hashing_dim == 0 {
            return Err(anyhow!("CLAIM_HASHING_DIM must be positive"));
        }

        Ok(Self {
            corpus_path: parse("CLAIM_CORPUS_PATH")
                .map(PathBuf::from)
                .unwrap_or(defaults.corpus_path),
            embedder,
            embedding_model_path: parse("CLAIM_EMBEDDING_MODEL_PATH")
                .map(PathBuf::from)
                .unwrap_or(defaults.embedding_model_path),
            hashing_dim,
            classifier,
            nli_model_path: parse("CLAIM_NLI_MODEL_PATH")
                .map(PathBuf::from)
                .unwrap_or(defaults.nli_model_path),
            search,
            port: number("PORT", parse("PORT"), defaults.port)?,
        })
    }
}

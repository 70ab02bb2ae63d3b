//! Corpus store - the immutable passage collection served at query time
//!
//! A snapshot is a JSON Lines file. Line 1 is a [`SnapshotHeader`]; every
//! following line is one [`Passage`] including its embedding. The store owns
//! the passages and the vector index built over them and is read-only once
//! constructed, so it can be shared across request handlers without locking.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;

use crate::embeddings::Embedder;
use crate::error::{ClaimError, CorpusLoadError};
use crate::index::{ExactIndex, Neighbor, VectorIndex};
use crate::passage::Passage;

pub const FORMAT_VERSION: u32 = 1;

/// Upper bound on passages preallocated from an untrusted header count
const MAX_PREALLOCATED_PASSAGES: usize = 64 * 1024;

/// First line of a snapshot file
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SnapshotHeader {
    pub format_version: u32,
    pub embedding_model_id: String,
    pub dimension: usize,
    pub passage_count: usize,
}

pub struct CorpusStore {
    embedding_model_id: String,
    dimension: usize,
    passages: Vec<Passage>,
    positions: HashMap<u64, usize>,
    index: ExactIndex,
}

impl std::fmt::Debug for CorpusStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CorpusStore")
            .field("embedding_model_id", &self.embedding_model_id)
            .field("dimension", &self.dimension)
            .field("passages", &self.passages.len())
            .finish()
    }
}

impl CorpusStore {
    /// Assemble a store from passages already carrying embeddings.
    ///
    /// Validation errors report the line the passage would occupy in a
    /// snapshot (header is line 1).
    pub fn from_passages(
        embedding_model_id: impl Into<String>,
        dimension: usize,
        passages: Vec<Passage>,
    ) -> Result<Self, ClaimError> {
        let embedding_model_id = embedding_model_id.into();
        check_header(&embedding_model_id, dimension)?;
        for (i, passage) in passages.iter().enumerate() {
            check_passage(passage, dimension, i + 2)?;
        }
        Ok(Self::assemble(embedding_model_id, dimension, passages)?)
    }

    fn assemble(
        embedding_model_id: String,
        dimension: usize,
        passages: Vec<Passage>,
    ) -> Result<Self, CorpusLoadError> {
        let mut positions = HashMap::with_capacity(passages.len());
        for (i, passage) in passages.iter().enumerate() {
            if positions.insert(passage.id, i).is_some() {
                return Err(CorpusLoadError::Malformed {
                    line: i + 2,
                    reason: format!("duplicate passage id {}", passage.id),
                });
            }
        }

        let index = ExactIndex::build(
            dimension,
            passages.iter().map(|p| (p.id, p.embedding.as_slice())),
        )
        .map_err(|e| CorpusLoadError::Malformed {
            line: 0,
            reason: e.to_string(),
        })?;

        Ok(Self {
            embedding_model_id,
            dimension,
            passages,
            positions,
            index,
        })
    }

    /// Load and validate a snapshot file
    ///
    /// Every passage is checked against the header before the index is
    /// built: embedding length, finite values, non-empty text and title,
    /// unique ids, and the declared passage count.
    ///
    /// # Arguments
    ///
    /// * `path` - Snapshot written by [`CorpusStore::write`]
    ///
    /// # Returns
    ///
    /// The read-only store, or a [`CorpusLoadError`] naming the first bad line
    ///
    /// # Example
    ///
    /// ```rust,ignore
    /// let store = CorpusStore::load(Path::new("./data/corpus.jsonl"))?;
    /// store.ensure_compatible(&embedder)?;
    /// ```
    pub fn load(path: &Path) -> Result<Self, CorpusLoadError> {
        let display = path.display().to_string();
        if !path.exists() {
            return Err(CorpusLoadError::Missing(display));
        }
        let io_err = |source: std::io::Error| CorpusLoadError::Io {
            path: display.clone(),
            source,
        };
        let reader = BufReader::new(File::open(path).map_err(io_err)?);

        let mut header: Option<SnapshotHeader> = None;
        let mut passages = Vec::new();

        for (i, line) in reader.lines().enumerate() {
            let line_no = i + 1;
            let line = line.map_err(io_err)?;
            if line.trim().is_empty() {
                continue;
            }

            match header.as_ref().map(|h| h.dimension) {
                None => {
                    let parsed: SnapshotHeader =
                        serde_json::from_str(&line).map_err(|e| CorpusLoadError::Malformed {
                            line: line_no,
                            reason: format!("invalid header: {e}"),
                        })?;
                    if parsed.format_version != FORMAT_VERSION {
                        return Err(CorpusLoadError::UnsupportedVersion(parsed.format_version));
                    }
                    check_header(&parsed.embedding_model_id, parsed.dimension).map_err(|e| {
                        CorpusLoadError::Malformed {
                            line: line_no,
                            reason: e.to_string(),
                        }
                    })?;
                    passages.reserve(parsed.passage_count.min(MAX_PREALLOCATED_PASSAGES));
                    header = Some(parsed);
                }
                Some(dimension) => {
                    let passage: Passage =
                        serde_json::from_str(&line).map_err(|e| CorpusLoadError::Malformed {
                            line: line_no,
                            reason: format!("invalid passage: {e}"),
                        })?;
                    check_passage(&passage, dimension, line_no)?;
                    passages.push(passage);
                }
            }
        }

        let header = header.ok_or_else(|| CorpusLoadError::Malformed {
            line: 1,
            reason: "empty corpus file".to_string(),
        })?;
        if passages.len() != header.passage_count {
            return Err(CorpusLoadError::Malformed {
                line: 1,
                reason: format!(
                    "header declares {} passages, file holds {}",
                    header.passage_count,
                    passages.len()
                ),
            });
        }

        let store = Self::assemble(header.embedding_model_id, header.dimension, passages)?;
        tracing::info!(
            "Loaded corpus from {}: {} passages, dimension {}, model {}",
            path.display(),
            store.len(),
            store.dimension,
            store.embedding_model_id
        );
        Ok(store)
    }

    /// Write a snapshot atomically: a sibling temp file is renamed into place
    pub fn write(&self, path: &Path) -> Result<(), ClaimError> {
        let write_err = |e: &dyn std::fmt::Display| {
            ClaimError::CorpusWrite(format!("{}: {}", path.display(), e))
        };

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| write_err(&e))?;
        }
        let file_name = path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| write_err(&"path has no file name"))?;
        let tmp = path.with_file_name(format!(".{file_name}.tmp"));

        let result = (|| -> Result<(), ClaimError> {
            let mut out = BufWriter::new(File::create(&tmp).map_err(|e| write_err(&e))?);
            serde_json::to_writer(&mut out, &self.header()).map_err(|e| write_err(&e))?;
            out.write_all(b"\n").map_err(|e| write_err(&e))?;
            for passage in &self.passages {
                serde_json::to_writer(&mut out, passage).map_err(|e| write_err(&e))?;
                out.write_all(b"\n").map_err(|e| write_err(&e))?;
            }
            let file = out.into_inner().map_err(|e| write_err(&e))?;
            file.sync_all().map_err(|e| write_err(&e))?;
            std::fs::rename(&tmp, path).map_err(|e| write_err(&e))
        })();

        if result.is_err() {
            let _ = std::fs::remove_file(&tmp);
        }
        result?;

        tracing::info!("Wrote {} passages to {}", self.len(), path.display());
        Ok(())
    }

    pub fn header(&self) -> SnapshotHeader {
        SnapshotHeader {
            format_version: FORMAT_VERSION,
            embedding_model_id: self.embedding_model_id.clone(),
            dimension: self.dimension,
            passage_count: self.passages.len(),
        }
    }

    /// Refuse to serve with an embedder other than the one that built the corpus
    pub fn ensure_compatible(&self, embedder: &dyn Embedder) -> Result<(), ClaimError> {
        if embedder.model_id() != self.embedding_model_id {
            return Err(ClaimError::ModelMismatch {
                corpus: self.embedding_model_id.clone(),
                embedder: embedder.model_id().to_string(),
            });
        }
        if embedder.dimension() != self.dimension {
            return Err(ClaimError::DimensionMismatch {
                expected: self.dimension,
                actual: embedder.dimension(),
            });
        }
        Ok(())
    }

    pub fn get(&self, id: u64) -> Result<&Passage, ClaimError> {
        self.positions
            .get(&id)
            .map(|&i| &self.passages[i])
            .ok_or(ClaimError::NotFound(id))
    }

    /// Top-k neighbours of a query vector
    pub fn search(&self, query: &[f32], k: usize) -> Result<Vec<Neighbor>, ClaimError> {
        self.index.search(query, k)
    }

    pub fn passages(&self) -> &[Passage] {
        &self.passages
    }

    pub fn embedding_model_id(&self) -> &str {
        &self.embedding_model_id
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    pub fn len(&self) -> usize {
        self.passages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.passages.is_empty()
    }
}

fn check_header(embedding_model_id: &str, dimension: usize) -> Result<(), ClaimError> {
    if embedding_model_id.trim().is_empty() {
        return Err(ClaimError::InvalidConfig("embedding model id is empty".to_string()));
    }
    if dimension == 0 {
        return Err(ClaimError::InvalidConfig("embedding dimension must be positive".to_string()));
    }
    Ok(())
}

fn check_passage(passage: &Passage, dimension: usize, line: usize) -> Result<(), CorpusLoadError> {
    let malformed = |reason: String| CorpusLoadError::Malformed { line, reason };

    if passage.embedding.len() != dimension {
        return Err(CorpusLoadError::DimensionMismatch {
            passage_id: passage.id,
            expected: dimension,
            actual: passage.embedding.len(),
        });
    }
    if passage.text.trim().is_empty() {
        return Err(malformed(format!("passage {} has empty text", passage.id)));
    }
    if passage.title.trim().is_empty() {
        return Err(malformed(format!("passage {} has empty title", passage.id)));
    }
    if passage.embedding.iter().any(|x| !x.is_finite()) {
        return Err(malformed(format!("passage {} has non-finite embedding values", passage.id)));
    }
    Ok(())
}

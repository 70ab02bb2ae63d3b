//! Offline corpus construction
//!
//! Reads `{title, text, url?}` records, cleans them, assigns ids `0..N` in input
//! order, embeds the text in batches and produces a [`CorpusStore`] stamped with
//! the embedder's model id.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use crate::corpus::CorpusStore;
use crate::embeddings::Embedder;
use crate::error::ClaimError;
use crate::passage::{Passage, PassageRecord};

pub const DEFAULT_BATCH_SIZE: usize = 32;

pub struct CorpusBuilder<'a> {
    embedder: &'a dyn Embedder,
    batch_size: usize,
}

impl<'a> CorpusBuilder<'a> {
    pub fn new(embedder: &'a dyn Embedder) -> Self {
        Self {
            embedder,
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    /// Clean, number and embed records into a corpus store
    ///
    /// Text is whitespace-collapsed, a missing url is derived from the title,
    /// and ids are assigned `0..N` in input order. Records with an empty title
    /// or text are skipped with a warning and do not consume an id.
    ///
    /// # Arguments
    ///
    /// * `records` - Ingestion records in corpus order
    ///
    /// # Returns
    ///
    /// A store stamped with the embedder's model id and dimension
    ///
    /// # Example
    ///
    /// ```rust,ignore
    /// let embedder = HashingEmbedder::new(384)?;
    /// let store = CorpusBuilder::new(&embedder).build(vec![
    ///     PassageRecord::new("Eiffel Tower", "The Eiffel Tower is located in Paris, France."),
    /// ])?;
    /// assert_eq!(store.get(0)?.url, "https://en.wikipedia.org/wiki/Eiffel_Tower");
    /// ```
    pub fn build<I>(&self, records: I) -> Result<CorpusStore, ClaimError>
    where
        I: IntoIterator<Item = PassageRecord>,
    {
        let mut cleaned = Vec::new();
        for (position, record) in records.into_iter().enumerate() {
            match record.normalized() {
                Some(fields) => cleaned.push(fields),
                None => tracing::warn!(
                    "Skipping record {} ({:?}): empty title or text",
                    position,
                    record.title
                ),
            }
        }

        let total = cleaned.len();
        let mut passages = Vec::with_capacity(total);
        for chunk in cleaned.chunks(self.batch_size) {
            let texts: Vec<&str> = chunk.iter().map(|(_, text, _)| text.as_str()).collect();
            let embeddings = self.embedder.embed_batch(&texts)?;

            for ((title, text, url), embedding) in chunk.iter().zip(embeddings) {
                passages.push(Passage {
                    id: passages.len() as u64,
                    title: title.clone(),
                    text: text.clone(),
                    url: url.clone(),
                    embedding,
                });
            }
            tracing::info!("Embedded {}/{} passages", passages.len(), total);
        }

        CorpusStore::from_passages(self.embedder.model_id(), self.embedder.dimension(), passages)
    }

    /// Build from a JSON Lines file of records
    pub fn build_from_jsonl(&self, path: &Path) -> Result<CorpusStore, ClaimError> {
        let records = read_records(path)?;
        tracing::info!("Read {} records from {}", records.len(), path.display());
        self.build(records)
    }
}

/// Parse a JSON Lines file of [`PassageRecord`]s. Blank lines are ignored.
pub fn read_records(path: &Path) -> Result<Vec<PassageRecord>, ClaimError> {
    let file = File::open(path).map_err(|e| ClaimError::Ingestion {
        line: 0,
        reason: format!("cannot open {}: {}", path.display(), e),
    })?;

    let mut records = Vec::new();
    for (i, line) in BufReader::new(file).lines().enumerate() {
        let line_no = i + 1;
        let line = line.map_err(|e| ClaimError::Ingestion {
            line: line_no,
            reason: e.to_string(),
        })?;
        if line.trim().is_empty() {
            continue;
        }
        let record = serde_json::from_str(&line).map_err(|e| ClaimError::Ingestion {
            line: line_no,
            reason: e.to_string(),
        })?;
        records.push(record);
    }
    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embeddings::HashingEmbedder;
    use pretty_assertions::assert_eq;
    use std::io::Write;

    #[test]
    fn test_ids_follow_input_order_and_skip_blanks() {
        let embedder = HashingEmbedder::new(32).unwrap();
        let store = CorpusBuilder::new(&embedder)
            .with_batch_size(2)
            .build(vec![
                PassageRecord::new("Eiffel Tower", "The Eiffel Tower is located in Paris, France."),
                PassageRecord::new("Empty", "   "),
                PassageRecord::new("Louvre", "The Louvre is an art museum."),
                PassageRecord::new("Big Ben", "Big Ben is a clock  tower\nin London."),
            ])
            .unwrap();

        assert_eq!(store.len(), 3);
        assert_eq!(store.embedding_model_id(), "hashing-fnv1a-v1-d32");
        let titles: Vec<&str> = store.passages().iter().map(|p| p.title.as_str()).collect();
        assert_eq!(titles, vec!["Eiffel Tower", "Louvre", "Big Ben"]);
        let ids: Vec<u64> = store.passages().iter().map(|p| p.id).collect();
        assert_eq!(ids, vec![0, 1, 2]);

        let big_ben = store.get(2).unwrap();
        assert_eq!(big_ben.text, "Big Ben is a clock tower in London.");
        assert_eq!(big_ben.url, "https://en.wikipedia.org/wiki/Big_Ben");
        assert_eq!(big_ben.embedding, embedder.embed(&big_ben.text).unwrap());
    }

    #[test]
    fn test_read_records_reports_bad_line() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, r#"{{"title":"Paris","text":"Capital of France."}}"#).unwrap();
        writeln!(file).unwrap();
        writeln!(file, r#"{{"title":"Broken""#).unwrap();

        let err = read_records(file.path()).unwrap_err();
        assert!(matches!(err, ClaimError::Ingestion { line: 3, .. }));
    }

    #[test]
    fn test_build_from_jsonl() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, r#"{{"title":"Paris","text":"Paris is the capital of France."}}"#).unwrap();
        writeln!(
            file,
            r#"{{"title":"Rome","text":"Rome is the capital of Italy.","url":"https://example.org/rome"}}"#
        )
        .unwrap();

        let embedder = HashingEmbedder::new(16).unwrap();
        let store = CorpusBuilder::new(&embedder).build_from_jsonl(file.path()).unwrap();
        assert_eq!(store.len(), 2);
        assert_eq!(store.get(1).unwrap().url, "https://example.org/rome");
    }
}
